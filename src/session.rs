//! Merge session facade
//!
//! Wires one push channel, snapshot store, reconciler and operation log
//! together for a single merge session and owns their background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::channel::{PushChannel, Transport};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::oplog::OperationLog;
use crate::reconciler::{ReconciledView, Reconciler};
use crate::snapshot::{GraphSource, SnapshotStore};
use crate::types::{GraphOperation, GraphSnapshot};

/// Client side of one merge session
pub struct MergeSession {
    session_id: String,
    channel: PushChannel,
    store: Arc<SnapshotStore>,
    reconciler: Arc<Reconciler>,
    oplog: Arc<Mutex<OperationLog>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl MergeSession {
    /// Wire up every component and start connecting.
    ///
    /// Must be called inside a tokio runtime. The session id doubles as
    /// the merge id for conflict lookups.
    pub fn open(
        config: &SyncConfig,
        session_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        source: Arc<dyn GraphSource>,
    ) -> Self {
        let session_id = session_id.into();
        let channel = PushChannel::for_session(config, &session_id, transport);
        let store = Arc::new(SnapshotStore::new(session_id.clone(), source.clone()));
        let reconciler = Arc::new(Reconciler::new(store.clone(), source, session_id.clone()));
        let oplog = Arc::new(Mutex::new(OperationLog::new(
            store.current(),
            config.max_history,
        )));

        // Subscribe before anything can publish
        let views = reconciler.subscribe();
        let tasks = vec![
            tokio::spawn(reconciler.clone().run()),
            reconciler.attach(&channel),
            tokio::spawn(reset_on_refresh(views, reconciler.clone(), oplog.clone())),
        ];

        info!(session = %session_id, url = %channel.url(), "merge session opened");
        channel.connect();

        Self {
            session_id,
            channel,
            store,
            reconciler,
            oplog,
            tasks: Mutex::new(tasks),
            closed: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Apply a local edit on top of the current view
    pub fn apply(&self, op: GraphOperation) -> SyncResult<Arc<GraphSnapshot>> {
        self.oplog.lock().apply(op)
    }

    pub fn undo(&self) -> SyncResult<bool> {
        self.oplog.lock().undo()
    }

    pub fn redo(&self) -> SyncResult<bool> {
        self.oplog.lock().redo()
    }

    pub fn can_undo(&self) -> bool {
        self.oplog.lock().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.oplog.lock().can_redo()
    }

    /// Snapshot including local edits
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.oplog.lock().current()
    }

    /// Latest authoritative view, without local edits
    pub fn view(&self) -> ReconciledView {
        self.reconciler.current()
    }

    /// Subscribe to authoritative view changes
    pub fn subscribe(&self) -> broadcast::Receiver<ReconciledView> {
        self.reconciler.subscribe()
    }

    /// Fetch snapshot and conflicts now
    pub async fn refresh(&self) -> SyncResult<ReconciledView> {
        self.reconciler.refresh().await
    }

    pub fn channel(&self) -> &PushChannel {
        &self.channel
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear the session down. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.channel.disconnect().await;
        self.store.close();
        self.reconciler.shutdown();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
        }
        info!(session = %self.session_id, "merge session closed");
    }
}

impl Drop for MergeSession {
    fn drop(&mut self) {
        self.channel.shutdown();
        self.store.close();
        self.reconciler.shutdown();
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Authoritative refreshes discard pending local edits
async fn reset_on_refresh(
    mut views: broadcast::Receiver<ReconciledView>,
    reconciler: Arc<Reconciler>,
    oplog: Arc<Mutex<OperationLog>>,
) {
    loop {
        let snapshot = match views.recv().await {
            Ok(view) => view.snapshot,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "view updates lagged, resetting to latest");
                reconciler.current().snapshot
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        oplog.lock().reset(snapshot);
    }
}
