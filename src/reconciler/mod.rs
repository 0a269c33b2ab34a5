//! Reconciler - keeps the annotated view current
//!
//! Push channel events queue refresh triggers; a single driver task
//! ([`Reconciler::run`]) works through them one at a time, so refetches it
//! issues are strictly ordered. Every store publication or conflict change
//! re-derives the annotated view from (snapshot, conflicts).

mod annotate;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::channel::{ChannelState, MessageKind, PushChannel};
use crate::error::SyncResult;
use crate::snapshot::{GraphSource, SnapshotStore};
use crate::types::{Conflict, GraphSnapshot};

pub use annotate::{annotate, merge_conflicts};

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Push channel (re)connected
    Connected,
    /// Merge progress advanced or the visualization changed
    GraphChanged,
    /// Backend reported a conflict change
    ConflictsChanged,
}

impl Trigger {
    fn needs_snapshot(&self) -> bool {
        matches!(self, Trigger::Connected | Trigger::GraphChanged)
    }

    fn needs_conflicts(&self) -> bool {
        matches!(self, Trigger::Connected | Trigger::ConflictsChanged)
    }
}

/// Annotated view handed to consumers
#[derive(Debug, Clone, Default)]
pub struct ReconciledView {
    /// Store version the view was derived from
    pub snapshot_version: u64,
    pub snapshot: Arc<GraphSnapshot>,
    pub conflicts: Arc<Vec<Conflict>>,
    pub summary: Option<Value>,
}

struct ReconcilerState {
    /// Conflicts from the conflicts endpoint, `None` until first fetched
    fetched: Option<Arc<Vec<Conflict>>>,
    view: ReconciledView,
}

/// Merges conflict data into store snapshots and refetches on push events
pub struct Reconciler {
    merge_id: String,
    store: Arc<SnapshotStore>,
    source: Arc<dyn GraphSource>,
    state: Mutex<ReconcilerState>,
    views: broadcast::Sender<ReconciledView>,
    triggers: mpsc::UnboundedSender<Trigger>,
    trigger_rx: Mutex<Option<mpsc::UnboundedReceiver<Trigger>>>,
    shutdown: CancelToken,
}

impl Reconciler {
    pub fn new(
        store: Arc<SnapshotStore>,
        source: Arc<dyn GraphSource>,
        merge_id: impl Into<String>,
    ) -> Self {
        let (views, _) = broadcast::channel(64);
        let (triggers, trigger_rx) = mpsc::unbounded_channel();
        Self {
            merge_id: merge_id.into(),
            store,
            source,
            state: Mutex::new(ReconcilerState {
                fetched: None,
                view: ReconciledView::default(),
            }),
            views,
            triggers,
            trigger_rx: Mutex::new(Some(trigger_rx)),
            shutdown: CancelToken::new(),
        }
    }

    /// Queue a refresh for the driver task
    pub fn trigger(&self, trigger: Trigger) {
        let _ = self.triggers.send(trigger);
    }

    /// Refetch on channel (re)connect and on status, progress and update frames.
    ///
    /// Returns the task watching the channel state; abort it on teardown.
    pub fn attach(&self, channel: &PushChannel) -> JoinHandle<()> {
        for (kind, trigger) in [
            (MessageKind::Status, Trigger::GraphChanged),
            (MessageKind::Progress, Trigger::GraphChanged),
            (MessageKind::VisualizationUpdate, Trigger::GraphChanged),
            (MessageKind::ConflictUpdate, Trigger::ConflictsChanged),
        ] {
            let tx = self.triggers.clone();
            channel.on(kind, move |_| {
                let _ = tx.send(trigger);
            });
        }

        let tx = self.triggers.clone();
        let mut states = channel.state_changes();
        tokio::spawn(async move {
            loop {
                let state = *states.borrow_and_update();
                match state {
                    ChannelState::Connected => {
                        if tx.send(Trigger::Connected).is_err() {
                            return;
                        }
                    }
                    // Stale data beats a blank view
                    ChannelState::Disconnected => debug!("channel down, keeping current view"),
                    _ => {}
                }
                if states.changed().await.is_err() {
                    return;
                }
            }
        })
    }

    /// Drive queued triggers and store publications until [`shutdown`](Self::shutdown)
    pub async fn run(self: Arc<Self>) {
        let taken = self.trigger_rx.lock().take();
        let Some(mut triggers) = taken else {
            warn!(merge = %self.merge_id, "reconciler already running");
            return;
        };
        let mut updates = self.store.subscribe();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                update = updates.recv() => match update {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        self.reconcile();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(first) = triggers.recv() => {
                    // Coalesce a burst of triggers into one round of fetches
                    let mut snapshot = first.needs_snapshot();
                    let mut conflicts = first.needs_conflicts();
                    while let Ok(next) = triggers.try_recv() {
                        snapshot |= next.needs_snapshot();
                        conflicts |= next.needs_conflicts();
                    }
                    debug!(merge = %self.merge_id, snapshot, conflicts, "refresh triggered");
                    self.refresh_parts(snapshot, conflicts).await;
                }
            }
        }
        debug!(merge = %self.merge_id, "reconciler stopped");
    }

    /// Stop the driver task
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn refresh_parts(&self, snapshot: bool, conflicts: bool) {
        if snapshot {
            // Failures are logged and recorded by the store
            let _ = self.store.fetch().await;
        }
        if conflicts {
            let _ = self.refresh_conflicts().await;
        }
        self.reconcile();
    }

    /// Fetch snapshot and conflicts now, then reconcile
    pub async fn refresh(&self) -> SyncResult<ReconciledView> {
        self.store.fetch().await?;
        self.refresh_conflicts().await?;
        Ok(self.current())
    }

    /// Fetch the conflict list; returns whether the view changed
    pub async fn refresh_conflicts(&self) -> SyncResult<bool> {
        let conflicts = match self.source.fetch_conflicts(&self.merge_id).await {
            Ok(conflicts) => conflicts,
            Err(e) => {
                warn!(merge = %self.merge_id, error = %e, "conflict fetch failed");
                return Err(e);
            }
        };
        if self.shutdown.is_cancelled() {
            return Ok(false);
        }
        debug!(merge = %self.merge_id, count = conflicts.len(), "conflicts fetched");
        self.state.lock().fetched = Some(Arc::new(conflicts));
        Ok(self.reconcile().is_some())
    }

    /// Re-derive the view from the store's snapshot and the known conflicts.
    ///
    /// Publishes and returns the new view only if it differs from the current one.
    pub fn reconcile(&self) -> Option<ReconciledView> {
        let mut state = self.state.lock();
        let latest = self.store.latest();

        let conflicts = match &state.fetched {
            Some(fetched) => merge_conflicts(&latest.conflicts, fetched),
            None => latest.conflicts.as_ref().clone(),
        };
        let snapshot = annotate(&latest.snapshot, &conflicts);

        let unchanged = state.view.snapshot_version == latest.version
            && *state.view.snapshot == snapshot
            && *state.view.conflicts == conflicts;
        if unchanged {
            return None;
        }

        let view = ReconciledView {
            snapshot_version: latest.version,
            snapshot: Arc::new(snapshot),
            conflicts: Arc::new(conflicts),
            summary: latest.summary,
        };
        state.view = view.clone();
        let _ = self.views.send(view.clone());
        info!(
            merge = %self.merge_id,
            version = view.snapshot_version,
            conflicts = view.conflicts.len(),
            conflicted = view.snapshot.conflicted_count(),
            "view reconciled"
        );
        Some(view)
    }

    pub fn current(&self) -> ReconciledView {
        self.state.lock().view.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconciledView> {
        self.views.subscribe()
    }
}
