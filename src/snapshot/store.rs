//! Graph Snapshot Store - single source of truth for one session's graph

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::fingerprint::Fingerprint;
use super::normalize::normalize;
use super::source::GraphSource;
use crate::cancel::CancelToken;
use crate::error::{SyncError, SyncResult};
use crate::types::{Conflict, GraphSnapshot};
use crate::validation::check_integrity;

/// Published state of the store
#[derive(Debug, Clone, Default)]
pub struct SnapshotUpdate {
    /// Increments on every publication, 0 before the first one
    pub version: u64,
    pub snapshot: Arc<GraphSnapshot>,
    /// Conflicts that arrived inline with the visualization
    pub conflicts: Arc<Vec<Conflict>>,
    pub summary: Option<Value>,
}

/// Result of a successful fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Payload changed; the new version was published
    Published(u64),
    /// Payload matched the last published fingerprint
    Unchanged,
}

struct StoreState {
    latest: SnapshotUpdate,
    fingerprint: Option<Fingerprint>,
    last_error: Option<String>,
}

/// Holds the last-known-good snapshot and republishes it when it changes
pub struct SnapshotStore {
    session_id: String,
    source: Arc<dyn GraphSource>,
    state: Mutex<StoreState>,
    updates: broadcast::Sender<SnapshotUpdate>,
    closed: CancelToken,
}

impl SnapshotStore {
    pub fn new(session_id: impl Into<String>, source: Arc<dyn GraphSource>) -> Self {
        // Slow subscribers only need the latest state, see `latest()`
        let (updates, _) = broadcast::channel(64);
        Self {
            session_id: session_id.into(),
            source,
            state: Mutex::new(StoreState {
                latest: SnapshotUpdate::default(),
                fingerprint: None,
                last_error: None,
            }),
            updates,
            closed: CancelToken::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Fetch the visualization and publish it if it changed
    pub async fn fetch(&self) -> SyncResult<FetchOutcome> {
        self.fetch_with(&CancelToken::new()).await
    }

    /// Like [`fetch`](Self::fetch), abandoning the result once `cancel` fires
    pub async fn fetch_with(&self, cancel: &CancelToken) -> SyncResult<FetchOutcome> {
        if cancel.is_cancelled() || self.closed.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            _ = self.closed.cancelled() => return Err(SyncError::Cancelled),
            result = self.source.fetch_visualization(&self.session_id) => result,
        };

        let data = match fetched {
            Ok(data) => data.unwrap_or(Value::Null),
            Err(e) => return Err(self.fail(e)),
        };

        let fingerprint = Fingerprint::of(&data);
        let visualization = match normalize(data) {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };

        // Resolved after teardown or cancellation: drop it
        if cancel.is_cancelled() || self.closed.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let update = {
            let mut state = self.state.lock();
            state.last_error = None;
            if state.fingerprint.as_ref() == Some(&fingerprint) {
                debug!(session = %self.session_id, %fingerprint, "payload unchanged");
                return Ok(FetchOutcome::Unchanged);
            }

            let update = SnapshotUpdate {
                version: state.latest.version + 1,
                snapshot: Arc::new(visualization.snapshot),
                conflicts: Arc::new(visualization.conflicts),
                summary: visualization.summary,
            };
            state.fingerprint = Some(fingerprint);
            state.latest = update.clone();
            // Sent under the lock so subscribers see versions in order
            let _ = self.updates.send(update.clone());
            update
        };

        for issue in check_integrity(&update.snapshot) {
            warn!(session = %self.session_id, %issue, "snapshot integrity issue");
        }
        info!(
            session = %self.session_id,
            version = update.version,
            nodes = update.snapshot.node_count(),
            edges = update.snapshot.edge_count(),
            "snapshot published"
        );
        Ok(FetchOutcome::Published(update.version))
    }

    /// Keep the last-known-good snapshot, remember the error
    fn fail(&self, err: SyncError) -> SyncError {
        warn!(session = %self.session_id, error = %err, "snapshot fetch failed");
        self.state.lock().last_error = Some(err.to_string());
        err
    }

    /// Current snapshot
    pub fn current(&self) -> Arc<GraphSnapshot> {
        self.state.lock().latest.snapshot.clone()
    }

    /// Latest published state
    pub fn latest(&self) -> SnapshotUpdate {
        self.state.lock().latest.clone()
    }

    pub fn version(&self) -> u64 {
        self.state.lock().latest.version
    }

    /// Error of the most recent fetch, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    /// Subscribe to publications
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotUpdate> {
        self.updates.subscribe()
    }

    /// Cancel in-flight fetches and refuse new ones
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
