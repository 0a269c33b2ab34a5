//! Scripted in-memory graph source

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::snapshot::GraphSource;
use crate::types::Conflict;

#[derive(Debug, Clone)]
enum Scripted {
    Data(Value, Duration),
    NotReady,
    Error(u16),
}

/// Graph source answering from queued responses.
///
/// Once the visualization queue is drained the last served payload is
/// repeated. Clones share state.
#[derive(Clone, Default)]
pub struct StaticGraphSource {
    inner: Arc<SourceState>,
}

#[derive(Default)]
struct SourceState {
    visualizations: Mutex<VecDeque<Scripted>>,
    sticky: Mutex<Option<Value>>,
    conflicts: Mutex<Vec<Conflict>>,
    conflict_error: Mutex<Option<u16>>,
    visualization_calls: AtomicUsize,
    conflict_calls: AtomicUsize,
}

impl StaticGraphSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_visualization(&self, data: Value) {
        self.push_delayed(data, Duration::ZERO);
    }

    /// Queue a payload that resolves after `delay`
    pub fn push_delayed(&self, data: Value, delay: Duration) {
        self.inner
            .visualizations
            .lock()
            .push_back(Scripted::Data(data, delay));
    }

    /// Queue a 404-equivalent answer
    pub fn push_not_ready(&self) {
        self.inner.visualizations.lock().push_back(Scripted::NotReady);
    }

    /// Queue a failed fetch with the given status
    pub fn push_error(&self, status: u16) {
        self.inner
            .visualizations
            .lock()
            .push_back(Scripted::Error(status));
    }

    pub fn set_conflicts(&self, conflicts: Vec<Conflict>) {
        *self.inner.conflicts.lock() = conflicts;
        *self.inner.conflict_error.lock() = None;
    }

    /// Make conflict fetches fail until `set_conflicts` is called
    pub fn fail_conflicts(&self, status: u16) {
        *self.inner.conflict_error.lock() = Some(status);
    }

    pub fn visualization_calls(&self) -> usize {
        self.inner.visualization_calls.load(Ordering::SeqCst)
    }

    pub fn conflict_calls(&self) -> usize {
        self.inner.conflict_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphSource for StaticGraphSource {
    async fn fetch_visualization(&self, _session_id: &str) -> SyncResult<Option<Value>> {
        self.inner.visualization_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.inner.visualizations.lock().pop_front();

        match next {
            Some(Scripted::Data(data, delay)) => {
                *self.inner.sticky.lock() = Some(data.clone());
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(Some(data))
            }
            Some(Scripted::NotReady) => Ok(None),
            Some(Scripted::Error(status)) => Err(SyncError::FetchFailed { status }),
            None => Ok(self.inner.sticky.lock().clone()),
        }
    }

    async fn fetch_conflicts(&self, _merge_id: &str) -> SyncResult<Vec<Conflict>> {
        self.inner.conflict_calls.fetch_add(1, Ordering::SeqCst);
        let failure = *self.inner.conflict_error.lock();
        if let Some(status) = failure {
            return Err(SyncError::FetchFailed { status });
        }
        Ok(self.inner.conflicts.lock().clone())
    }
}
