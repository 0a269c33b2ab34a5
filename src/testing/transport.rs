//! Scripted in-memory transport

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::channel::{CloseKind, Connection, Inbound, PushFrame, Transport};
use crate::error::{SyncError, SyncResult};

/// Result of one scripted connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Accept,
    Refuse(String),
}

/// Transport whose connect attempts follow a script.
///
/// Clones share the same script, attempt log and peers.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    script: VecDeque<ConnectOutcome>,
    fallback: ConnectOutcome,
    attempts: Vec<String>,
    peers: Vec<MockPeer>,
}

impl MockTransport {
    /// Run `script` in order, then refuse every further attempt
    pub fn with_script(script: Vec<ConnectOutcome>) -> Self {
        Self::build(script, ConnectOutcome::Refuse("script exhausted".to_string()))
    }

    /// Accept every attempt
    pub fn accepting() -> Self {
        Self::build(Vec::new(), ConnectOutcome::Accept)
    }

    /// Refuse every attempt
    pub fn refusing() -> Self {
        Self::build(Vec::new(), ConnectOutcome::Refuse("connection refused".to_string()))
    }

    fn build(script: Vec<ConnectOutcome>, fallback: ConnectOutcome) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                script: script.into(),
                fallback,
                attempts: Vec::new(),
                peers: Vec::new(),
            })),
        }
    }

    /// URLs of every connect attempt so far
    pub fn attempts(&self) -> Vec<String> {
        self.state.lock().attempts.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.state.lock().attempts.len()
    }

    /// Server side of the n-th accepted connection
    pub fn peer(&self, index: usize) -> Option<MockPeer> {
        self.state.lock().peers.get(index).cloned()
    }

    pub fn peer_count(&self) -> usize {
        self.state.lock().peers.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> SyncResult<Box<dyn Connection>> {
        let mut state = self.state.lock();
        state.attempts.push(url.to_string());
        let outcome = state
            .script
            .pop_front()
            .unwrap_or_else(|| state.fallback.clone());

        match outcome {
            ConnectOutcome::Refuse(reason) => Err(SyncError::ConnectionFailed(reason)),
            ConnectOutcome::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                let sent = Arc::new(Mutex::new(Vec::new()));
                let closed = Arc::new(AtomicBool::new(false));
                state.peers.push(MockPeer {
                    inbound: tx,
                    sent: sent.clone(),
                    closed: closed.clone(),
                });
                Ok(Box::new(MockConnection {
                    inbound: rx,
                    sent,
                    closed,
                }))
            }
        }
    }
}

struct MockConnection {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&mut self, text: String) -> SyncResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed("connection closed".to_string()));
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Inbound {
        self.inbound
            .recv()
            .await
            .unwrap_or_else(|| Inbound::Closed(CloseKind::Abnormal("peer dropped".to_string())))
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Server end of a mock connection
#[derive(Clone)]
pub struct MockPeer {
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    /// Deliver a raw text frame to the client
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(Inbound::Text(text.into()));
    }

    pub fn push_frame(&self, frame: &PushFrame) {
        if let Ok(text) = serde_json::to_string(frame) {
            self.push_text(text);
        }
    }

    pub fn close_normal(&self) {
        let _ = self.inbound.send(Inbound::Closed(CloseKind::Normal));
    }

    pub fn close_abnormal(&self, reason: &str) {
        let _ = self
            .inbound
            .send(Inbound::Closed(CloseKind::Abnormal(reason.to_string())));
    }

    /// Raw frames written by the client
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Frames written by the client that parse as `PushFrame`
    pub fn sent_frames(&self) -> Vec<PushFrame> {
        self.sent
            .lock()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Whether the client closed this connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
