//! Push channel: one live connection per session with bounded reconnects

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::{MessageKind, PushFrame};
use super::state::{ChannelState, Handler, HandlerId, HandlerRegistry};
use super::transport::{CloseKind, Connection, Inbound, Transport};
use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Push connection to the merge backend for one session.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct PushChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    url: String,
    transport: Arc<dyn Transport>,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    state: watch::Sender<ChannelState>,
    handlers: Mutex<HandlerRegistry>,
    /// Writer queue of the live connection, `None` while not connected
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    retries: AtomicU32,
    last_error: Mutex<Option<String>>,
    run: Mutex<Option<Run>>,
}

/// Supervisor task of the current connect cycle
struct Run {
    cancel: CancelToken,
    task: JoinHandle<()>,
}

enum PumpExit {
    Cancelled,
    Closed(CloseKind),
}

impl PushChannel {
    /// Create a channel for the given push URL
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>, config: &SyncConfig) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            inner: Arc::new(ChannelInner {
                url: url.into(),
                transport,
                reconnect_delay: config.reconnect_delay,
                max_reconnect_attempts: config.max_reconnect_attempts,
                state,
                handlers: Mutex::new(HandlerRegistry::default()),
                outbound: Mutex::new(None),
                retries: AtomicU32::new(0),
                last_error: Mutex::new(None),
                run: Mutex::new(None),
            }),
        }
    }

    /// Create a channel whose URL is derived from the config origin and session id
    pub fn for_session(config: &SyncConfig, session_id: &str, transport: Arc<dyn Transport>) -> Self {
        Self::new(config.endpoints(session_id).push_url(), transport, config)
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Start connecting in the background.
    ///
    /// Returns false without doing anything if an attempt is already in
    /// flight or a connection is live. Must be called inside a tokio runtime.
    pub fn connect(&self) -> bool {
        let started = self.inner.state.send_if_modified(|state| {
            if *state == ChannelState::Disconnected {
                *state = ChannelState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            debug!(url = %self.inner.url, state = %self.state(), "connect ignored");
            return false;
        }

        let cancel = CancelToken::new();
        let task = tokio::spawn(self.inner.clone().supervise(cancel.clone()));
        // A previous run can only be here if it already finished on its own
        *self.inner.run.lock() = Some(Run { cancel, task });
        true
    }

    /// Close the connection, stop retrying and clear every handler.
    ///
    /// Safe to call repeatedly; the channel can be connected again afterwards.
    pub async fn disconnect(&self) {
        let run = self.inner.run.lock().take();
        if let Some(run) = run {
            run.cancel.cancel();
            let _ = run.task.await;
        }
        self.reset();
    }

    /// Synchronous teardown for contexts that cannot await, such as `Drop`.
    ///
    /// Cancels the current run without waiting for it; the supervisor closes
    /// its connection and exits on its own and never reconnects.
    pub fn shutdown(&self) {
        if let Some(run) = self.inner.run.lock().take() {
            run.cancel.cancel();
        }
        self.reset();
    }

    fn reset(&self) {
        self.inner.outbound.lock().take();
        self.inner.handlers.lock().clear();
        self.inner.retries.store(0, Ordering::SeqCst);
        self.inner.set_state(ChannelState::Disconnected);
    }

    /// Register a handler for one message kind
    pub fn on<F>(&self, kind: impl Into<MessageKind>, handler: F) -> HandlerId
    where
        F: Fn(&PushFrame) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.inner.handlers.lock().register(kind.into(), handler)
    }

    /// Unregister a handler; unknown handlers are ignored
    pub fn off(&self, kind: impl Into<MessageKind>, id: HandlerId) {
        let kind = kind.into();
        if !self.inner.handlers.lock().unregister(&kind, id) {
            debug!(kind = %kind, "off() for unregistered handler");
        }
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// Wait until the channel reaches `target`
    pub async fn wait_for_state(&self, target: ChannelState) {
        let mut rx = self.state_changes();
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Reconnect attempts used since the last successful connect
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.retries.load(Ordering::SeqCst)
    }

    /// Most recent connection error, if any
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }

    /// Answer a `QUESTION` frame
    pub fn send_answer(&self, question_id: &str, answer: serde_json::Value) -> SyncResult<()> {
        self.send_frame(&PushFrame::answer(question_id, answer)?)
    }

    pub fn pause(&self) -> SyncResult<()> {
        self.send_frame(&PushFrame::pause())
    }

    pub fn resume(&self) -> SyncResult<()> {
        self.send_frame(&PushFrame::resume())
    }

    /// Write a frame to the live connection; fails if not connected
    pub fn send_frame(&self, frame: &PushFrame) -> SyncResult<()> {
        if self.state() != ChannelState::Connected {
            return Err(SyncError::NotConnected);
        }
        let text = serde_json::to_string(frame)?;
        let outbound = self.inner.outbound.lock();
        let tx = outbound.as_ref().ok_or(SyncError::NotConnected)?;
        tx.send(text).map_err(|_| SyncError::NotConnected)?;
        debug!(kind = %frame.kind, "frame queued");
        Ok(())
    }
}

impl ChannelInner {
    fn set_state(&self, next: ChannelState) {
        self.state.send_if_modified(|state| {
            if *state != next {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    /// Transition unless this run was cancelled by `disconnect`
    fn transition(&self, cancel: &CancelToken, next: ChannelState) {
        if !cancel.is_cancelled() {
            self.set_state(next);
        }
    }

    fn record_error(&self, err: &SyncError) {
        *self.last_error.lock() = Some(err.to_string());
    }

    async fn supervise(self: Arc<Self>, cancel: CancelToken) {
        loop {
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = self.transport.connect(&self.url) => result,
            };

            match attempt {
                Ok(mut conn) => {
                    if cancel.is_cancelled() {
                        conn.close().await;
                        return;
                    }
                    let (tx, rx) = mpsc::unbounded_channel();
                    *self.outbound.lock() = Some(tx);
                    self.retries.store(0, Ordering::SeqCst);
                    self.transition(&cancel, ChannelState::Connected);
                    info!(url = %self.url, "push channel connected");

                    let exit = self.pump(conn.as_mut(), rx, &cancel).await;
                    self.outbound.lock().take();

                    match exit {
                        PumpExit::Cancelled => return,
                        PumpExit::Closed(CloseKind::Normal) => {
                            info!(url = %self.url, "push channel closed by server");
                            self.transition(&cancel, ChannelState::Disconnected);
                            return;
                        }
                        PumpExit::Closed(CloseKind::Abnormal(reason)) => {
                            let err = SyncError::ConnectionFailed(reason);
                            warn!(url = %self.url, error = %err, "push channel dropped");
                            self.record_error(&err);
                        }
                    }
                }
                Err(err) => {
                    warn!(url = %self.url, error = %err, "push channel connect failed");
                    self.record_error(&err);
                }
            }

            let used = self.retries.load(Ordering::SeqCst);
            if used >= self.max_reconnect_attempts {
                let err = SyncError::ReconnectExhausted { attempts: used };
                error!(url = %self.url, error = %err, "giving up on push channel");
                self.record_error(&err);
                self.transition(&cancel, ChannelState::Disconnected);
                return;
            }

            let attempt = used + 1;
            self.retries.store(attempt, Ordering::SeqCst);
            self.transition(&cancel, ChannelState::Reconnecting);
            debug!(attempt, delay_ms = self.reconnect_delay.as_millis() as u64, "scheduling reconnect");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// Move frames between the connection and the handlers until it ends
    async fn pump(
        &self,
        conn: &mut dyn Connection,
        mut outbound: mpsc::UnboundedReceiver<String>,
        cancel: &CancelToken,
    ) -> PumpExit {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    conn.close().await;
                    return PumpExit::Cancelled;
                }
                Some(text) = outbound.recv() => {
                    if let Err(e) = conn.send(text).await {
                        return PumpExit::Closed(CloseKind::Abnormal(e.to_string()));
                    }
                }
                inbound = conn.recv() => match inbound {
                    Inbound::Text(text) => self.dispatch(&text),
                    Inbound::Closed(kind) => return PumpExit::Closed(kind),
                },
            }
        }
    }

    /// Parse one frame and hand it to the handlers of its kind
    fn dispatch(&self, text: &str) {
        let frame = match serde_json::from_str::<PushFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                let err = SyncError::MalformedFrame(e.to_string());
                warn!(error = %err, "dropping frame");
                return;
            }
        };

        // Clone out so handlers may call on()/off() without deadlocking
        let handlers = self.handlers.lock().handlers_for(&frame.kind);
        if handlers.is_empty() {
            debug!(kind = %frame.kind, "no handler for frame");
        }
        for handler in handlers {
            handler(&frame);
        }
    }
}
