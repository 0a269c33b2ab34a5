//! Push channel for real-time merge session updates
//!
//! Keeps one live connection per session to the backend's `/ws/{session}`
//! endpoint and dispatches typed frames to registered handlers.
//!
//! ## Features
//! - Injected [`Transport`] so reconnection logic runs without a network
//! - Fixed-delay reconnects, bounded attempt count, then fail-stop
//! - Malformed frames are logged and dropped
//! - Sends fail fast with `NotConnected` instead of queuing

pub mod client;
pub mod events;
pub mod state;
pub mod transport;

// Re-export commonly used items
pub use client::PushChannel;
pub use events::{
    AnswerPayload, ErrorPayload, MessageKind, PushFrame, QuestionPayload, StatusPayload,
};
pub use state::{ChannelState, Handler, HandlerId};
pub use transport::{CloseKind, Connection, Inbound, Transport, WsTransport};
