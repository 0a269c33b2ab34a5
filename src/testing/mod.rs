//! In-memory collaborators for tests
//!
//! Enabled by the default `testing` feature so integration tests and
//! downstream crates can drive a session without a backend.

mod source;
mod transport;

pub use source::StaticGraphSource;
pub use transport::{ConnectOutcome, MockPeer, MockTransport};
