//! Merge Sync
//!
//! Client-side synchronization engine for human-in-the-loop graph merge
//! sessions. Keeps a live view of a merge graph consistent with the backend
//! while the user edits it locally.
//!
//! # Modules
//!
//! - `channel`: Push channel with bounded reconnects and typed frame dispatch
//! - `snapshot`: Graph snapshot store with fingerprint deduplication
//! - `reconciler`: Conflict annotation and refetch on push events
//! - `oplog`: Optimistic local edits with undo/redo
//! - `session`: Facade wiring one session's components together
//! - `types`: Nodes, edges, conflicts, snapshots and operations
//! - `validation`: Snapshot integrity checks
//! - `testing`: In-memory transport and graph source (feature `testing`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use merge_sync::{HttpGraphSource, MergeSession, SyncConfig, WsTransport};
//!
//! #[tokio::main]
//! async fn main() -> merge_sync::SyncResult<()> {
//!     let config = SyncConfig::new("http://localhost:8000");
//!     let source = Arc::new(HttpGraphSource::new(&config)?);
//!     let session = MergeSession::open(&config, "session-1", Arc::new(WsTransport), source);
//!
//!     let mut views = session.subscribe();
//!     if let Ok(view) = views.recv().await {
//!         println!("{} nodes", view.snapshot.node_count());
//!     }
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod channel;
pub mod config;
pub mod error;
pub mod oplog;
pub mod reconciler;
pub mod session;
pub mod snapshot;
pub mod types;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items at crate root
pub use cancel::CancelToken;
pub use channel::{ChannelState, MessageKind, PushChannel, PushFrame, Transport, WsTransport};
pub use config::{SessionEndpoints, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use oplog::OperationLog;
pub use reconciler::{ReconciledView, Reconciler};
pub use session::MergeSession;
pub use snapshot::{GraphSource, HttpGraphSource, SnapshotStore, SnapshotUpdate};
pub use types::{Conflict, GraphEdge, GraphNode, GraphOperation, GraphSnapshot, NodeStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
