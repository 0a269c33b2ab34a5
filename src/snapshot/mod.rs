//! Graph Snapshot Store
//!
//! Fetches the merge visualization for a session, suppresses redundant
//! payloads by fingerprint and publishes immutable snapshots.
//!
//! ```text
//! GraphSource ──► fingerprint ──► normalize ──► publish (broadcast)
//!   404 → empty       unchanged → suppressed      failure → keep last good
//! ```

mod fingerprint;
mod normalize;
mod source;
mod store;

pub use fingerprint::Fingerprint;
pub use normalize::{normalize, Visualization};
pub use source::{GraphSource, HttpGraphSource};
pub use store::{FetchOutcome, SnapshotStore, SnapshotUpdate};
