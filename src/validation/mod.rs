//! Referential integrity checks for graph snapshots
//!
//! This module provides soft validation: issues are reported, never enforced.

mod integrity;

pub use integrity::{check_integrity, IntegrityIssue};
