//! Content fingerprints for fetched payloads

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// `sha256:<hex>` digest of a payload's canonical JSON.
///
/// Object keys are sorted by `serde_json::Map`, so two payloads that differ
/// only in key order share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(payload: &Value) -> Self {
        let digest = Sha256::digest(payload.to_string().as_bytes());
        Self(format!("sha256:{}", hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
