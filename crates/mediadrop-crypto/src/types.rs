//! Type definitions shared by the mediadrop server and client.

use serde::{Deserialize, Serialize};

/// Algorithm name recorded alongside every content fingerprint.
pub const FINGERPRINT_ALGO: &str = "sha-256";

/// Digest of some content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentDigest {
    /// Hash algorithm used (e.g., "sha-256")
    pub algo: String,
    /// Hex-encoded hash value
    pub value: String,
}

impl ContentDigest {
    /// Wraps an already computed SHA-256 hex digest.
    pub fn sha256(value: impl Into<String>) -> Self {
        Self {
            algo: FINGERPRINT_ALGO.to_string(),
            value: value.into(),
        }
    }
}
