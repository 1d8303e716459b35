//! Digest Function
//!
//! Deterministic fingerprint of an artifact used for delivery deduplication.

use crate::domain::value_objects::ArtifactDigest;
use sha2::{Digest, Sha256};

/// Fingerprint a `(content, name)` pair.
///
/// Each part is framed with its big-endian `u64` length before hashing, so
/// the input is order-sensitive and no two distinct pairs share a preimage
/// (`("ab", "c")` and `("a", "bc")` hash differently).
pub fn digest(content: &[u8], name: &str) -> ArtifactDigest {
    let mut hasher = Sha256::new();
    hasher.update((content.len() as u64).to_be_bytes());
    hasher.update(content);
    hasher.update((name.len() as u64).to_be_bytes());
    hasher.update(name.as_bytes());
    ArtifactDigest::from_bytes(&hasher.finalize())
}
