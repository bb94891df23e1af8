//! Deterministic checksums over JSON values.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// 64-bit checksum of a value's canonical JSON serialization.
///
/// Object keys serialize in sorted order, so two structurally equal values
/// always produce the same checksum. The value is the leading 8 bytes of a
/// SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(u64);

impl Checksum {
  pub fn of(value: &Value) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    Self(u64::from_be_bytes(prefix))
  }
}

impl fmt::Display for Checksum {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", hex::encode(self.0.to_be_bytes()))
  }
}
