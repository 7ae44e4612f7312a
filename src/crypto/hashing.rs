//! SHA-256 integrity tags
//!
//! Every shard and every stored file is tagged with the hex SHA-256 of its
//! exact byte sequence. Tags are computed on the bytes that go over the wire
//! and compared before any reconstruction or decryption.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Check `data` against a previously recorded tag.
pub fn verify_tag(expected_hex: &str, data: &[u8]) -> bool {
    sha256_hex(data) == expected_hex
}
