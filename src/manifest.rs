//! File manifest - metadata about a stored file
//!
//! The manifest records everything needed to locate, verify, and decrypt a
//! file: per-shard integrity tags, shard placement, the coding parameters,
//! and the per-file encryption key. It only ever touches disk sealed by the
//! metadata vault.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::FileKey;
use crate::engine::{CodingParams, ErasureError};

/// Sentinel substituted for the encryption key in every externally visible
/// rendering of a manifest.
pub const REDACTED_KEY: &str = "[REDACTED]";

/// Metadata for a single stored file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    /// Logical name; lookup key and shard identifier prefix.
    pub filename: String,

    /// Hex SHA-256 of the plaintext.
    pub file_hash: String,

    /// Plaintext length in bytes; truncation anchor after decryption.
    pub file_size: usize,

    /// Per-file Fernet key (urlsafe base64). Redacted in public views.
    pub encryption_key: String,

    /// Shards required for reconstruction (k).
    pub k_required: usize,

    /// Total shards created (m).
    pub m_total: usize,

    /// Hex SHA-256 of each shard, keyed by shard id.
    pub shard_metadata: BTreeMap<usize, String>,

    /// Upload timestamp (UTC, RFC 3339).
    pub upload_date: DateTime<Utc>,

    /// Node URL each shard was delivered to, keyed by shard id.
    pub shard_locations: BTreeMap<usize, String>,
}

impl Manifest {
    /// Serialize to the JSON bytes that get sealed by the vault.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from unsealed JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Public view: identical except the encryption key is replaced with
    /// [`REDACTED_KEY`]. External interfaces render only this.
    pub fn redacted(&self) -> Self {
        Self {
            encryption_key: REDACTED_KEY.to_string(),
            ..self.clone()
        }
    }

    /// The coding parameters recorded at upload time.
    pub fn coding_params(&self) -> Result<CodingParams, ErasureError> {
        CodingParams::new(self.k_required, self.m_total)
    }

    /// The per-file key, for internal use during reconstruction only.
    pub fn file_key(&self) -> FileKey {
        FileKey::from_encoded(self.encryption_key.clone())
    }

    /// Listing summary; never includes the key or per-shard tags.
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            filename: self.filename.clone(),
            file_hash_prefix: self.file_hash.chars().take(16).collect(),
            file_size: self.file_size,
            upload_date: self.upload_date,
            k_required: self.k_required,
            m_total: self.m_total,
        }
    }
}

/// What `GET /files` exposes per stored file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileSummary {
    pub filename: String,
    pub file_hash_prefix: String,
    pub file_size: usize,
    pub upload_date: DateTime<Utc>,
    pub k_required: usize,
    pub m_total: usize,
}

/// Physical identifier of shard `shard_id` of `filename` on its node.
pub fn shard_storage_id(filename: &str, shard_id: usize) -> String {
    format!("{filename}_shard_{shard_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            filename: "report.pdf".to_string(),
            file_hash: "ab".repeat(32),
            file_size: 1024,
            encryption_key: fernet::Fernet::generate_key(),
            k_required: 3,
            m_total: 5,
            shard_metadata: (0..5).map(|i| (i, format!("{i:064x}"))).collect(),
            upload_date: Utc::now(),
            shard_locations: (0..5)
                .map(|i| (i, format!("http://127.0.0.1:800{}", i + 1)))
                .collect(),
        }
    }

    #[test]
    fn serialization_roundtrip() {
        let manifest = sample();
        let bytes = manifest.to_bytes().unwrap();
        let decoded = Manifest::from_bytes(&bytes).unwrap();
        assert_eq!(manifest, decoded);
    }

    #[test]
    fn redacted_view_hides_key() {
        let manifest = sample();
        let public = manifest.redacted();

        assert_eq!(public.encryption_key, REDACTED_KEY);
        assert_eq!(public.filename, manifest.filename);
        assert_eq!(public.shard_metadata, manifest.shard_metadata);

        let rendered = serde_json::to_string(&public).unwrap();
        assert!(!rendered.contains(&manifest.encryption_key));
    }

    #[test]
    fn summary_omits_sensitive_fields() {
        let manifest = sample();
        let rendered = serde_json::to_string(&manifest.summary()).unwrap();
        assert!(!rendered.contains(&manifest.encryption_key));
        assert!(!rendered.contains("shard_metadata"));
        assert_eq!(manifest.summary().file_hash_prefix.len(), 16);
    }

    #[test]
    fn storage_id_format() {
        assert_eq!(shard_storage_id("report.pdf", 3), "report.pdf_shard_3");
    }
}
