//! Crypto-erasure engine
//!
//! Pure transformation layer between plaintext and shard sets. Stateless per
//! call: the per-file key is an output of [`encrypt_and_shard`], never a
//! field, so concurrent uploads cannot race on key material.
//!
//! Ordering invariant: encryption always precedes sharding, so storage nodes
//! only ever see ciphertext fragments.

pub mod erasure;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::crypto::{self, cipher::CipherError, FileKey};
pub use erasure::{CodingParams, ErasureError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("refusing to store an empty file")]
    Empty,
    #[error("cipher failure: {0}")]
    Crypto(#[from] CipherError),
    #[error("erasure coding failure: {0}")]
    Code(ErasureError),
    #[error("insufficient shards for reconstruction (have {have}, need {need})")]
    Insufficient { have: usize, need: usize },
    #[error("shard {shard_id} failed integrity verification")]
    ShardTampered { shard_id: usize },
    #[error("reconstructed file failed integrity verification")]
    FileTampered,
}

/// Output of [`encrypt_and_shard`]: everything the orchestrator needs to
/// distribute the file and build its manifest.
#[derive(Debug)]
pub struct EncodedFile {
    /// The `m_total` ciphertext shards, indexed by shard id.
    pub shards: Vec<Vec<u8>>,
    /// Hex SHA-256 of each shard, keyed by shard id.
    pub shard_hashes: BTreeMap<usize, String>,
    /// Fresh per-file key; persists only inside the sealed manifest.
    pub file_key: FileKey,
    /// Hex SHA-256 of the plaintext.
    pub file_hash: String,
}

/// Encrypt `plaintext` under a fresh key and split the ciphertext into
/// `m_total` shards with threshold `k_required`.
pub fn encrypt_and_shard(
    params: CodingParams,
    plaintext: &[u8],
) -> Result<EncodedFile, EngineError> {
    if plaintext.is_empty() {
        return Err(EngineError::Empty);
    }

    let file_key = FileKey::generate();
    let file_hash = crypto::sha256_hex(plaintext);

    // Encrypt first; sharding operates on the token, never on plaintext.
    let ciphertext = crypto::encrypt(&file_key, plaintext)?;
    let shards = erasure::encode(&ciphertext, params).map_err(EngineError::Code)?;

    let shard_hashes = shards
        .iter()
        .enumerate()
        .map(|(shard_id, shard)| (shard_id, crypto::sha256_hex(shard)))
        .collect();

    Ok(EncodedFile {
        shards,
        shard_hashes,
        file_key,
        file_hash,
    })
}

/// Verify, reconstruct, and decrypt a shard set.
///
/// Integrity verification is mandatory: every supplied shard is checked
/// against its manifest tag before reconstruction is attempted, and the
/// decrypted plaintext is checked against the whole-file hash.
pub fn recover_and_decrypt(
    params: CodingParams,
    shards: Vec<(usize, Vec<u8>)>,
    shard_hashes: &BTreeMap<usize, String>,
    file_key: &FileKey,
    expected_file_hash: &str,
    expected_size: usize,
) -> Result<Vec<u8>, EngineError> {
    if shards.len() < params.k_required {
        return Err(EngineError::Insufficient {
            have: shards.len(),
            need: params.k_required,
        });
    }

    // Tamper check before any reconstruction work.
    for (shard_id, bytes) in &shards {
        let verified = shard_hashes
            .get(shard_id)
            .is_some_and(|expected| crypto::verify_tag(expected, bytes));
        if !verified {
            return Err(EngineError::ShardTampered {
                shard_id: *shard_id,
            });
        }
    }

    let mut ciphertext = erasure::decode(shards, params).map_err(|e| match e {
        ErasureError::NotEnoughShards { have, need } => EngineError::Insufficient { have, need },
        other => EngineError::Code(other),
    })?;

    // Invert the coder's zero padding. Fernet tokens are base64url ASCII and
    // never contain 0x00.
    let end = ciphertext
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |p| p + 1);
    ciphertext.truncate(end);

    let mut plaintext =
        crypto::decrypt(file_key, &ciphertext).map_err(|_| EngineError::FileTampered)?;
    plaintext.truncate(expected_size);

    if !crypto::verify_tag(expected_file_hash, &plaintext) {
        return Err(EngineError::FileTampered);
    }
    Ok(plaintext)
}
