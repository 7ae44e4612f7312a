//! Reed-Solomon erasure coding over ciphertext
//!
//! Systematic `(k, m)` code in GF(2^8): the ciphertext is zero-padded to
//! `k * ceil(len / k)` bytes and split into `k` data shards, then `m - k`
//! parity shards are generated. Any `k` distinct shards plus their indices
//! recover the padded ciphertext exactly.

use reed_solomon_erasure::galois_8::ReedSolomon;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErasureError {
    #[error("not enough shards to reconstruct (have {have}, need {need})")]
    NotEnoughShards { have: usize, need: usize },
    #[error("shard index {shard_id} out of range for {m_total} shards")]
    InvalidShardIndex { shard_id: usize, m_total: usize },
    #[error("shards have inconsistent sizes")]
    MismatchedShardSize,
    #[error("unsupported coding parameters (k={k_required}, m={m_total})")]
    InvalidParams { k_required: usize, m_total: usize },
    #[error("coder error: {0}")]
    Coder(#[from] reed_solomon_erasure::Error),
}

/// Erasure coding parameters: `k_required` of `m_total` shards reconstruct.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct CodingParams {
    /// Minimum shards needed for reconstruction (k)
    pub k_required: usize,
    /// Total shards created (m)
    pub m_total: usize,
}

impl Default for CodingParams {
    fn default() -> Self {
        // any 3 of 5 shards reconstruct
        Self {
            k_required: 3,
            m_total: 5,
        }
    }
}

impl CodingParams {
    /// Validated constructor. Bounds: `1 <= k < m <= 255` (GF(2^8) symbol
    /// limit; at least one parity shard).
    pub fn new(k_required: usize, m_total: usize) -> Result<Self, ErasureError> {
        if k_required == 0 || k_required >= m_total || m_total > 255 {
            return Err(ErasureError::InvalidParams {
                k_required,
                m_total,
            });
        }
        Ok(Self {
            k_required,
            m_total,
        })
    }

    /// Number of parity shards (m - k).
    pub fn parity(&self) -> usize {
        self.m_total - self.k_required
    }

    /// Shards that can be lost while remaining recoverable.
    pub fn fault_tolerance(&self) -> usize {
        self.parity()
    }

    fn coder(&self) -> Result<ReedSolomon, ErasureError> {
        Ok(ReedSolomon::new(self.k_required, self.parity())?)
    }
}

/// Encode `data` into `m_total` equal-length shards.
pub fn encode(data: &[u8], params: CodingParams) -> Result<Vec<Vec<u8>>, ErasureError> {
    let shard_len = data.len().div_ceil(params.k_required);

    let mut shards: Vec<Vec<u8>> = Vec::with_capacity(params.m_total);
    for i in 0..params.k_required {
        let start = (i * shard_len).min(data.len());
        let end = (start + shard_len).min(data.len());
        let mut shard = data[start..end].to_vec();
        shard.resize(shard_len, 0);
        shards.push(shard);
    }
    for _ in 0..params.parity() {
        shards.push(vec![0u8; shard_len]);
    }

    params.coder()?.encode(&mut shards)?;
    Ok(shards)
}

/// Decode `(shard_id, bytes)` pairs back into the padded ciphertext.
///
/// Accepts any subset of at least `k_required` distinct shards; extra shards
/// are used to fill reconstruction slots and otherwise ignored.
pub fn decode(
    shards: Vec<(usize, Vec<u8>)>,
    params: CodingParams,
) -> Result<Vec<u8>, ErasureError> {
    let mut slots: Vec<Option<Vec<u8>>> = vec![None; params.m_total];
    let mut shard_len: Option<usize> = None;

    for (shard_id, bytes) in shards {
        if shard_id >= params.m_total {
            return Err(ErasureError::InvalidShardIndex {
                shard_id,
                m_total: params.m_total,
            });
        }
        match shard_len {
            None => shard_len = Some(bytes.len()),
            Some(len) if len != bytes.len() => return Err(ErasureError::MismatchedShardSize),
            Some(_) => {}
        }
        slots[shard_id] = Some(bytes);
    }

    let have = slots.iter().filter(|s| s.is_some()).count();
    if have < params.k_required {
        return Err(ErasureError::NotEnoughShards {
            have,
            need: params.k_required,
        });
    }

    params.coder()?.reconstruct(&mut slots)?;

    let mut data = Vec::with_capacity(shard_len.unwrap_or(0) * params.k_required);
    for slot in slots.into_iter().take(params.k_required) {
        // reconstruct fills every slot or errors out
        match slot {
            Some(shard) => data.extend_from_slice(&shard),
            None => return Err(ErasureError::MismatchedShardSize),
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_params() {
        assert!(CodingParams::new(0, 5).is_err());
        assert!(CodingParams::new(5, 5).is_err());
        assert!(CodingParams::new(6, 5).is_err());
        assert!(CodingParams::new(3, 300).is_err());
        assert!(CodingParams::new(3, 5).is_ok());
    }

    #[test]
    fn encode_decode_no_loss() {
        let data = b"erasure coded ciphertext payload for the roundtrip test";
        let params = CodingParams::default();

        let shards = encode(data, params).unwrap();
        assert_eq!(shards.len(), params.m_total);
        assert!(shards.iter().all(|s| s.len() == shards[0].len()));

        let indexed: Vec<(usize, Vec<u8>)> = shards.into_iter().enumerate().collect();
        let decoded = decode(indexed, params).unwrap();

        assert_eq!(&decoded[..data.len()], data.as_slice());
        assert!(decoded[data.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn every_threshold_subset_reconstructs() {
        let data: Vec<u8> = (0u8..=255).cycle().take(1031).collect();
        let params = CodingParams::default();
        let shards = encode(&data, params).unwrap();

        for a in 0..params.m_total {
            for b in (a + 1)..params.m_total {
                for c in (b + 1)..params.m_total {
                    let subset: Vec<(usize, Vec<u8>)> = [a, b, c]
                        .iter()
                        .map(|&i| (i, shards[i].clone()))
                        .collect();
                    let decoded = decode(subset, params).unwrap();
                    assert_eq!(&decoded[..data.len()], &data[..], "subset {a},{b},{c}");
                }
            }
        }
    }

    #[test]
    fn below_threshold_fails() {
        let data = b"below threshold";
        let params = CodingParams::default();
        let shards = encode(data, params).unwrap();

        let subset = vec![(0, shards[0].clone()), (4, shards[4].clone())];
        let err = decode(subset, params).unwrap_err();
        assert!(matches!(
            err,
            ErasureError::NotEnoughShards { have: 2, need: 3 }
        ));
    }

    #[test]
    fn duplicate_indices_do_not_inflate_count() {
        let data = b"duplicate shard ids";
        let params = CodingParams::default();
        let shards = encode(data, params).unwrap();

        let subset = vec![
            (1, shards[1].clone()),
            (1, shards[1].clone()),
            (2, shards[2].clone()),
        ];
        let err = decode(subset, params).unwrap_err();
        assert!(matches!(err, ErasureError::NotEnoughShards { have: 2, .. }));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let params = CodingParams::default();
        let err = decode(vec![(7, vec![0u8; 4])], params).unwrap_err();
        assert!(matches!(err, ErasureError::InvalidShardIndex { shard_id: 7, .. }));
    }

    #[test]
    fn mismatched_sizes_rejected() {
        let params = CodingParams::default();
        let err = decode(
            vec![(0, vec![0u8; 4]), (1, vec![0u8; 5])],
            params,
        )
        .unwrap_err();
        assert!(matches!(err, ErasureError::MismatchedShardSize));
    }
}
