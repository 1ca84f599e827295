//! Deterministic bucketing.
//!
//! The hash is part of the cross-SDK contract: every implementation must map the same subject and
//! salt to the same bucket. Input is `"{subject}.{salt}"` as UTF-8, hashed with MurmurHash3 (x86,
//! 32-bit, seed 0) and reduced modulo [`BUCKET_SCALE`].
use std::io::Cursor;

use serde::{Deserialize, Serialize};

/// Number of buckets. Rollout weights are expressed on the same scale (100000 = 100%).
pub const BUCKET_SCALE: u32 = 100_000;

const SEED: u32 = 0;

/// A rollout entry: serve `variation_index` to `weight` out of [`BUCKET_SCALE`] buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedVariation {
    pub variation_index: usize,
    pub weight: u32,
}

/// Hash `subject` salted with `salt` into `[0, BUCKET_SCALE)`.
pub fn hash(subject: &str, salt: &str) -> u32 {
    let input = format!("{subject}.{salt}");
    murmur3_32(input.as_bytes()) % BUCKET_SCALE
}

/// Pick a variation for `hash_value`.
///
/// Weights are accumulated in list order and the first entry whose cumulative weight exceeds the
/// hash wins. If weights sum to less than the hash, the last entry is returned. Returns `None` only
/// for an empty list.
pub fn bucket(hash_value: u32, variations: &[WeightedVariation]) -> Option<usize> {
    let mut cumulative: u64 = 0;
    for variation in variations {
        cumulative += u64::from(variation.weight);
        if u64::from(hash_value) < cumulative {
            return Some(variation.variation_index);
        }
    }
    variations.last().map(|variation| variation.variation_index)
}

fn murmur3_32(input: &[u8]) -> u32 {
    murmur3::murmur3_32(&mut Cursor::new(input), SEED)
        .expect("reading from an in-memory buffer should not fail")
}
