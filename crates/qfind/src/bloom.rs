//! Feed-forward Bloom pair: a primary filter answering membership and a
//! secondary filter that records every positively answered lookup.

use ahash::RandomState;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::Trigram;

/// Seed offset separating the secondary hash family from the primary one.
const SECONDARY_SEED_OFFSET: u64 = 0xA5A5_A5A5;

/// Fixed salts so the hash families are stable across runs.
const SALT1: u64 = 0x9E37_79B9_7F4A_7C15;
const SALT2: u64 = 0x6C62_272E_07BB_0142;
const SALT3: u64 = 0x2545_F491_4F6C_DD1D;

fn seeded_hash(data: &[u8], seed: u64) -> u64 {
    RandomState::with_seeds(seed, SALT1, SALT2, SALT3).hash_one(data)
}

/// Both bit arrays are append-only: bits transition 0 to 1 and never back.
/// Byte-granularity atomic OR keeps concurrent `check`/`add` safe without a
/// lock.
pub struct FeedForwardBloom {
    primary: Box<[AtomicU8]>,
    secondary: Box<[AtomicU8]>,
    hashes: u32,
}

fn zeroed(len: usize) -> Box<[AtomicU8]> {
    (0..len).map(|_| AtomicU8::new(0)).collect()
}

impl FeedForwardBloom {
    pub fn new(primary_bytes: usize, secondary_bytes: usize, hashes: u32) -> Self {
        FeedForwardBloom {
            primary: zeroed(primary_bytes.max(1)),
            secondary: zeroed(secondary_bytes.max(1)),
            hashes: hashes.max(1),
        }
    }

    /// Set the k primary bits for `item`.
    pub fn add(&self, item: Trigram) {
        let data = item.0.to_le_bytes();
        let nbits = self.primary.len() as u64 * 8;
        for i in 0..self.hashes {
            let bit = seeded_hash(&data, i as u64) % nbits;
            self.primary[(bit / 8) as usize].fetch_or(1 << (bit % 8), Ordering::Relaxed);
        }
    }

    /// Probabilistic membership test. A single unset primary bit is a
    /// definitive "not present"; a positive answer may be a false positive
    /// and is recorded in the secondary filter as a side effect.
    pub fn check(&self, item: Trigram) -> bool {
        let data = item.0.to_le_bytes();
        let nbits = self.primary.len() as u64 * 8;
        for i in 0..self.hashes {
            let bit = seeded_hash(&data, i as u64) % nbits;
            let byte = self.primary[(bit / 8) as usize].load(Ordering::Relaxed);
            if byte & (1 << (bit % 8)) == 0 {
                return false;
            }
        }
        self.record_secondary(item);
        true
    }

    fn record_secondary(&self, item: Trigram) {
        let data = item.0.to_le_bytes();
        let nbits = self.secondary.len() as u64 * 8;
        for i in 0..self.hashes {
            let bit = seeded_hash(&data, i as u64 + SECONDARY_SEED_OFFSET) % nbits;
            self.secondary[(bit / 8) as usize].fetch_or(1 << (bit % 8), Ordering::Relaxed);
        }
    }

    fn secondary_contains(&self, item: Trigram) -> bool {
        let data = item.0.to_le_bytes();
        let nbits = self.secondary.len() as u64 * 8;
        for i in 0..self.hashes {
            let bit = seeded_hash(&data, i as u64 + SECONDARY_SEED_OFFSET) % nbits;
            let byte = self.secondary[(bit / 8) as usize].load(Ordering::Relaxed);
            if byte & (1 << (bit % 8)) == 0 {
                return false;
            }
        }
        true
    }

    /// Subset of `patterns` that earlier positive lookups have recorded in
    /// the secondary filter.
    pub fn candidates(&self, patterns: &[Trigram]) -> Vec<Trigram> {
        patterns
            .iter()
            .copied()
            .filter(|&t| self.secondary_contains(t))
            .collect()
    }
}
