use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default CLI result cap.
pub const MAX_RESULTS: usize = 10_000;

/// Engine tunables. `Default` carries the values the engine was designed
/// around; callers override individual fields as needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Primary Bloom bit array size in bytes.
    pub bloom_primary_bytes: usize,
    /// Secondary (feed-forward) Bloom bit array size in bytes.
    pub bloom_secondary_bytes: usize,
    /// Hash functions per Bloom lookup.
    pub bloom_hashes: u32,
    /// Upper bound on query worker threads; effective count is
    /// `min(cores, worker_threads)`.
    pub worker_threads: usize,
    /// Per-worker local result buffer cap.
    pub results_per_thread: usize,
    /// Pending adds or deletes that trigger an early commit.
    pub lsm_batch_size: usize,
    /// Deadline between unconditional background commits.
    pub commit_interval: Duration,
    /// Candidates scoring below this are dropped.
    pub score_threshold: f64,
    /// Paths longer than this are rejected as invalid.
    pub max_path_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bloom_primary_bytes: 1 << 25,
            bloom_secondary_bytes: 1 << 24,
            bloom_hashes: 8,
            worker_threads: 16,
            results_per_thread: 512,
            lsm_batch_size: 5000,
            commit_interval: Duration::from_secs(30),
            score_threshold: 0.25,
            max_path_len: 4096,
        }
    }
}
