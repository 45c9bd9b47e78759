// Copyright 2025 QFind Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! On-host file-name search engine. An index holds every path reachable
//! from a root as a trigram inverted index (Rice-coded, entropy-compressed
//! posting lists behind a feed-forward Bloom prefilter) plus a path trie
//! for queries below the trigram floor. Filesystem events feed pending
//! batches that a background committer seals; queries run against the most
//! recently sealed state, filtered by the caller's access rights and ranked
//! by relevance.

pub mod bloom;
pub mod config;
pub mod error;
pub mod index;
pub mod lsm;
pub mod postings;
pub mod query;
pub mod trie;
pub mod trigram;
pub mod types;

// Flat re-exports for downstream callers that prefer a small import surface.
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::index::{Index, IndexState};
pub use crate::lsm::{Committer, FsWatcher};
pub use crate::trigram::trigrams;
pub use crate::types::{
    may_read, FileId, FileMeta, IndexStats, QueryCtx, Trigram, INVALID_FILE_ID,
};

/// One-shot convenience: index everything under `root` with defaults and
/// seal the result.
pub fn build_index(root: impl AsRef<std::path::Path>) -> Result<Index> {
    let index = Index::new(Config::default());
    index.build(root.as_ref())?;
    Ok(index)
}
