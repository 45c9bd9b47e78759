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

//! The index aggregate: metadata table, path trie, posting-list store,
//! Bloom pair and the sealed compressed blob, all behind one reader/writer
//! lock. Queries take the lock in read mode and observe the most recently
//! sealed state; every mutation takes it in write mode.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use fnv::FnvHashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::bloom::FeedForwardBloom;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lsm::UpdateQueues;
use crate::postings::{CompressedBlob, PostingStore};
use crate::trie::PathTrie;
use crate::trigram::{fold_ascii, trigrams};
use crate::types::{FileId, FileMeta, IndexStats, QueryCtx, Trigram};

pub(crate) mod walk;

/// Lifecycle of the aggregate. Only sealed state carries committed posting
/// data; mutation moves the index back to `Building` until the next commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Building,
    Sealed,
}

pub(crate) struct IndexInner {
    pub(crate) metas: Vec<FileMeta>,
    pub(crate) path_ids: FnvHashMap<PathBuf, FileId>,
    pub(crate) trie: PathTrie,
    pub(crate) store: PostingStore,
    pub(crate) sealed: CompressedBlob,
    pub(crate) state: IndexState,
}

pub struct Index {
    inner: RwLock<IndexInner>,
    bloom: FeedForwardBloom,
    next_id: AtomicU64,
    pub(crate) queues: UpdateQueues,
    config: Config,
    lists_decoded: AtomicU64,
}

impl Index {
    pub fn new(config: Config) -> Self {
        let bloom = FeedForwardBloom::new(
            config.bloom_primary_bytes,
            config.bloom_secondary_bytes,
            config.bloom_hashes,
        );
        Index {
            inner: RwLock::new(IndexInner {
                metas: Vec::new(),
                path_ids: FnvHashMap::default(),
                trie: PathTrie::new(),
                store: PostingStore::new(),
                sealed: CompressedBlob::default(),
                state: IndexState::Empty,
            }),
            bloom,
            next_id: AtomicU64::new(0),
            queues: UpdateQueues::new(),
            config,
            lists_decoded: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn bloom(&self) -> &FeedForwardBloom {
        &self.bloom
    }

    /// Subset of `patterns` that earlier queries have asked about and been
    /// answered "maybe" for. Analytics only; the resolver never reads it.
    pub fn recorded_candidates(&self, patterns: &[Trigram]) -> Vec<Trigram> {
        self.bloom.candidates(patterns)
    }

    pub(crate) fn read_inner(&self) -> RwLockReadGuard<'_, IndexInner> {
        self.inner.read()
    }

    pub(crate) fn count_decode(&self) {
        self.lists_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Allocate a fresh id. Independent of the index lock; ids are never
    /// reused, tombstoned or not.
    pub fn alloc_id(&self) -> FileId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Walk `root`, add every regular file, and commit. Returns the number
    /// of files indexed.
    pub fn build(&self, root: &Path) -> Result<u64> {
        let count = walk::walk_into(self, root)?;
        self.commit()?;
        Ok(count)
    }

    /// Add one path under a caller-allocated id, stat'ing the path for
    /// ownership when possible.
    pub fn add_file(&self, path: &Path, id: FileId) -> Result<()> {
        self.add_file_with_meta(walk::stat_meta(path, id))
    }

    /// Add one path with explicit metadata.
    pub fn add_file_with_meta(&self, meta: FileMeta) -> Result<()> {
        self.validate_path(&meta.path)?;
        let mut guard = self.inner.write();
        self.add_locked(&mut guard, meta)
    }

    fn validate_path(&self, path: &Path) -> Result<()> {
        let len = path.as_os_str().len();
        if len == 0 || len > self.config.max_path_len {
            return Err(Error::InvalidArgument(format!(
                "path length {} outside 1..={}",
                len, self.config.max_path_len
            )));
        }
        Ok(())
    }

    fn add_locked(&self, inner: &mut IndexInner, meta: FileMeta) -> Result<()> {
        use std::os::unix::ffi::OsStrExt;

        let id = meta.id;
        let raw = meta.path.as_os_str().as_bytes().to_vec();
        let folded = fold_ascii(&raw);

        // The table is indexed directly by id; pad any gap left by
        // out-of-order application with tombstoned placeholders.
        let idx = id as usize;
        if idx >= inner.metas.len() {
            let mut next = inner.metas.len() as FileId;
            while next <= id {
                inner.metas.push(FileMeta::tombstone(next));
                next += 1;
            }
        }

        inner.path_ids.insert(meta.path.clone(), id);
        inner.trie.insert(&raw, id);
        for tri in trigrams(&folded) {
            self.bloom.add(tri);
            inner.store.append(tri, id)?;
        }
        inner.metas[idx] = meta;
        inner.state = IndexState::Building;
        Ok(())
    }

    /// Queue a path for addition. The id is assigned now; the file becomes
    /// visible to queries only after the next commit.
    pub fn enqueue_add(&self, path: &Path) -> Result<()> {
        self.validate_path(path)?;
        let id = self.alloc_id();
        {
            let mut inner = self.inner.write();
            inner.path_ids.insert(path.to_path_buf(), id);
            inner.state = IndexState::Building;
        }
        self.queues
            .push_add(id, path.to_path_buf(), self.config.lsm_batch_size)
    }

    /// Queue a deletion. The path must currently be indexed (or pending).
    pub fn enqueue_del(&self, path: &Path) -> Result<()> {
        self.validate_path(path)?;
        let id = {
            let mut inner = self.inner.write();
            let id = inner
                .path_ids
                .remove(path)
                .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
            inner.state = IndexState::Building;
            id
        };
        self.queues
            .push_del(id, path.to_path_buf(), self.config.lsm_batch_size)
    }

    /// Seal all pending work: swap the batches out, apply adds through the
    /// same path as the initial build, tombstone deletes, recompress every
    /// posting list, and publish the fresh blob. On failure the previously
    /// sealed blob stays in place.
    pub fn commit(&self) -> Result<()> {
        let started = Instant::now();
        let (adds, dels) = self.queues.drain();

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        for op in adds {
            self.add_locked(inner, walk::stat_meta(&op.path, op.id))?;
        }
        for op in dels {
            if let Some(meta) = inner.metas.get_mut(op.id as usize) {
                meta.path = PathBuf::new();
            }
        }
        let blob = inner.store.seal()?;
        inner.sealed = blob;
        inner.state = IndexState::Sealed;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            files = inner.metas.len(),
            trigrams = inner.sealed.num_trigrams(),
            blob_bytes = inner.sealed.bytes().len(),
            "commit sealed"
        );
        Ok(())
    }

    /// Resolve a query to ranked file ids. Empty queries are invalid; one-
    /// and two-byte queries are served by the trie.
    pub fn search(&self, query: &QueryCtx) -> Result<Vec<FileId>> {
        if query.query.is_empty() {
            return Err(Error::InvalidArgument("empty query".into()));
        }
        if query.max_results == 0 {
            return Ok(Vec::new());
        }
        let inner = self.inner.read();
        crate::query::resolver::resolve(self, &inner, query)
    }

    /// Map ids back to their absolute paths, skipping tombstones.
    pub fn resolve_paths(&self, ids: &[FileId]) -> Vec<PathBuf> {
        let inner = self.inner.read();
        ids.iter()
            .filter_map(|&id| inner.metas.get(id as usize))
            .filter(|m| !m.is_tombstoned())
            .map(|m| m.path.clone())
            .collect()
    }

    /// Clone of one metadata record, if the id was ever allocated.
    pub fn meta(&self, id: FileId) -> Option<FileMeta> {
        self.inner.read().metas.get(id as usize).cloned()
    }

    pub fn state(&self) -> IndexState {
        self.inner.read().state
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        IndexStats {
            num_files: inner.metas.len() as u64,
            num_trigrams: inner.sealed.num_trigrams() as u64,
            blob_bytes: inner.sealed.bytes().len() as u64,
            lists_decoded: self.lists_decoded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_transitions() {
        let idx = Index::new(Config::default());
        assert_eq!(idx.state(), IndexState::Empty);
        let id = idx.alloc_id();
        idx.add_file(Path::new("/tmp/a.txt"), id).unwrap();
        assert_eq!(idx.state(), IndexState::Building);
        idx.commit().unwrap();
        assert_eq!(idx.state(), IndexState::Sealed);
        idx.enqueue_add(Path::new("/tmp/b.txt")).unwrap();
        assert_eq!(idx.state(), IndexState::Building);
        idx.commit().unwrap();
        assert_eq!(idx.state(), IndexState::Sealed);
    }

    #[test]
    fn ids_are_never_reused() {
        let idx = Index::new(Config::default());
        let a = idx.alloc_id();
        let b = idx.alloc_id();
        assert!(b > a);
        idx.add_file(Path::new("/tmp/x"), a).unwrap();
        idx.commit().unwrap();
        idx.enqueue_del(Path::new("/tmp/x")).unwrap();
        idx.commit().unwrap();
        assert!(idx.alloc_id() > b);
        assert!(idx.meta(a).unwrap().is_tombstoned());
    }

    #[test]
    fn delete_of_unknown_path_is_not_found() {
        let idx = Index::new(Config::default());
        let err = idx.enqueue_del(Path::new("/nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn oversized_path_rejected() {
        let idx = Index::new(Config::default());
        let long = "/".repeat(5000);
        let err = idx.add_file(Path::new(&long), idx.alloc_id()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
