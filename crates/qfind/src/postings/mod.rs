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

//! Posting-list store. During build, each trigram owns a growable unsorted
//! id list. Sealing sorts and deduplicates every list, delta-encodes it,
//! Rice-codes the deltas with a per-list parameter, entropy-codes the result
//! and packs everything into one contiguous blob addressed by a per-trigram
//! directory.

use ahash::AHashMap;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::types::{FileId, Trigram};

mod rice;

/// Directory record for one trigram's compressed posting list. `rice_k` is
/// persisted because decoding needs it.
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub file_count: u32,
    pub offset: usize,
    pub len: usize,
    pub rice_k: u8,
}

/// The sealed result of a commit: every posting list back-to-back in one
/// buffer, plus the directory. Replaced wholesale at the next commit.
#[derive(Debug, Default)]
pub struct CompressedBlob {
    bytes: Vec<u8>,
    dir: AHashMap<Trigram, DirEntry>,
}

impl CompressedBlob {
    pub fn entry(&self, tri: Trigram) -> Option<&DirEntry> {
        self.dir.get(&tri)
    }

    pub fn num_trigrams(&self) -> usize {
        self.dir.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode one posting list back to its strictly ascending id sequence.
    /// Exact inverse of the seal pipeline: entropy decode, Rice decode,
    /// prefix sum.
    pub fn decode(&self, tri: Trigram) -> Result<Vec<FileId>> {
        let entry = match self.dir.get(&tri) {
            Some(e) => e,
            None => return Ok(Vec::new()),
        };
        let end = entry
            .offset
            .checked_add(entry.len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::Corruption("directory slice out of bounds".into()))?;
        let coded = zstd::decode_all(&self.bytes[entry.offset..end])
            .map_err(|e| Error::Corruption(format!("entropy decode failed: {}", e)))?;
        let deltas = rice::rice_decode(&coded, entry.rice_k, entry.file_count as usize)?;
        let mut out = Vec::new();
        out.try_reserve(deltas.len())?;
        let mut prev: FileId = 0;
        for d in deltas {
            prev = prev
                .checked_add(d)
                .ok_or_else(|| Error::Corruption("prefix sum overflow".into()))?;
            out.push(prev);
        }
        Ok(out)
    }
}

/// Build-side store: raw append-only id lists keyed by trigram.
#[derive(Debug, Default)]
pub struct PostingStore {
    lists: AHashMap<Trigram, Vec<FileId>>,
}

/// Initial posting buffer capacity; growth is geometric from here.
const POSTING_CHUNK: usize = 64;

impl PostingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_trigrams(&self) -> usize {
        self.lists.len()
    }

    /// Append an id to a trigram's list. Duplicates are allowed here; they
    /// are dropped at seal time.
    pub fn append(&mut self, tri: Trigram, id: FileId) -> Result<()> {
        let list = self.lists.entry(tri).or_default();
        if list.len() == list.capacity() {
            list.try_reserve(list.capacity().max(POSTING_CHUNK))?;
        }
        list.push(id);
        Ok(())
    }

    /// Sort and deduplicate every list in place, then compress each into a
    /// fresh blob. The raw lists stay behind for the next build phase; the
    /// caller swaps the returned blob in only on success.
    pub fn seal(&mut self) -> Result<CompressedBlob> {
        let mut tris: Vec<Trigram> = self.lists.keys().copied().collect();
        // Deterministic blob layout: identical inputs produce identical bytes.
        tris.sort_unstable();

        for t in &tris {
            if let Some(list) = self.lists.get_mut(t) {
                list.sort_unstable();
                list.dedup();
            }
        }

        let lists = &self.lists;
        let encoded: Vec<(Trigram, u32, u8, Vec<u8>)> = tris
            .par_iter()
            .map(|&t| -> Result<(Trigram, u32, u8, Vec<u8>)> {
                let list = &lists[&t];
                let mut deltas = Vec::new();
                deltas.try_reserve(list.len())?;
                let mut prev: FileId = 0;
                for &v in list {
                    deltas.push(v - prev);
                    prev = v;
                }
                let k = rice::rice_parameter(&deltas);
                let coded = rice::rice_encode(&deltas, k);
                let packed = zstd::encode_all(&coded[..], 0).map_err(Error::Io)?;
                Ok((t, list.len() as u32, k, packed))
            })
            .collect::<Result<Vec<_>>>()?;

        let total: usize = encoded.iter().map(|e| e.3.len()).sum();
        let mut bytes = Vec::new();
        bytes.try_reserve(total)?;
        let mut dir = AHashMap::with_capacity(encoded.len());
        for (t, file_count, rice_k, packed) in encoded {
            dir.insert(
                t,
                DirEntry {
                    file_count,
                    offset: bytes.len(),
                    len: packed.len(),
                    rice_k,
                },
            );
            bytes.extend_from_slice(&packed);
        }
        Ok(CompressedBlob { bytes, dir })
    }
}
