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

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique file identifier. Monotonically assigned; never reused within the
/// lifetime of an index.
pub type FileId = u64;

/// Reserved id that no real file ever carries.
pub const INVALID_FILE_ID: FileId = u64::MAX;

/// A 24-bit trigram token: three consecutive path bytes packed into the low
/// bytes of a `u32` (high byte zero).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Trigram(pub u32);

impl Trigram {
    pub fn from_bytes(a: u8, b: u8, c: u8) -> Self {
        Trigram(((a as u32) << 16) | ((b as u32) << 8) | (c as u32))
    }

    pub fn bytes(self) -> [u8; 3] {
        [
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        ]
    }
}

/// Per-file metadata owned by the index. A record whose `path` is empty is a
/// tombstone: the id stays allocated but the file no longer exists for
/// queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: FileId,
    pub path: PathBuf,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: i64,
}

impl FileMeta {
    pub(crate) fn tombstone(id: FileId) -> Self {
        FileMeta {
            id,
            path: PathBuf::new(),
            mode: 0,
            uid: 0,
            gid: 0,
            mtime: 0,
        }
    }

    pub fn is_tombstoned(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

const MODE_READ_OWNER: u32 = 0o400;
const MODE_READ_GROUP: u32 = 0o040;
const MODE_READ_OTHER: u32 = 0o004;

/// Pure read-permission predicate over a metadata record. `mode`, `uid` and
/// `gid` are separate fields; no bit-shifted encoding is involved.
pub fn may_read(meta: &FileMeta, uid: u32, gid: u32) -> bool {
    if uid == 0 {
        return true;
    }
    if meta.mode & MODE_READ_OTHER != 0 {
        return true;
    }
    if meta.uid == uid && meta.mode & MODE_READ_OWNER != 0 {
        return true;
    }
    if meta.gid == gid && meta.mode & MODE_READ_GROUP != 0 {
        return true;
    }
    false
}

/// One search request. `uid`/`gid` drive the permission filter; results are
/// capped at `max_results`.
#[derive(Debug, Clone)]
pub struct QueryCtx {
    pub query: String,
    pub case_sensitive: bool,
    pub regex_enabled: bool,
    pub uid: u32,
    pub gid: u32,
    pub max_results: usize,
}

impl QueryCtx {
    /// Case-sensitive literal query with a default result cap.
    pub fn literal(query: impl Into<String>, uid: u32, gid: u32) -> Self {
        QueryCtx {
            query: query.into(),
            case_sensitive: true,
            regex_enabled: false,
            uid,
            gid,
            max_results: crate::config::MAX_RESULTS,
        }
    }
}

/// Counters exposed for observability and tests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    /// Total metadata records, tombstones included.
    pub num_files: u64,
    /// Distinct trigrams in the sealed directory.
    pub num_trigrams: u64,
    /// Size of the sealed compressed blob in bytes.
    pub blob_bytes: u64,
    /// Posting lists decompressed since the index was created.
    pub lists_decoded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(mode: u32, uid: u32, gid: u32) -> FileMeta {
        FileMeta {
            id: 1,
            path: PathBuf::from("/tmp/x"),
            mode,
            uid,
            gid,
            mtime: 0,
        }
    }

    #[test]
    fn trigram_packing_round_trips() {
        let t = Trigram::from_bytes(b'a', b'b', b'c');
        assert_eq!(t.0 >> 24, 0);
        assert_eq!(t.bytes(), [b'a', b'b', b'c']);
    }

    #[test]
    fn root_reads_everything() {
        assert!(may_read(&meta(0, 42, 42), 0, 0));
    }

    #[test]
    fn world_readable() {
        assert!(may_read(&meta(0o004, 42, 42), 7, 7));
    }

    #[test]
    fn owner_and_group_bits() {
        assert!(may_read(&meta(0o400, 42, 0), 42, 9));
        assert!(!may_read(&meta(0o400, 42, 0), 43, 9));
        assert!(may_read(&meta(0o040, 0, 42), 9, 42));
        assert!(!may_read(&meta(0o040, 0, 42), 9, 43));
    }

    #[test]
    fn tombstone_has_empty_path() {
        assert!(FileMeta::tombstone(3).is_tombstoned());
        assert!(!meta(0, 0, 0).is_tombstoned());
    }
}
