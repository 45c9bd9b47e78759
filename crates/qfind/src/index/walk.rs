//! Build-path walker adapter: feeds every regular file under a root into
//! the index, carrying ownership and mode bits from the filesystem.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::types::{FileId, FileMeta};

use super::Index;

/// Stat a path into a metadata record. Paths that cannot be stat'ed are
/// recorded world-readable with zero owners so synthetic entries stay
/// queryable.
pub(crate) fn stat_meta(path: &Path, id: FileId) -> FileMeta {
    match std::fs::symlink_metadata(path) {
        Ok(md) => FileMeta {
            id,
            path: path.to_path_buf(),
            mode: md.mode(),
            uid: md.uid(),
            gid: md.gid(),
            mtime: md.mtime(),
        },
        Err(_) => FileMeta {
            id,
            path: path.to_path_buf(),
            mode: 0o444,
            uid: 0,
            gid: 0,
            mtime: 0,
        },
    }
}

/// Walk `root` and add every regular file. Unreadable entries are skipped
/// with a warning; the walk itself continues.
pub(crate) fn walk_into(index: &Index, root: &Path) -> Result<u64> {
    let mut builder = ignore::WalkBuilder::new(root);
    builder.standard_filters(false);
    builder.follow_links(false);
    let mut count = 0u64;
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let md = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "stat failed");
                continue;
            }
        };
        let path = std::path::absolute(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
        let id = index.alloc_id();
        index.add_file_with_meta(FileMeta {
            id,
            path,
            mode: md.mode(),
            uid: md.uid(),
            gid: md.gid(),
            mtime: md.mtime(),
        })?;
        count += 1;
    }
    Ok(count)
}
