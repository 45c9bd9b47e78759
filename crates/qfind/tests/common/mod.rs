use std::path::Path;

use qfind::{Config, FileId, Index};

/// Engine with shrunken Bloom arrays so tests stay light; everything else
/// is at defaults.
#[allow(dead_code)]
pub fn small_index() -> Index {
    Index::new(small_config())
}

#[allow(dead_code)]
pub fn small_config() -> Config {
    Config {
        bloom_primary_bytes: 1 << 16,
        bloom_secondary_bytes: 1 << 15,
        ..Config::default()
    }
}

/// Add a synthetic path and return its id.
#[allow(dead_code)]
pub fn add(index: &Index, path: &str) -> FileId {
    let id = index.alloc_id();
    index
        .add_file(Path::new(path), id)
        .expect("add synthetic path");
    id
}

/// Write a file relative to a temp root.
#[allow(dead_code)]
pub fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let p = root.join(rel);
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(p, contents).expect("write file");
}
