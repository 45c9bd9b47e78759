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

use std::path::Path;

use qfind::postings::PostingStore;
use qfind::{may_read, Error, FileId, FileMeta, QueryCtx, Trigram};

mod common;
use common::{add, small_index, write_file};

fn query(s: &str) -> QueryCtx {
    QueryCtx::literal(s, 0, 0)
}

#[test]
fn build_then_search_literal() {
    let idx = small_index();
    let a = add(&idx, "/a/notes.txt");
    let b = add(&idx, "/b/notes.md");
    let c = add(&idx, "/c/other.log");
    idx.commit().unwrap();

    let mut q = query("notes");
    q.max_results = 10;
    let mut got = idx.search(&q).unwrap();
    got.sort_unstable();
    assert_eq!(got, vec![a, b]);
    assert!(!got.contains(&c));

    assert!(idx.search(&query("xyz")).unwrap().is_empty());
}

#[test]
fn short_queries_served_by_trie() {
    let idx = small_index();
    let ids = vec![
        add(&idx, "/ab"),
        add(&idx, "/abc"),
        add(&idx, "/abd"),
    ];
    idx.commit().unwrap();

    let mut got = idx.search(&query("ab")).unwrap();
    got.sort_unstable();
    assert_eq!(got, ids);
    assert!(idx.search(&query("ac")).unwrap().is_empty());
}

#[test]
fn deleted_paths_stop_matching() {
    let idx = small_index();
    let a = add(&idx, "/a/notes.txt");
    let _b = add(&idx, "/b/notes.md");
    add(&idx, "/c/other.log");
    idx.commit().unwrap();

    idx.enqueue_del(Path::new("/b/notes.md")).unwrap();
    idx.commit().unwrap();

    assert_eq!(idx.search(&query("notes")).unwrap(), vec![a]);
}

#[test]
fn prefilter_survivors_need_the_whole_needle() {
    let idx = small_index();
    // Contains every trigram of "abcd" without containing "abcd" itself.
    add(&idx, "/x/abc_bcd.txt");
    // And two files that split the trigrams between them.
    add(&idx, "/y/abc.txt");
    add(&idx, "/z/bcd.txt");
    idx.commit().unwrap();

    assert!(idx.search(&query("abcd")).unwrap().is_empty());
}

#[test]
fn absent_trigrams_skip_decompression() {
    let idx = small_index();
    add(&idx, "/a/notes.txt");
    idx.commit().unwrap();
    assert_eq!(idx.stats().lists_decoded, 0);

    assert!(idx.search(&query("qqq")).unwrap().is_empty());
    assert_eq!(idx.stats().lists_decoded, 0);

    idx.search(&query("notes")).unwrap();
    assert!(idx.stats().lists_decoded > 0);
}

#[test]
fn positive_lookups_warm_the_candidate_set() {
    let idx = small_index();
    add(&idx, "/a/notes.txt");
    add(&idx, "/b/notes.md");
    add(&idx, "/c/other.log");
    idx.commit().unwrap();

    let tris: Vec<Trigram> = qfind::trigrams(b"notes").collect();
    assert!(idx.recorded_candidates(&tris).is_empty());

    idx.search(&query("notes")).unwrap();
    assert_eq!(idx.recorded_candidates(&tris).len(), 3);
}

#[test]
fn empty_query_is_invalid() {
    let idx = small_index();
    add(&idx, "/a/notes.txt");
    idx.commit().unwrap();
    assert!(matches!(
        idx.search(&query("")),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn every_indexed_path_finds_itself() {
    let idx = small_index();
    let mut ids = Vec::new();
    for i in 0..120u32 {
        ids.push(add(
            &idx,
            &format!("/corpus/dir{:02}/file_{:03}.dat", i % 10, i),
        ));
    }
    idx.commit().unwrap();

    for i in (0..120usize).step_by(7) {
        let path = format!("/corpus/dir{:02}/file_{:03}.dat", i % 10, i);
        let got = idx.search(&query(&path)).unwrap();
        assert!(
            got.contains(&ids[i]),
            "query {:?} missed id {}",
            path,
            ids[i]
        );
    }
}

#[test]
fn substrings_of_indexed_paths_are_found() {
    let idx = small_index();
    let mut target = 0;
    for i in 0..40u32 {
        let id = add(&idx, &format!("/var/spool/job_{:02}.tmp", i));
        if i == 7 {
            target = id;
        }
    }
    idx.commit().unwrap();

    let path = "/var/spool/job_07.tmp";
    for len in 3..=8 {
        for start in 0..=(path.len() - len) {
            let sub = &path[start..start + len];
            let got = idx.search(&query(sub)).unwrap();
            assert!(
                got.contains(&target),
                "substring {:?} missed the path",
                sub
            );
        }
    }
}

#[test]
fn case_insensitive_search_folds_ascii() {
    let idx = small_index();
    let a = add(&idx, "/docs/Notes.TXT");
    add(&idx, "/docs/other.log");
    add(&idx, "/docs/readme.rst");
    add(&idx, "/docs/todo.org");
    idx.commit().unwrap();

    // Case-sensitive query misses the differently-cased path.
    assert!(idx.search(&query("notes")).unwrap().is_empty());

    let mut q = query("notes");
    q.case_sensitive = false;
    assert_eq!(idx.search(&q).unwrap(), vec![a]);
}

#[test]
fn regex_queries_confirm_with_the_pattern() {
    let idx = small_index();
    let a = add(&idx, "/srv/app/access.log");
    let b = add(&idx, "/srv/app/access.log.1");
    add(&idx, "/srv/app/error.log");
    idx.commit().unwrap();

    let mut q = query("access.*log");
    q.regex_enabled = true;
    let mut got = idx.search(&q).unwrap();
    got.sort_unstable();
    assert_eq!(got, vec![a, b]);

    let mut anchored = query(r"access\.log$");
    anchored.regex_enabled = true;
    assert_eq!(idx.search(&anchored).unwrap(), vec![a]);
}

#[test]
fn permission_filter_hides_unreadable_files() {
    let idx = small_index();
    let open_id = idx.alloc_id();
    idx.add_file_with_meta(FileMeta {
        id: open_id,
        path: "/srv/shared/report.txt".into(),
        mode: 0o444,
        uid: 1000,
        gid: 1000,
        mtime: 0,
    })
    .unwrap();
    let private_id = idx.alloc_id();
    idx.add_file_with_meta(FileMeta {
        id: private_id,
        path: "/srv/private/report.txt".into(),
        mode: 0o400,
        uid: 1000,
        gid: 1000,
        mtime: 0,
    })
    .unwrap();
    add(&idx, "/srv/misc/scratch.dat");
    add(&idx, "/srv/misc/archive.tar");
    idx.commit().unwrap();

    let owner = QueryCtx {
        uid: 1000,
        gid: 1000,
        ..query("report")
    };
    let mut got = idx.search(&owner).unwrap();
    got.sort_unstable();
    assert_eq!(got, vec![open_id, private_id]);

    let stranger = QueryCtx {
        uid: 2000,
        gid: 2000,
        ..query("report")
    };
    assert_eq!(idx.search(&stranger).unwrap(), vec![open_id]);

    // The filter also applies to trie-served short queries.
    let meta = idx.meta(private_id).unwrap();
    assert!(!may_read(&meta, 2000, 2000));
}

#[test]
fn posting_lists_round_trip_at_every_size() {
    for &n in &[1usize, 2, 100, 10_000] {
        let mut store = PostingStore::new();
        let t = Trigram::from_bytes(b'q', b'f', b'd');
        let mut x: u64 = 0x9E37_79B9 ^ n as u64;
        let mut ids: Vec<FileId> = Vec::with_capacity(n);
        for _ in 0..n {
            x = x
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ids.push(x >> 16);
        }
        for &id in &ids {
            store.append(t, id).unwrap();
        }
        let blob = store.seal().unwrap();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(blob.decode(t).unwrap(), ids, "length {}", n);
    }
}

#[test]
fn many_distinct_trigrams_all_retrievable() {
    let idx = small_index();
    let mut ids = Vec::new();
    for i in 0..200u32 {
        // Each path carries a distinctive three-letter marker.
        let marker = format!(
            "{}{}{}",
            (b'a' + (i % 26) as u8) as char,
            (b'a' + ((i / 26) % 26) as u8) as char,
            (b'0' + (i % 10) as u8) as char
        );
        ids.push(add(&idx, &format!("/pool/{}_{:03}.bin", marker, i)));
    }
    idx.commit().unwrap();

    for (i, &id) in ids.iter().enumerate() {
        let i = i as u32;
        let marker = format!(
            "{}{}{}",
            (b'a' + (i % 26) as u8) as char,
            (b'a' + ((i / 26) % 26) as u8) as char,
            (b'0' + (i % 10) as u8) as char
        );
        let got = idx.search(&query(&marker)).unwrap();
        assert!(got.contains(&id), "marker {:?} missed its file", marker);
    }
}

#[test]
fn walked_tree_is_searchable() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a/notes.txt", b"alpha");
    write_file(dir.path(), "b/notes.md", b"beta");
    write_file(dir.path(), "c/other.log", b"gamma");

    let idx = qfind::build_index(dir.path()).unwrap();
    assert_eq!(idx.stats().num_files, 3);

    let got = idx.search(&query("notes")).unwrap();
    let paths = idx.resolve_paths(&got);
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.is_absolute()));
}
