//! Byte-labeled path trie serving queries below the trigram floor (one or
//! two bytes). Runs of repeated bytes collapse into a dedicated run edge; a
//! run edge is its own variant, so no byte value is reserved as a sentinel.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::FileId;

/// Edges are keyed by `(byte, run_len)`; `run_len >= 2` marks a compressed
/// run of equal bytes.
#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<(u8, u32), Node>,
    terminal: Option<FileId>,
}

#[derive(Debug, Default)]
pub struct PathTrie {
    root: Node,
    paths: usize,
}

impl PathTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths == 0
    }

    /// Insert a full path. Re-inserting the same path overwrites the stored
    /// id, which is how a re-created file takes over from a tombstoned one.
    pub fn insert(&mut self, path: &[u8], id: FileId) {
        let mut node = &mut self.root;
        let mut i = 0;
        while i < path.len() {
            let b = path[i];
            let mut run = 1u32;
            while i + (run as usize) < path.len() && path[i + run as usize] == b {
                run += 1;
            }
            node = node.children.entry((b, run)).or_default();
            i += run as usize;
        }
        if node.terminal.is_none() {
            self.paths += 1;
        }
        node.terminal = Some(id);
    }

    /// All ids whose path contains `query` anywhere, up to `limit`. Matching
    /// may start at any node and at any offset inside a run edge.
    pub fn find_containing(&self, query: &[u8], fold_case: bool, limit: usize) -> Vec<FileId> {
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let query: Vec<u8> = if fold_case {
            query.to_ascii_lowercase()
        } else {
            query.to_vec()
        };
        let mut out = BTreeSet::new();
        walk(&self.root, &query, fold_case, limit, &mut out);
        out.into_iter().collect()
    }
}

fn edge_byte(b: u8, fold: bool) -> u8 {
    if fold {
        b.to_ascii_lowercase()
    } else {
        b
    }
}

/// Visit every node, attempting a fresh match against each outgoing edge.
fn walk(node: &Node, query: &[u8], fold: bool, limit: usize, out: &mut BTreeSet<FileId>) {
    if out.len() >= limit {
        return;
    }
    for (&(b, run), child) in &node.children {
        let eb = edge_byte(b, fold);
        // Match entirely inside this run.
        if query.iter().all(|&c| c == eb) && run as usize >= query.len() {
            collect(child, limit, out);
        }
        // Match starting in the run's suffix and continuing below the child.
        let tail_max = (run as usize).min(query.len() - 1);
        for consumed in 1..=tail_max {
            if query[..consumed].iter().all(|&c| c == eb) {
                continue_match(child, &query[consumed..], fold, limit, out);
            }
        }
        walk(child, query, fold, limit, out);
    }
}

/// Continue an in-flight match; alignment is fixed, so consumption starts at
/// the beginning of each run.
fn continue_match(node: &Node, rest: &[u8], fold: bool, limit: usize, out: &mut BTreeSet<FileId>) {
    if rest.is_empty() {
        collect(node, limit, out);
        return;
    }
    if out.len() >= limit {
        return;
    }
    for (&(b, run), child) in &node.children {
        let eb = edge_byte(b, fold);
        let take = (run as usize).min(rest.len());
        if rest[..take].iter().all(|&c| c == eb) {
            if take == rest.len() {
                collect(child, limit, out);
            } else {
                continue_match(child, &rest[take..], fold, limit, out);
            }
        }
    }
}

fn collect(node: &Node, limit: usize, out: &mut BTreeSet<FileId>) {
    if out.len() >= limit {
        return;
    }
    if let Some(id) = node.terminal {
        out.insert(id);
    }
    for child in node.children.values() {
        collect(child, limit, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(paths: &[&str]) -> PathTrie {
        let mut t = PathTrie::new();
        for (i, p) in paths.iter().enumerate() {
            t.insert(p.as_bytes(), i as FileId);
        }
        t
    }

    #[test]
    fn containment_over_all_paths() {
        let t = trie(&["/ab", "/abc", "/abd"]);
        assert_eq!(t.find_containing(b"ab", false, 100), vec![0, 1, 2]);
        assert_eq!(t.find_containing(b"ac", false, 100), Vec::<FileId>::new());
        assert_eq!(t.find_containing(b"d", false, 100), vec![2]);
    }

    #[test]
    fn run_edges_match_inside_and_across() {
        let t = trie(&["/aab", "/ab", "/aaaa"]);
        // "aa" sits inside the runs of /aab and /aaaa only.
        assert_eq!(t.find_containing(b"aa", false, 100), vec![0, 2]);
        // "ab" crosses from a run suffix into the next edge.
        assert_eq!(t.find_containing(b"ab", false, 100), vec![0, 1]);
    }

    #[test]
    fn case_folded_lookup() {
        let t = trie(&["/AB", "/ab"]);
        assert_eq!(t.find_containing(b"ab", false, 100), vec![1]);
        assert_eq!(t.find_containing(b"ab", true, 100), vec![0, 1]);
        assert_eq!(t.find_containing(b"AB", true, 100), vec![0, 1]);
    }

    #[test]
    fn limit_caps_results() {
        let t = trie(&["/x1", "/x2", "/x3", "/x4"]);
        assert_eq!(t.find_containing(b"x", false, 2).len(), 2);
    }

    #[test]
    fn reinsert_overwrites_id() {
        let mut t = PathTrie::new();
        t.insert(b"/f", 1);
        t.insert(b"/f", 9);
        assert_eq!(t.find_containing(b"f", false, 10), vec![9]);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn single_byte_query_hits_run_paths() {
        let t = trie(&["/zz"]);
        assert_eq!(t.find_containing(b"z", false, 10), vec![0]);
        assert_eq!(t.find_containing(b"zz", false, 10), vec![0]);
    }
}
