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

//! Query resolution: trigram decomposition, Bloom fail-fast, progressive
//! posting-list intersection (cheapest list first), candidate confirmation,
//! permission filtering, relevance scoring and top-K selection. Workers
//! partition the candidate set, fill capped local buffers and merge under a
//! single mutex; they never mutate the index.

use std::os::unix::ffi::OsStrExt;

use parking_lot::Mutex;
use tracing::error;

use crate::error::{Error, Result};
use crate::index::{Index, IndexInner};
use crate::trigram::{fold_ascii, trigrams};
use crate::types::{may_read, FileId, QueryCtx, Trigram};

use super::regex_filter;

enum Confirm {
    /// Byte needle searched in the (possibly folded) path.
    Literal(Vec<u8>),
    /// Compiled pattern matched against the raw path bytes.
    Regex(regex::bytes::Regex),
}

pub(crate) fn resolve(index: &Index, inner: &IndexInner, q: &QueryCtx) -> Result<Vec<FileId>> {
    if q.regex_enabled {
        return resolve_regex(index, inner, q);
    }

    let raw = q.query.as_bytes();
    let folded = fold_ascii(raw);

    // Below the trigram floor the trie answers containment directly.
    if raw.len() < 3 {
        let probe = q.max_results.saturating_mul(4).max(1024);
        let ids = inner.trie.find_containing(raw, !q.case_sensitive, probe);
        return Ok(ids
            .into_iter()
            .filter(|&id| visible(inner, id, q))
            .take(q.max_results)
            .collect());
    }

    let mut lookup: Vec<Trigram> = trigrams(&folded).collect();
    lookup.sort_unstable();
    lookup.dedup();

    let cand = match prefiltered_candidates(index, inner, &lookup)? {
        Some(c) => c,
        None => return Ok(Vec::new()),
    };

    let (confirm, fold_hay) = if q.case_sensitive {
        (Confirm::Literal(raw.to_vec()), false)
    } else {
        (Confirm::Literal(folded.clone()), true)
    };
    let score_tris: Vec<[u8; 3]> = if q.case_sensitive {
        trigrams(raw).map(Trigram::bytes).collect()
    } else {
        trigrams(&folded).map(Trigram::bytes).collect()
    };
    let threshold = index.config().score_threshold;
    score_and_rank(
        index, inner, q, cand, &confirm, fold_hay, &score_tris, raw.len(), threshold,
    )
}

fn resolve_regex(index: &Index, inner: &IndexInner, q: &QueryCtx) -> Result<Vec<FileId>> {
    let pattern = if q.case_sensitive {
        q.query.clone()
    } else {
        format!("(?i){}", q.query)
    };
    let re = regex::bytes::Regex::new(&pattern)
        .map_err(|e| Error::InvalidArgument(format!("invalid regex: {}", e)))?;

    let lookup = regex_filter::required_trigrams(&q.query);
    let cand = match &lookup {
        Some(tris) => match prefiltered_candidates(index, inner, tris)? {
            Some(c) => c,
            None => return Ok(Vec::new()),
        },
        // No usable literal in the pattern: fall back to scanning the
        // metadata table and let the regex itself do the work.
        None => all_live_ids(inner),
    };

    let score_tris: Vec<[u8; 3]> = lookup
        .unwrap_or_default()
        .into_iter()
        .map(Trigram::bytes)
        .collect();
    // The compiled pattern itself confirms every candidate, so the score
    // only ranks; the literal-query threshold does not apply.
    score_and_rank(
        index,
        inner,
        q,
        cand,
        &Confirm::Regex(re),
        true,
        &score_tris,
        q.query.len(),
        f64::NEG_INFINITY,
    )
}

/// Bloom check then progressive intersection over decoded posting lists,
/// cheapest first. `None` means a definitive empty answer. A list that
/// fails to decode is skipped with reduced recall.
fn prefiltered_candidates(
    index: &Index,
    inner: &IndexInner,
    lookup: &[Trigram],
) -> Result<Option<Vec<FileId>>> {
    for &t in lookup {
        if !index.bloom().check(t) {
            return Ok(None);
        }
    }

    let mut entries: Vec<(Trigram, u32)> = Vec::with_capacity(lookup.len());
    for &t in lookup {
        match inner.sealed.entry(t) {
            Some(e) => entries.push((t, e.file_count)),
            // The Bloom filter answered "maybe" for a trigram the directory
            // has never seen: a false positive, so nothing can match.
            None => return Ok(None),
        }
    }
    entries.sort_unstable_by_key(|&(_, n)| n);

    let mut cand: Option<Vec<FileId>> = None;
    for (t, _) in entries {
        index.count_decode();
        let list = match inner.sealed.decode(t) {
            Ok(l) => l,
            Err(err) => {
                error!(trigram = t.0, error = %err, "posting list unreadable, skipping trigram");
                continue;
            }
        };
        cand = Some(match cand {
            None => list,
            Some(prev) => intersect_sorted(&prev, &list),
        });
        if cand.as_ref().map(|c| c.is_empty()).unwrap_or(false) {
            return Ok(None);
        }
    }
    Ok(cand)
}

#[allow(clippy::too_many_arguments)]
fn score_and_rank(
    index: &Index,
    inner: &IndexInner,
    q: &QueryCtx,
    cand: Vec<FileId>,
    confirm: &Confirm,
    fold_hay: bool,
    score_tris: &[[u8; 3]],
    qlen: usize,
    threshold: f64,
) -> Result<Vec<FileId>> {
    if cand.is_empty() {
        return Ok(Vec::new());
    }
    let cfg = index.config();
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(cfg.worker_threads)
        .max(1);
    let chunk = cand.len().div_ceil(workers);
    let n_files = inner.metas.len() as f64;
    let merged: Mutex<Vec<(f64, FileId)>> = Mutex::new(Vec::new());

    std::thread::scope(|s| {
        for ids in cand.chunks(chunk) {
            let merged = &merged;
            s.spawn(move || {
                let mut local: Vec<(f64, FileId)> = Vec::new();
                for &id in ids {
                    if local.len() >= cfg.results_per_thread {
                        break;
                    }
                    let meta = match inner.metas.get(id as usize) {
                        Some(m) => m,
                        None => continue,
                    };
                    if meta.is_tombstoned() || !may_read(meta, q.uid, q.gid) {
                        continue;
                    }
                    let raw = meta.path.as_os_str().as_bytes();
                    let folded_buf;
                    let hay = if fold_hay {
                        folded_buf = fold_ascii(raw);
                        &folded_buf[..]
                    } else {
                        raw
                    };
                    let confirmed = match confirm {
                        Confirm::Literal(needle) => contains(hay, needle),
                        Confirm::Regex(re) => re.is_match(raw),
                    };
                    if !confirmed {
                        continue;
                    }
                    let score = score_path(hay, score_tris, qlen, n_files);
                    if score < threshold {
                        continue;
                    }
                    local.push((score, id));
                }
                merged.lock().extend(local);
            });
        }
    });

    let mut all = merged.into_inner();
    all.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    all.truncate(q.max_results);
    Ok(all.into_iter().map(|(_, id)| id).collect())
}

/// TF-IDF-ish relevance: per query trigram, occurrences in the path over
/// the query's trigram count, weighted by corpus rarity, normalized by
/// query length. Confirmation-only paths (no trigrams) score a constant.
fn score_path(hay: &[u8], tris: &[[u8; 3]], qlen: usize, n_files: f64) -> f64 {
    if tris.is_empty() {
        return 1.0;
    }
    let tf_den = qlen.saturating_sub(2).max(1) as f64;
    let mut sum = 0.0;
    for t in tris {
        let occ = count_occurrences(hay, t) as f64;
        if occ == 0.0 {
            continue;
        }
        let tf = occ / tf_den;
        let idf = (n_files / (occ + 1.0)).log2();
        sum += tf * idf;
    }
    sum / (qlen as f64).sqrt()
}

fn count_occurrences(hay: &[u8], t: &[u8; 3]) -> usize {
    hay.windows(3).filter(|w| *w == &t[..]).count()
}

fn contains(hay: &[u8], needle: &[u8]) -> bool {
    hay.windows(needle.len()).any(|w| w == needle)
}

fn visible(inner: &IndexInner, id: FileId, q: &QueryCtx) -> bool {
    inner
        .metas
        .get(id as usize)
        .map(|m| !m.is_tombstoned() && may_read(m, q.uid, q.gid))
        .unwrap_or(false)
}

fn all_live_ids(inner: &IndexInner) -> Vec<FileId> {
    inner
        .metas
        .iter()
        .filter(|m| !m.is_tombstoned())
        .map(|m| m.id)
        .collect()
}

fn intersect_sorted(left: &[FileId], right: &[FileId]) -> Vec<FileId> {
    let mut out = Vec::new();
    let mut i = 0usize;
    let mut j = 0usize;
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_basics() {
        assert_eq!(intersect_sorted(&[1, 3, 5], &[2, 3, 5, 9]), vec![3, 5]);
        assert_eq!(intersect_sorted(&[], &[1]), Vec::<FileId>::new());
        assert_eq!(intersect_sorted(&[7], &[7]), vec![7]);
    }

    #[test]
    fn occurrence_counting() {
        assert_eq!(count_occurrences(b"aaaa", b"aaa"), 2);
        assert_eq!(count_occurrences(b"/a/notes", b"not"), 1);
        assert_eq!(count_occurrences(b"ab", b"abc"), 0);
    }

    #[test]
    fn containment() {
        assert!(contains(b"/a/notes.txt", b"notes"));
        assert!(!contains(b"/a/notes.txt", b"nodes"));
        assert!(!contains(b"ab", b"abc"));
    }

    #[test]
    fn exact_match_clears_default_threshold() {
        // Three files, five-byte query occurring once per path.
        let score = score_path(b"/a/notes.txt", &[*b"not", *b"ote", *b"tes"], 5, 3.0);
        assert!(score >= 0.25, "score {} below threshold", score);
    }

    #[test]
    fn unrelated_path_scores_zero() {
        let score = score_path(b"/c/other.log", &[*b"not", *b"ote", *b"tes"], 5, 3.0);
        assert!(score < 0.25);
    }
}
