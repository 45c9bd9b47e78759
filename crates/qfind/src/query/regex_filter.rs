//! Derives the trigrams every match of a regex must contain, by collecting
//! the pattern's mandatory literal runs from its parsed HIR. Alternations,
//! classes and repetitions end a run; what survives is a conservative
//! conjunction usable as an index prefilter.

use regex_syntax::hir::{Hir, HirKind};

use crate::trigram::{fold_ascii, trigrams};
use crate::types::Trigram;

/// ASCII-folded trigrams that are mandatory for any match of `pattern`, or
/// `None` when the pattern yields no literal run of at least three bytes.
pub(crate) fn required_trigrams(pattern: &str) -> Option<Vec<Trigram>> {
    let hir = regex_syntax::parse(pattern).ok()?;
    let mut runs: Vec<Vec<u8>> = Vec::new();
    let mut cur: Vec<u8> = Vec::new();
    literal_runs(&hir, &mut runs, &mut cur);
    flush(&mut runs, &mut cur);

    let mut out: Vec<Trigram> = Vec::new();
    for run in &runs {
        out.extend(trigrams(&fold_ascii(run)));
    }
    out.sort_unstable();
    out.dedup();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn literal_runs(hir: &Hir, runs: &mut Vec<Vec<u8>>, cur: &mut Vec<u8>) {
    match hir.kind() {
        HirKind::Literal(lit) => cur.extend_from_slice(&lit.0),
        HirKind::Concat(parts) => {
            for part in parts {
                literal_runs(part, runs, cur);
            }
        }
        HirKind::Capture(cap) => literal_runs(&cap.sub, runs, cur),
        _ => flush(runs, cur),
    }
}

fn flush(runs: &mut Vec<Vec<u8>>, cur: &mut Vec<u8>) {
    if cur.len() >= 3 {
        runs.push(std::mem::take(cur));
    } else {
        cur.clear();
    }
}
