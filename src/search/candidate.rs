//! Scored candidates, near-deduplication, and the three-tier sort.

use crate::score::is_priority_type;
use serde::Serialize;

/// One ranked candidate flowing through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    /// Vault-relative path.
    pub path: String,
    /// Note title.
    pub title: String,
    /// Content type.
    pub content_type: String,
    /// Indexer confidence.
    pub confidence: f64,
    /// Query-biased snippet (sanitized before emission).
    pub snippet: String,
    /// Weighted composite score.
    pub composite: f64,
    /// Normalized semantic score (synthetic 0.85 for keyword modes).
    pub semantic: f64,
    /// Raw L2 distance, or 0 for non-vector modes.
    pub distance: f64,
    /// Overlap used by the sort tiers. Zero iff no query term matched
    /// title or path.
    pub title_overlap: f64,
    /// True when `title_overlap` was synthetically raised by a
    /// content-verified rescue.
    pub content_boosted: bool,
    /// Estimated token cost of the formatted entry.
    pub tokens: usize,
    /// Query terms that matched, for the UI echo.
    pub match_terms: Vec<String>,
}

/// Query terms found (case-insensitively) in the title or path.
#[must_use]
pub fn matched_terms(terms: &[String], title: &str, path: &str) -> Vec<String> {
    let haystack = format!("{} {}", title.to_lowercase(), path.to_lowercase());
    terms
        .iter()
        .filter(|t| haystack.contains(&t.to_lowercase()))
        .cloned()
        .collect()
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn basename_sans_md(path: &str) -> String {
    let base = path.rsplit_once('/').map_or(path, |(_, file)| file);
    base.strip_suffix(".md").unwrap_or(base).to_lowercase()
}

/// Drops near-duplicate siblings.
///
/// Two candidates in the same parent directory where one basename is a
/// lowercase prefix of the other (`notes-v2` / `notes-v2-draft`) are one
/// note and its derivative; the one with the higher overlap survives,
/// composite breaking ties.
#[must_use]
pub fn near_dedup(candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut keep = vec![true; candidates.len()];
    for i in 0..candidates.len() {
        if !keep[i] {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if !keep[j] {
                continue;
            }
            let (a, b) = (&candidates[i], &candidates[j]);
            if parent_dir(&a.path) != parent_dir(&b.path) {
                continue;
            }
            let (base_a, base_b) = (basename_sans_md(&a.path), basename_sans_md(&b.path));
            if base_a == base_b || (!base_a.starts_with(&base_b) && !base_b.starts_with(&base_a)) {
                continue;
            }
            let a_wins = match a
                .title_overlap
                .partial_cmp(&b.title_overlap)
                .unwrap_or(std::cmp::Ordering::Equal)
            {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => a.composite >= b.composite,
            };
            if a_wins {
                keep[j] = false;
            } else {
                keep[i] = false;
                break;
            }
        }
    }
    candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect()
}

fn cmp_f64_desc(a: f64, b: f64) -> std::cmp::Ordering {
    b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
}

/// Three-tier sort.
///
/// Tier 1: overlap >= `high_tier_overlap`, ordered by overlap descending.
/// Tier 2: positive overlap. Tier 3: zero overlap. Within tiers 2 and 3,
/// priority content types come first, then composite descending.
pub fn three_tier_sort(candidates: &mut [ScoredCandidate], high_tier_overlap: f64) {
    candidates.sort_by(|a, b| {
        let tier = |c: &ScoredCandidate| -> u8 {
            if c.title_overlap >= high_tier_overlap {
                0
            } else if c.title_overlap > 0.0 {
                1
            } else {
                2
            }
        };
        let (ta, tb) = (tier(a), tier(b));
        if ta != tb {
            return ta.cmp(&tb);
        }
        if ta == 0 {
            return cmp_f64_desc(a.title_overlap, b.title_overlap)
                .then_with(|| cmp_f64_desc(a.composite, b.composite));
        }
        let (pa, pb) = (is_priority_type(&a.content_type), is_priority_type(&b.content_type));
        pb.cmp(&pa).then_with(|| cmp_f64_desc(a.composite, b.composite))
    });
}
