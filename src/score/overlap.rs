//! Title-overlap scoring.
//!
//! Bidirectional coverage of query terms against the words of a note's
//! title and path. Each word in the note set may satisfy at most one query
//! term, which keeps `chunk chunk chunk` from triple-counting a single
//! title word.

/// Builds the word set from a title and optionally its path components.
///
/// Path handling: strip a trailing `.md`, split on `/`, then split each
/// component on `_` and `-`. All words lowercased, deduped, order kept.
#[must_use]
pub fn words_from_title_and_path(title: &str, path: Option<&str>) -> Vec<String> {
    let mut words = Vec::new();
    let mut push = |raw: &str| {
        for piece in raw.split(|c: char| !c.is_alphanumeric()) {
            let word = piece.to_lowercase();
            if !word.is_empty() && !words.contains(&word) {
                words.push(word);
            }
        }
    };
    push(title);
    if let Some(path) = path {
        let trimmed = path.strip_suffix(".md").unwrap_or(path);
        for component in trimmed.split('/') {
            push(component);
        }
    }
    words
}

/// True when `a` and `b` differ by at most one edit (insert, delete,
/// substitute). The overlap cascade applies it only to words of length
/// >= 7; the store's fuzzy title search reuses it directly.
pub(crate) fn within_edit_distance_1(a: &str, b: &str) -> bool {
    let (a, b): (Vec<char>, Vec<char>) = (a.chars().collect(), b.chars().collect());
    let (la, lb) = (a.len(), b.len());
    if la.abs_diff(lb) > 1 {
        return false;
    }
    if la == lb {
        return a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() <= 1;
    }
    // One insertion: walk the longer sequence allowing a single skip.
    let (short, long) = if la < lb { (&a, &b) } else { (&b, &a) };
    let (mut i, mut j, mut skipped) = (0, 0, false);
    while i < short.len() && j < long.len() {
        if short[i] == long[j] {
            i += 1;
            j += 1;
        } else if skipped {
            return false;
        } else {
            skipped = true;
            j += 1;
        }
    }
    true
}

/// True when two words share a stem: both length >= 5, common prefix at
/// least `min(len) - 1` and at least 5, length difference <= 3.
fn shares_stem(a: &str, b: &str) -> bool {
    if a.len() < 5 || b.len() < 5 || a.len().abs_diff(b.len()) > 3 {
        return false;
    }
    let shorter = a.len().min(b.len());
    let common = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    common >= shorter.saturating_sub(1) && common >= 5
}

/// Match cascade for one query term against one candidate word.
fn term_matches_word(term: &str, word: &str) -> bool {
    if term == word {
        return true;
    }
    // Plural: x <-> xs
    if term.strip_suffix('s') == Some(word) || word.strip_suffix('s') == Some(term) {
        return true;
    }
    if term.len() >= 7 && word.len() >= 7 && within_edit_distance_1(term, word) {
        return true;
    }
    shares_stem(term, word)
}

/// Bidirectional title-overlap score in `[0, 1]`.
///
/// `q` is the fraction of (hyphen-expanded) query terms matched, `w` the
/// fraction of note words consumed; the score is `q * w`. Notes whose word
/// set has at most two words need `q >= 0.30` or they score 0: a one-word
/// title matching one term of a long query is noise, not signal.
#[must_use]
pub fn title_overlap(query_terms: &[String], title: &str, path: Option<&str>) -> f64 {
    let words = words_from_title_and_path(title, path);
    if words.is_empty() || query_terms.is_empty() {
        return 0.0;
    }

    // Expand hyphenated query terms into their parts.
    let mut expanded: Vec<String> = Vec::new();
    for term in query_terms {
        let lower = term.to_lowercase();
        if lower.contains('-') {
            for part in lower.split('-').filter(|p| !p.is_empty()) {
                if !expanded.contains(&part.to_string()) {
                    expanded.push(part.to_string());
                }
            }
        } else if !expanded.contains(&lower) {
            expanded.push(lower);
        }
    }
    if expanded.is_empty() {
        return 0.0;
    }

    let mut consumed = vec![false; words.len()];
    let mut matched = 0usize;
    for term in &expanded {
        for (i, word) in words.iter().enumerate() {
            if !consumed[i] && term_matches_word(term, word) {
                consumed[i] = true;
                matched += 1;
                break;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let q = matched as f64 / expanded.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let w = matched as f64 / words.len() as f64;

    if words.len() <= 2 && q < 0.30 {
        return 0.0;
    }
    q * w
}

/// Overlap used by the sort tiers.
///
/// Title-only overlap wins when positive. Otherwise a path-inclusive
/// overlap of at least 0.25 contributes at half weight, letting well-named
/// directories carry weight without dominating direct title hits.
#[must_use]
pub fn overlap_for_sort(query_terms: &[String], title: &str, path: &str) -> f64 {
    let title_only = title_overlap(query_terms, title, None);
    if title_only > 0.0 {
        return title_only;
    }
    let full = title_overlap(query_terms, title, Some(path));
    if full >= 0.25 { full / 2.0 } else { 0.0 }
}
