//! Composite scoring for ranked candidates.
//!
//! A candidate's composite score is a weighted sum of three signals:
//! normalized semantic similarity, recency of modification, and a
//! confidence term boosted for priority content types.

mod overlap;

pub use overlap::{overlap_for_sort, title_overlap, words_from_title_and_path};
pub(crate) use overlap::within_edit_distance_1;

/// Content types that outrank plain notes at equal composite score.
pub const PRIORITY_CONTENT_TYPES: &[&str] = &["handoff", "decision", "research", "hub"];

/// Weight triple for the composite score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    /// Weight of the normalized semantic score.
    pub relevance: f64,
    /// Weight of the recency score.
    pub recency: f64,
    /// Weight of the type-boosted confidence score.
    pub confidence: f64,
}

/// Standard search weights.
pub const STANDARD_WEIGHTS: ScoreWeights = ScoreWeights {
    relevance: 0.3,
    recency: 0.3,
    confidence: 0.4,
};

/// Recency-variant weights; recency dominates.
pub const RECENCY_WEIGHTS: ScoreWeights = ScoreWeights {
    relevance: 0.1,
    recency: 0.7,
    confidence: 0.2,
};

/// Half-life of the recency decay, in seconds (7 days).
const RECENCY_HALF_LIFE_SECS: f64 = 7.0 * 86_400.0;

/// Returns true for content types that get priority treatment.
#[must_use]
pub fn is_priority_type(content_type: &str) -> bool {
    PRIORITY_CONTENT_TYPES.contains(&content_type)
}

/// Recency score in `[0, 1]`, monotonically decreasing with age.
///
/// Exponential decay with a 7-day half-life; future timestamps clamp to 1.
#[must_use]
pub fn recency_score(modified_unix: i64, now_unix: i64) -> f64 {
    let age = (now_unix - modified_unix).max(0);
    #[allow(clippy::cast_precision_loss)]
    let age_secs = age as f64;
    0.5_f64.powf(age_secs / RECENCY_HALF_LIFE_SECS)
}

/// Confidence term, boosted for priority content types. Always in `[0, 1]`.
#[must_use]
pub fn type_boost(content_type: &str, confidence: f64) -> f64 {
    let conf = confidence.clamp(0.0, 1.0);
    if is_priority_type(content_type) {
        (conf * 0.6 + 0.4).min(1.0)
    } else {
        conf * 0.6
    }
}

/// Weighted composite of semantic, recency, and confidence signals.
#[must_use]
pub fn composite_score(
    semantic: f64,
    modified_unix: i64,
    confidence: f64,
    content_type: &str,
    weights: ScoreWeights,
    now_unix: i64,
) -> f64 {
    weights.relevance * semantic.clamp(0.0, 1.0)
        + weights.recency * recency_score(modified_unix, now_unix)
        + weights.confidence * type_boost(content_type, confidence)
}

/// Normalizes a raw L2 distance against the batch range.
///
/// `1 - (d - d_min) / max(d_max - d_min, 1)`. The denominator floor keeps
/// a single-hit batch from normalizing to a perfect score.
#[must_use]
pub fn normalize_semantic(distance: f64, d_min: f64, d_max: f64) -> f64 {
    1.0 - (distance - d_min) / (d_max - d_min).max(1.0)
}

/// Jaccard similarity of two lowercased term sets.
///
/// Both empty yields 1.0; exactly one empty yields 0.0.
#[must_use]
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    use std::collections::HashSet;
    let sa: HashSet<&str> = a.iter().map(String::as_str).collect();
    let sb: HashSet<&str> = b.iter().map(String::as_str).collect();
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    #[allow(clippy::cast_precision_loss)]
    let score = intersection as f64 / union as f64;
    score
}
