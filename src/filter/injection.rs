//! Prompt-injection detection for note snippets.
//!
//! A snippet that tries to steer the host agent is replaced wholesale by a
//! sentinel string. Detection is two-stage: a pluggable scoring detector
//! (pattern plus statistical signals) and a fixed case-insensitive
//! substring list as the backstop.

use regex::Regex;
use std::sync::OnceLock;

/// Replacement emitted for any snippet flagged by the filters.
pub const FILTERED_SENTINEL: &str = "[content filtered for security]";

/// Score above which the detector flags a snippet.
const DETECTOR_THRESHOLD: f64 = 0.6;

/// Case-insensitive substrings that always trigger the sentinel.
const INJECTION_SUBSTRINGS: &[&str] = &[
    "ignore previous",
    "ignore all previous",
    "ignore above",
    "disregard previous",
    "disregard all previous",
    "you are now",
    "new instructions",
    "system prompt",
    "<system>",
    "</system>",
    "important:",
    "critical:",
    "override",
];

/// Pluggable injection scorer.
///
/// Implementations return a score in `[0, 1]`; at or above the threshold
/// the snippet is replaced. Scoring must never fail.
pub trait InjectionDetector: Send + Sync {
    /// Scores the likelihood that `text` is an injection attempt.
    fn score(&self, text: &str) -> f64;
}

/// Default detector combining weighted patterns with statistical signals.
pub struct PatternDetector {
    patterns: Vec<(Regex, f64)>,
}

#[allow(clippy::unwrap_used)]
fn imperative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(ignore|disregard|forget|override|bypass|reveal|pretend)\b").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn second_person_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\byou (are|must|will|should|have to)\b").unwrap()
    })
}

impl PatternDetector {
    /// Builds the default pattern set.
    #[must_use]
    pub fn new() -> Self {
        let sources: &[(&str, f64)] = &[
            (r"(?i)ignore\s+(all\s+)?(previous|prior|above)", 0.7),
            (r"(?i)disregard\s+(all\s+)?(previous|prior)", 0.7),
            (r"(?i)you\s+are\s+now\s+", 0.6),
            (r"(?i)new\s+instructions?\b", 0.5),
            (r"(?i)system\s+prompt", 0.5),
            (r"(?i)do\s+not\s+(tell|reveal|mention)", 0.4),
            (r"(?i)act\s+as\s+(if|a|an)\b", 0.3),
            (r"(?i)\bjailbreak\b", 0.7),
        ];
        let patterns = sources
            .iter()
            .filter_map(|(src, weight)| Regex::new(src).ok().map(|re| (re, *weight)))
            .collect();
        Self { patterns }
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl InjectionDetector for PatternDetector {
    fn score(&self, text: &str) -> f64 {
        let mut score: f64 = 0.0;
        for (re, weight) in &self.patterns {
            if re.is_match(text) {
                score += weight;
            }
        }

        // Statistical signals: directive density over short spans reads as
        // instructions aimed at the agent rather than note prose.
        let words = text.split_whitespace().count().max(1);
        let imperatives = imperative_re().find_iter(text).count();
        #[allow(clippy::cast_precision_loss)]
        let imperative_density = imperatives as f64 / words as f64;
        if imperative_density > 0.05 {
            score += 0.2;
        }
        if second_person_re().is_match(text) {
            score += 0.15;
        }

        score.min(1.0)
    }
}

/// Sanitizes a snippet before emission.
///
/// Returns [`FILTERED_SENTINEL`] when the detector flags the text or any
/// fixed substring matches; otherwise returns the input unchanged.
#[must_use]
pub fn sanitize_snippet(text: &str, detector: &dyn InjectionDetector) -> String {
    if detector.score(text) >= DETECTOR_THRESHOLD {
        return FILTERED_SENTINEL.to_string();
    }
    let lower = text.to_lowercase();
    for needle in INJECTION_SUBSTRINGS {
        if lower.contains(needle) {
            return FILTERED_SENTINEL.to_string();
        }
    }
    text.to_string()
}
