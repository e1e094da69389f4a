//! Recency hybrid planner.
//!
//! Runs instead of the standard planner when the prompt carries recency
//! intent. Merges three sources into a path-keyed map: vector hits with a
//! relaxed distance gate, recently modified notes, and title-keyword hits.
//! The first source to add a path owns its scores; later sources may only
//! upgrade `title_overlap`, never composite.

use crate::config::Config;
use crate::filter::should_skip_path;
use crate::query::QueryAnalysis;
use crate::score::{RECENCY_WEIGHTS, composite_score, normalize_semantic, overlap_for_sort};
use crate::search::candidate::{ScoredCandidate, matched_terms};
use crate::search::planner::SearchOptions;
use crate::search::snippet::query_biased_snippet;
use crate::store::{Note, NoteStore};

/// Extra slack on the distance gate; recency search tolerates weaker
/// semantic matches because recency carries the score.
const RELAXED_DISTANCE_SLACK: f64 = 2.0;

/// Absolute composite gate for the recency planner.
const RECENCY_MIN_COMPOSITE: f64 = 0.45;

/// How many recently modified notes to pull.
const RECENT_FETCH: usize = 10;

/// Overlap above which a candidate enters the first recency sort tier.
const RECENCY_TIER_OVERLAP: f64 = 0.05;

/// Content types admitted from the recent-notes source.
const RECENT_ADMITTED_TYPES: &[&str] = &["handoff", "hub", "progress", "decision"];

/// Per-invocation recency planner.
pub struct RecencyPlanner<'a> {
    store: &'a dyn NoteStore,
    analysis: &'a QueryAnalysis,
    opts: &'a SearchOptions,
    now: i64,
    candidates: Vec<ScoredCandidate>,
}

impl<'a> RecencyPlanner<'a> {
    /// Creates a planner for one invocation.
    #[must_use]
    pub fn new(
        store: &'a dyn NoteStore,
        analysis: &'a QueryAnalysis,
        opts: &'a SearchOptions,
        now: i64,
    ) -> Self {
        Self {
            store,
            analysis,
            opts,
            now,
            candidates: Vec::new(),
        }
    }

    /// Effective result cap for recency surfacing.
    #[must_use]
    pub fn effective_max(config: &Config) -> usize {
        config.memory.max_results.min(3)
    }

    fn make_candidate(&self, note: &Note, semantic: f64, distance: f64) -> ScoredCandidate {
        let overlap = overlap_for_sort(&self.analysis.title_terms, &note.title, &note.path);
        ScoredCandidate {
            path: note.path.clone(),
            title: note.title.clone(),
            content_type: note.content_type.clone(),
            confidence: note.confidence,
            snippet: query_biased_snippet(
                &note.text,
                self.opts.snippet_max_len,
                &self.analysis.title_terms,
            ),
            composite: composite_score(
                semantic,
                note.modified,
                note.confidence,
                &note.content_type,
                RECENCY_WEIGHTS,
                self.now,
            ),
            semantic,
            distance,
            title_overlap: overlap,
            content_boosted: false,
            tokens: 0,
            match_terms: matched_terms(&self.analysis.title_terms, &note.title, &note.path),
        }
    }

    /// Upgrades only the overlap of an existing entry; the owning source's
    /// composite stands.
    fn add_or_upgrade(&mut self, candidate: ScoredCandidate) {
        if let Some(existing) = self.candidates.iter_mut().find(|c| c.path == candidate.path) {
            if candidate.title_overlap > existing.title_overlap {
                existing.title_overlap = candidate.title_overlap;
            }
            return;
        }
        self.candidates.push(candidate);
    }

    /// Runs the three sources and returns the sorted pool.
    pub fn plan(mut self, query_vector: Option<&[f32]>) -> crate::Result<Vec<ScoredCandidate>> {
        // Source a: vector hits under the relaxed gate.
        if let Some(vector) = query_vector {
            let hits = self
                .store
                .vector_search_raw(vector, self.opts.max_results * 4)?;
            let relaxed = self.opts.max_distance + RELAXED_DISTANCE_SLACK;
            if let (Some(first), Some(last)) = (hits.first(), hits.last()) {
                let (d_min, d_max) = (first.distance, last.distance);
                for hit in &hits {
                    if hit.distance > relaxed {
                        continue;
                    }
                    if should_skip_path(&hit.note.path, &self.opts.noise_prefixes) {
                        continue;
                    }
                    let semantic = normalize_semantic(hit.distance, d_min, d_max).max(0.0);
                    let candidate = self.make_candidate(&hit.note, semantic, hit.distance);
                    if candidate.composite >= RECENCY_MIN_COMPOSITE {
                        self.add_or_upgrade(candidate);
                    }
                }
            }
        }

        // Source b: recently modified notes, priority types only.
        for note in self.store.recent_notes(RECENT_FETCH)? {
            if !RECENT_ADMITTED_TYPES.contains(&note.content_type.as_str()) {
                continue;
            }
            if should_skip_path(&note.path, &self.opts.noise_prefixes) {
                continue;
            }
            let candidate = self.make_candidate(&note, 0.0, 0.0);
            if candidate.composite >= RECENCY_MIN_COMPOSITE {
                self.add_or_upgrade(candidate);
            }
        }

        // Source c: title-keyword hits.
        if !self.analysis.title_terms.is_empty() {
            let hits = self.store.keyword_search_title_match(
                &self.analysis.title_terms,
                2,
                self.opts.max_results * 2,
                false,
            )?;
            for note in hits {
                if should_skip_path(&note.path, &self.opts.noise_prefixes) {
                    continue;
                }
                let candidate = self.make_candidate(&note, 0.0, 0.0);
                if candidate.composite >= RECENCY_MIN_COMPOSITE {
                    self.add_or_upgrade(candidate);
                }
            }
        }

        // Overlap tier first, then composite.
        self.candidates.sort_by(|a, b| {
            let tier_a = u8::from(a.title_overlap < RECENCY_TIER_OVERLAP);
            let tier_b = u8::from(b.title_overlap < RECENCY_TIER_OVERLAP);
            tier_a.cmp(&tier_b).then_with(|| {
                b.composite
                    .partial_cmp(&a.composite)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        Ok(self.candidates)
    }
}
