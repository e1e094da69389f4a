//! Standard multi-mode search planner.
//!
//! Modes run in a fixed order, each contributing to a path-keyed candidate
//! pool. Later modes see what earlier modes found and only fire when the
//! pool still needs help. Mode ordering lives here, not in the modes.

use crate::config::Config;
use crate::filter::should_skip_path;
use crate::query::QueryAnalysis;
use crate::score::{
    STANDARD_WEIGHTS, composite_score, normalize_semantic, overlap_for_sort, title_overlap,
};
use crate::search::candidate::{ScoredCandidate, matched_terms, near_dedup, three_tier_sort};
use crate::search::snippet::query_biased_snippet;
use crate::store::{Note, NoteStore};

/// Vector over-fetch multiplier; later gates thin the raw hits heavily.
const VECTOR_FETCH_MULTIPLIER: usize = 8;

/// Synthetic semantic score for keyword-sourced candidates.
const KEYWORD_SEMANTIC: f64 = 0.85;

/// Floor on the normalized semantic score in the standard planner.
const MIN_SEMANTIC_FLOOR: f64 = 0.25;

/// Overlap at which a candidate enters the top sort tier.
const HIGH_TIER_OVERLAP: f64 = 0.20;

/// Minimum title-only overlap a hub needs in the hub-rescue mode.
const HUB_RESCUE_OVERLAP: f64 = 0.50;

/// Overlap gates for the fuzzy mode.
const FUZZY_HUB_OVERLAP: f64 = 0.20;
const FUZZY_OVERLAP: f64 = 0.40;

/// Overlap promotions for content-verified rescues.
const CONTENT_PROMOTE_OVERLAP: f64 = 0.15;
const CONTENT_BOOST_OVERLAP: f64 = 0.25;

/// Tuning knobs shared by both planners.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum notes surfaced per injection.
    pub max_results: usize,
    /// Vector mode is empty when the best hit is farther than this.
    pub max_distance: f64,
    /// Composite gate for vector-sourced candidates.
    pub min_composite: f64,
    /// Title/path overlap gate for keyword-sourced candidates.
    pub min_title_overlap: f64,
    /// Token budget for the packed context block.
    pub max_token_budget: usize,
    /// Byte budget per snippet.
    pub snippet_max_len: usize,
    /// Noise prefixes from configuration.
    pub noise_prefixes: Vec<String>,
}

impl SearchOptions {
    /// Builds options from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_results: config.memory.max_results,
            max_distance: config.memory.distance_threshold,
            min_composite: config.memory.composite_threshold,
            min_title_overlap: 0.10,
            max_token_budget: config.memory.max_token_budget,
            snippet_max_len: 400,
            noise_prefixes: config.noise.paths.clone(),
        }
    }
}

/// Per-invocation standard planner.
///
/// Owns the candidate pool and the dedup set for one query; construct a
/// fresh one per hook invocation.
pub struct StandardPlanner<'a> {
    store: &'a dyn NoteStore,
    analysis: &'a QueryAnalysis,
    opts: &'a SearchOptions,
    now: i64,
    seen: Vec<String>,
    candidates: Vec<ScoredCandidate>,
    vector_empty: bool,
    content_boost_used: bool,
}

impl<'a> StandardPlanner<'a> {
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
            seen: Vec::new(),
            candidates: Vec::new(),
            vector_empty: false,
            content_boost_used: false,
        }
    }

    /// Runs all modes in order and returns the deduped, sorted pool.
    ///
    /// `query_vector` is `None` when the embedding provider failed; the
    /// keyword modes still run.
    pub fn plan(mut self, query_vector: Option<&[f32]>) -> crate::Result<Vec<ScoredCandidate>> {
        self.mode_vector(query_vector)?;
        self.mode_title_keyword()?;
        self.mode_hub_rescue()?;
        self.mode_content_fulltext()?;
        self.mode_broad_fallback()?;
        self.mode_fuzzy_title()?;
        self.mode_broad_content()?;

        let mut pool = near_dedup(std::mem::take(&mut self.candidates));
        three_tier_sort(&mut pool, HIGH_TIER_OVERLAP);
        Ok(pool)
    }

    fn has_strong_candidate(&self) -> bool {
        self.candidates
            .iter()
            .any(|c| c.title_overlap >= HIGH_TIER_OVERLAP)
    }

    fn has_positive_candidate(&self) -> bool {
        self.candidates.iter().any(|c| c.title_overlap > 0.0)
    }

    fn room_left(&self) -> bool {
        self.candidates.len() < self.opts.max_results
    }

    fn mark_seen(&mut self, path: &str) -> bool {
        if self.seen.iter().any(|p| p == path) {
            return false;
        }
        self.seen.push(path.to_string());
        true
    }

    fn make_candidate(
        &self,
        note: &Note,
        semantic: f64,
        distance: f64,
        overlap: f64,
        content_boosted: bool,
    ) -> ScoredCandidate {
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
                STANDARD_WEIGHTS,
                self.now,
            ),
            semantic,
            distance,
            title_overlap: overlap,
            content_boosted,
            tokens: 0,
            match_terms: matched_terms(&self.analysis.title_terms, &note.title, &note.path),
        }
    }

    /// Mode 0: dense vector.
    fn mode_vector(&mut self, query_vector: Option<&[f32]>) -> crate::Result<()> {
        let Some(vector) = query_vector else {
            self.vector_empty = true;
            return Ok(());
        };
        let hits = self
            .store
            .vector_search_raw(vector, self.opts.max_results * VECTOR_FETCH_MULTIPLIER)?;

        let best = hits.first().map_or(f64::INFINITY, |h| h.distance);
        if hits.is_empty() || best > self.opts.max_distance {
            self.vector_empty = true;
            return Ok(());
        }

        let d_min = best;
        let d_max = hits.last().map_or(d_min, |h| h.distance);

        for hit in &hits {
            if hit.distance > self.opts.max_distance {
                continue;
            }
            if should_skip_path(&hit.note.path, &self.opts.noise_prefixes) {
                continue;
            }
            if !self.mark_seen(&hit.note.path) {
                continue;
            }
            let semantic = normalize_semantic(hit.distance, d_min, d_max);
            if semantic < MIN_SEMANTIC_FLOOR {
                continue;
            }
            let candidate = self.make_candidate(
                &hit.note,
                semantic,
                hit.distance,
                overlap_for_sort(&self.analysis.title_terms, &hit.note.title, &hit.note.path),
                false,
            );
            if candidate.composite < self.opts.min_composite {
                continue;
            }
            self.candidates.push(candidate);
        }
        Ok(())
    }

    /// Mode 2: title+path keyword. Always runs.
    fn mode_title_keyword(&mut self) -> crate::Result<()> {
        if self.analysis.title_terms.is_empty() {
            return Ok(());
        }
        let results = self.store.keyword_search_title_match(
            &self.analysis.title_terms,
            1,
            self.opts.max_results * 4,
            false,
        )?;
        for note in results {
            if should_skip_path(&note.path, &self.opts.noise_prefixes) || !self.mark_seen(&note.path)
            {
                continue;
            }
            let title_only = title_overlap(&self.analysis.title_terms, &note.title, None);
            let full = title_overlap(&self.analysis.title_terms, &note.title, Some(&note.path));
            if title_only.max(full) < self.opts.min_title_overlap {
                continue;
            }
            let overlap = overlap_for_sort(&self.analysis.title_terms, &note.title, &note.path);
            let candidate = self.make_candidate(&note, KEYWORD_SEMANTIC, 0.0, overlap, false);
            self.candidates.push(candidate);
        }
        Ok(())
    }

    /// Mode 2b: hub rescue. A strongly titled hub must not be crowded out
    /// by a large sibling directory.
    fn mode_hub_rescue(&mut self) -> crate::Result<()> {
        if self.analysis.title_terms.is_empty() {
            return Ok(());
        }
        let results = self.store.keyword_search_title_match(
            &self.analysis.title_terms,
            1,
            self.opts.max_results * 2,
            true,
        )?;
        for note in results {
            if note.content_type != "hub" {
                continue;
            }
            if should_skip_path(&note.path, &self.opts.noise_prefixes) || !self.mark_seen(&note.path)
            {
                continue;
            }
            let title_only = title_overlap(&self.analysis.title_terms, &note.title, None);
            if title_only < HUB_RESCUE_OVERLAP {
                continue;
            }
            let candidate = self.make_candidate(&note, KEYWORD_SEMANTIC, 0.0, title_only, false);
            self.candidates.push(candidate);
        }
        Ok(())
    }

    /// Mode 1: content full-text over specific + broad terms.
    fn mode_content_fulltext(&mut self) -> crate::Result<()> {
        let triggered = self.room_left() || (self.vector_empty && !self.has_strong_candidate());
        if !triggered {
            return Ok(());
        }
        let mut terms: Vec<String> = self.analysis.specific_terms.clone();
        for term in &self.analysis.broad_terms {
            if !terms.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                terms.push(term.clone());
            }
        }
        if terms.is_empty() {
            return Ok(());
        }

        // Content-verified set: N-1 of the broad terms must co-occur.
        let verified: Vec<String> =
            if self.vector_empty && self.analysis.broad_terms.len() >= 3 {
                self.store
                    .content_term_search(
                        &self.analysis.broad_terms,
                        self.analysis.broad_terms.len() - 1,
                        self.opts.max_results * 4,
                    )?
                    .into_iter()
                    .map(|n| n.path)
                    .collect()
            } else {
                Vec::new()
            };

        let results = self
            .store
            .content_term_search(&terms, 1, self.opts.max_results * 3)?;
        for note in results {
            if should_skip_path(&note.path, &self.opts.noise_prefixes) || !self.mark_seen(&note.path)
            {
                continue;
            }
            let mut overlap = overlap_for_sort(&self.analysis.title_terms, &note.title, &note.path);
            let mut boosted = false;
            if verified.contains(&note.path) && overlap < CONTENT_PROMOTE_OVERLAP {
                if !self.content_boost_used
                    && !self.has_strong_candidate()
                    && !self.has_positive_candidate()
                {
                    overlap = CONTENT_BOOST_OVERLAP;
                    boosted = true;
                    self.content_boost_used = true;
                } else {
                    overlap = CONTENT_PROMOTE_OVERLAP;
                }
            }
            let candidate = self.make_candidate(&note, KEYWORD_SEMANTIC, 0.0, overlap, boosted);
            self.candidates.push(candidate);
        }
        Ok(())
    }

    /// Mode 3: broad title fallback when the vector mode came up empty.
    fn mode_broad_fallback(&mut self) -> crate::Result<()> {
        let triggered = self.vector_empty
            && self.analysis.specific_terms.is_empty()
            && self.analysis.broad_terms.len() >= 2
            && self.room_left();
        if !triggered {
            return Ok(());
        }
        let results = self.store.keyword_search_title_match(
            &self.analysis.broad_terms,
            2,
            self.opts.max_results * 2,
            false,
        )?;
        for note in results {
            if should_skip_path(&note.path, &self.opts.noise_prefixes) || !self.mark_seen(&note.path)
            {
                continue;
            }
            let overlap = overlap_for_sort(&self.analysis.title_terms, &note.title, &note.path);
            let candidate = self.make_candidate(&note, KEYWORD_SEMANTIC, 0.0, overlap, false);
            self.candidates.push(candidate);
        }
        Ok(())
    }

    /// Mode 4: fuzzy title. Guards keep misspelling tolerance from turning
    /// into mass false positives.
    fn mode_fuzzy_title(&mut self) -> crate::Result<()> {
        if self.analysis.title_terms.is_empty() {
            return Ok(());
        }
        let results = self
            .store
            .fuzzy_title_search(&self.analysis.title_terms, self.opts.max_results * 2)?;
        for note in results {
            if should_skip_path(&note.path, &self.opts.noise_prefixes) || !self.mark_seen(&note.path)
            {
                continue;
            }
            let overlap = overlap_for_sort(&self.analysis.title_terms, &note.title, &note.path);
            let accept = (note.content_type == "hub" && overlap >= FUZZY_HUB_OVERLAP)
                || overlap >= FUZZY_OVERLAP;
            if !accept {
                continue;
            }
            let candidate = self.make_candidate(&note, KEYWORD_SEMANTIC, 0.0, overlap, false);
            self.candidates.push(candidate);
        }
        Ok(())
    }

    /// Mode 5: broad content requiring every broad term to co-occur.
    fn mode_broad_content(&mut self) -> crate::Result<()> {
        let triggered = self.analysis.specific_terms.is_empty()
            && self.analysis.broad_terms.len() >= 3
            && (self.room_left() || self.vector_empty || !self.has_strong_candidate());
        if !triggered {
            return Ok(());
        }
        let results = self.store.content_term_search(
            &self.analysis.broad_terms,
            self.analysis.broad_terms.len(),
            self.opts.max_results * 2,
        )?;
        for note in results {
            if should_skip_path(&note.path, &self.opts.noise_prefixes) || !self.mark_seen(&note.path)
            {
                continue;
            }
            let mut overlap = overlap_for_sort(&self.analysis.title_terms, &note.title, &note.path);
            let mut boosted = false;
            if overlap < CONTENT_PROMOTE_OVERLAP {
                if !self.content_boost_used
                    && !self.has_strong_candidate()
                    && !self.has_positive_candidate()
                {
                    overlap = CONTENT_BOOST_OVERLAP;
                    boosted = true;
                    self.content_boost_used = true;
                } else {
                    overlap = CONTENT_PROMOTE_OVERLAP;
                }
            }
            let candidate = self.make_candidate(&note, KEYWORD_SEMANTIC, 0.0, overlap, boosted);
            self.candidates.push(candidate);
        }
        Ok(())
    }
}

/// Result of token-budget packing.
#[derive(Debug, Clone, Default)]
pub struct PackedResults {
    /// Candidates that fit the budget, in rank order.
    pub included: Vec<ScoredCandidate>,
    /// Candidates cut for budget; kept for the UI echo.
    pub excluded: Vec<ScoredCandidate>,
}

/// Slices the ranked pool to `effective_max` entries, then greedily packs
/// them into the token budget. Entries that do not fit are recorded as
/// excluded but keep their `match_terms` for display.
#[must_use]
pub fn pack_to_budget(
    ranked: Vec<ScoredCandidate>,
    effective_max: usize,
    max_token_budget: usize,
) -> PackedResults {
    let mut packed = PackedResults::default();
    let mut spent = 0usize;
    for (i, mut candidate) in ranked.into_iter().enumerate() {
        if i >= effective_max {
            break;
        }
        let cost = crate::memory::estimate_tokens(&candidate.title)
            + crate::memory::estimate_tokens(&candidate.path)
            + crate::memory::estimate_tokens(&candidate.snippet)
            + 8;
        candidate.tokens = cost;
        if spent + cost <= max_token_budget {
            spent += cost;
            packed.included.push(candidate);
        } else {
            packed.excluded.push(candidate);
        }
    }
    packed
}
