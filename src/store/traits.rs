//! Note store trait definition.
//!
//! Defines the interface the retrieval pipeline and the hook handlers
//! consume. All operations are synchronous; no transactional contract is
//! exported, so callers treat any error as "no data for this mode".

use crate::error::Result;
use crate::telemetry::HookActivityRecord;
use serde::Serialize;

/// Read-only projection of a note as returned by every search API.
///
/// `text` carries the body of the chunk that matched (or the first chunk
/// for non-content searches); ranking and presentation are per note.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    /// Vault-relative path. Never under the private prefix for notes
    /// returned via public search APIs.
    pub path: String,
    /// Note title.
    pub title: String,
    /// Content type: handoff, hub, progress, decision, research, note, …
    pub content_type: String,
    /// Indexer-assigned confidence in `[0, 1]`.
    pub confidence: f64,
    /// Unix seconds of last modification.
    pub modified: i64,
    /// Matching chunk body.
    pub text: String,
    /// Optional tags.
    pub tags: Vec<String>,
}

/// A dense-vector hit: a note plus its L2 distance to the query.
#[derive(Debug, Clone)]
pub struct RawSearchResult {
    /// The matched note.
    pub note: Note,
    /// L2 distance, >= 0. The store orders hits by ascending distance.
    pub distance: f64,
}

/// A decision row extracted at session stop.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRow {
    /// Session that produced the decision.
    pub session_id: String,
    /// One-line decision text.
    pub content: String,
    /// Unix seconds at insertion.
    pub created_at: i64,
}

/// Persistent note store consumed by the pipeline and handlers.
///
/// A single hook invocation exclusively owns the store handle for its
/// lifetime; the handle must outlive the worker on every path.
pub trait NoteStore: Send {
    // ==================== Search Operations ====================

    /// Dense-vector search: the `k` nearest chunks by L2 distance, one hit
    /// per note (its best chunk), ordered by ascending distance.
    fn vector_search_raw(&self, query: &[f32], k: usize) -> Result<Vec<RawSearchResult>>;

    /// Keyword search over title (and path unless `title_only`), keeping
    /// notes matching at least `min_matches` of `terms`.
    fn keyword_search_title_match(
        &self,
        terms: &[String],
        min_matches: usize,
        limit: usize,
        title_only: bool,
    ) -> Result<Vec<Note>>;

    /// Convenience title+path keyword search with a single-match gate.
    fn keyword_search(&self, terms: &[String], limit: usize) -> Result<Vec<Note>> {
        self.keyword_search_title_match(terms, 1, limit, false)
    }

    /// Content search over chunk bodies, keeping notes whose chunks match
    /// at least `min_matches` of `terms`.
    fn content_term_search(
        &self,
        terms: &[String],
        min_matches: usize,
        limit: usize,
    ) -> Result<Vec<Note>>;

    /// Fuzzy title search tolerating one edit per term.
    fn fuzzy_title_search(&self, terms: &[String], limit: usize) -> Result<Vec<Note>>;

    /// Full-text search over chunk bodies via FTS5 with bm25 ranking.
    ///
    /// Exposed on the store but not part of the standard planner's mode
    /// ladder.
    fn fts_search(&self, query: &str, limit: usize) -> Result<Vec<Note>>;

    /// The `n` most recently modified notes.
    fn recent_notes(&self, n: usize) -> Result<Vec<Note>>;

    /// Lightweight (path, title) listing of every searchable note, used
    /// for reference detection.
    fn note_refs(&self) -> Result<Vec<(String, String)>>;

    /// Notes pinned by the user, oldest pin first.
    fn pinned_notes(&self) -> Result<Vec<Note>>;

    /// Notes unmodified for 45 days with confidence below 0.5, capped.
    fn stale_notes(&self, n: usize, now_unix: i64) -> Result<Vec<Note>>;

    // ==================== Session State ====================

    /// Reads a per-session key.
    fn session_state_get(&self, session_id: &str, key: &str) -> Result<Option<String>>;

    /// Writes a per-session key. Atomic per key.
    fn session_state_set(&mut self, session_id: &str, key: &str, value: &str) -> Result<()>;

    // ==================== Telemetry & Usage ====================

    /// Inserts one decision row.
    fn insert_decision(&mut self, decision: &DecisionRow) -> Result<()>;

    /// Inserts one hook activity row (normalized before write).
    fn insert_hook_activity(&mut self, record: &HookActivityRecord) -> Result<()>;

    /// Records which recovery source served a session start.
    fn record_recovery(&mut self, session_id: &str, source: &str, completeness: f64)
    -> Result<()>;

    /// Logs one surfaced-note usage row per path for the session.
    fn log_injection(&mut self, session_id: &str, paths: &[String]) -> Result<()>;

    /// Paths surfaced for a session so far.
    fn usage_by_session(&self, session_id: &str) -> Result<Vec<String>>;

    /// Bumps a note's access count (feedback loop).
    fn increment_access_count(&mut self, path: &str) -> Result<()>;

    /// Whether a one-time milestone message was already shown.
    fn milestone_shown(&self, name: &str) -> Result<bool>;

    /// Marks a one-time milestone as shown.
    fn record_milestone(&mut self, name: &str) -> Result<()>;

    // ==================== Indexer Surface ====================

    /// Inserts or replaces a note row; returns its id. Chunks for a
    /// replaced note are cleared. (Populated by the external indexer; the
    /// hook core only reads.)
    fn upsert_note(&mut self, note: &NoteMeta) -> Result<i64>;

    /// Appends a chunk (with optional embedding) to a note.
    fn add_chunk(&mut self, note_id: i64, text: &str, embedding: Option<&[f32]>) -> Result<i64>;

    /// Gathers store statistics for the status command.
    fn stats(&self) -> Result<StoreStats>;
}

/// Indexer-facing note metadata for [`NoteStore::upsert_note`].
#[derive(Debug, Clone)]
pub struct NoteMeta {
    /// Vault-relative path (unique key).
    pub path: String,
    /// Note title.
    pub title: String,
    /// Content type.
    pub content_type: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Unix seconds of last modification.
    pub modified: i64,
    /// Tags, serialized as JSON in the store.
    pub tags: Vec<String>,
    /// Whether the note is pinned.
    pub pinned: bool,
}

/// Store statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Number of notes indexed.
    pub note_count: usize,
    /// Number of chunks indexed.
    pub chunk_count: usize,
    /// Number of chunks carrying embeddings.
    pub embedded_count: usize,
    /// Number of hook activity rows.
    pub activity_count: usize,
    /// Schema version.
    pub schema_version: u32,
}
