//! `SQLite` note store implementation.
//!
//! Provides persistent storage using `SQLite` with WAL mode, FTS5 content
//! search, and brute-force dense-vector scanning over chunk embeddings.
//! Vault-scale data (thousands of notes) keeps the linear scan well under
//! the hook latency budget.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in the target types.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::error::{Result, StoreError};
use crate::filter::is_private;
use crate::score::within_edit_distance_1;
use crate::store::schema::{SCHEMA_SQL, SCHEMA_VERSION, pending_migrations};
use crate::store::traits::{
    DecisionRow, Note, NoteMeta, NoteStore, RawSearchResult, StoreStats,
};
use crate::telemetry::HookActivityRecord;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Staleness window for [`NoteStore::stale_notes`] (45 days).
const STALE_AGE_SECS: i64 = 45 * 86_400;

/// SQLite-based note store.
pub struct SqliteNoteStore {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SqliteNoteStore {
    /// Opens or creates the store at the given path and initializes the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Self::bootstrap(conn, Some(path))
    }

    /// Creates an in-memory store. Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?, None)
    }

    /// Shared tail of both constructors: pragmas, then schema setup.
    fn bootstrap(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        // WAL keeps hook reads from blocking a concurrently running
        // indexer. journal_mode returns a row, so it cannot go through
        // execute_batch with the other pragma.
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
        let mut store = Self { conn, path };
        store.init()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creates or upgrades the schema. `user_version` 0 means a fresh
    /// database; anything older than [`SCHEMA_VERSION`] gets the pending
    /// upgrade batches applied in order.
    fn init(&mut self) -> Result<()> {
        let version = self.schema_version()?;
        if version == 0 {
            self.conn.execute_batch(SCHEMA_SQL)?;
            return self.set_schema_version(SCHEMA_VERSION);
        }
        for (target, sql) in pending_migrations(version) {
            self.conn
                .execute_batch(sql)
                .map_err(|e| StoreError::Migration(format!("to v{target}: {e}")))?;
            self.set_schema_version(target)?;
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<u32> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        Ok(u32::try_from(version).unwrap_or(0))
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {version};"))?;
        Ok(())
    }

    /// Loads every non-private note row (no chunk text attached).
    fn all_note_rows(&self) -> Result<Vec<(i64, Note)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, path, title, content_type, confidence, modified, tags
                 FROM notes ORDER BY id",
            )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Note {
                        path: row.get(1)?,
                        title: row.get(2)?,
                        content_type: row.get(3)?,
                        confidence: row.get(4)?,
                        modified: row.get(5)?,
                        text: String::new(),
                        tags: parse_tags(&row.get::<_, String>(6)?),
                    },
                ))
            })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, note) = row?;
            if !is_private(&note.path) {
                out.push((id, note));
            }
        }
        Ok(out)
    }

    /// Fills `note.text` with the note's first chunk body.
    fn attach_first_chunk(&self, note_id: i64, note: &mut Note) -> Result<()> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT content FROM chunks WHERE note_id = ? ORDER BY chunk_index LIMIT 1",
                params![note_id],
                |row| row.get(0),
            )
            .optional()?;
        note.text = text.unwrap_or_default();
        Ok(())
    }

    fn note_by_row_id(&self, note_id: i64) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                "SELECT path, title, content_type, confidence, modified, tags
                 FROM notes WHERE id = ?",
                params![note_id],
                |row| {
                    Ok(Note {
                        path: row.get(0)?,
                        title: row.get(1)?,
                        content_type: row.get(2)?,
                        confidence: row.get(3)?,
                        modified: row.get(4)?,
                        text: String::new(),
                        tags: parse_tags(&row.get::<_, String>(5)?),
                    })
                },
            )
            .optional()?;
        Ok(note)
    }
}

/// Seconds since the Unix epoch; a pre-1970 clock reads as zero.
fn unix_now() -> i64 {
    std::time::UNIX_EPOCH
        .elapsed()
        .ok()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

fn parse_tags(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Serializes an f32 slice as little-endian bytes.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Deserializes little-endian bytes back to f32 values.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// L2 distance between two vectors; mismatched lengths yield infinity so
/// the hit sorts last and drops out at the distance gate.
fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = f64::from(x - y);
            d * d
        })
        .sum();
    sum.sqrt()
}

/// Counts how many distinct terms appear (case-insensitively) in `haystack`.
fn count_term_matches(haystack: &str, terms: &[String]) -> usize {
    let lower = haystack.to_lowercase();
    terms
        .iter()
        .filter(|t| !t.is_empty() && lower.contains(&t.to_lowercase()))
        .count()
}

impl NoteStore for SqliteNoteStore {
    fn vector_search_raw(&self, query: &[f32], k: usize) -> Result<Vec<RawSearchResult>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT c.note_id, c.content, e.embedding
                 FROM chunk_embeddings e JOIN chunks c ON c.id = e.chunk_id",
            )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?;

        // Best chunk per note.
        let mut best: HashMap<i64, (f64, String)> = HashMap::new();
        for row in rows {
            let (note_id, content, blob) = row?;
            let distance = l2_distance(query, &blob_to_embedding(&blob));
            if distance.is_finite() {
                let entry = best.entry(note_id).or_insert((f64::INFINITY, String::new()));
                if distance < entry.0 {
                    *entry = (distance, content);
                }
            }
        }

        let mut hits = Vec::new();
        for (note_id, (distance, content)) in best {
            if let Some(mut note) = self.note_by_row_id(note_id)? {
                if is_private(&note.path) {
                    continue;
                }
                note.text = content;
                hits.push(RawSearchResult { note, distance });
            }
        }
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn keyword_search_title_match(
        &self,
        terms: &[String],
        min_matches: usize,
        limit: usize,
        title_only: bool,
    ) -> Result<Vec<Note>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored = Vec::new();
        for (id, mut note) in self.all_note_rows()? {
            let haystack = if title_only {
                note.title.clone()
            } else {
                format!("{} {}", note.title, note.path)
            };
            let matches = count_term_matches(&haystack, terms);
            if matches >= min_matches.max(1) {
                self.attach_first_chunk(id, &mut note)?;
                scored.push((matches, note));
            }
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.modified.cmp(&a.1.modified)));
        Ok(scored.into_iter().map(|(_, n)| n).take(limit).collect())
    }

    fn content_term_search(
        &self,
        terms: &[String],
        min_matches: usize,
        limit: usize,
    ) -> Result<Vec<Note>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for (id, mut note) in self.all_note_rows()? {
            let mut stmt = self
                .conn
                .prepare("SELECT content FROM chunks WHERE note_id = ? ORDER BY chunk_index")?;
            let chunks = stmt
                .query_map(params![id], |row| row.get::<_, String>(0))?;

            let mut best_matches = 0usize;
            let mut best_text = String::new();
            for chunk in chunks {
                let text = chunk?;
                let matches = count_term_matches(&text, terms);
                if matches > best_matches {
                    best_matches = matches;
                    best_text = text;
                }
            }
            if best_matches >= min_matches.max(1) {
                note.text = best_text;
                out.push((best_matches, note));
            }
        }
        out.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.modified.cmp(&a.1.modified)));
        Ok(out.into_iter().map(|(_, n)| n).take(limit).collect())
    }

    fn fuzzy_title_search(&self, terms: &[String], limit: usize) -> Result<Vec<Note>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        let mut out = Vec::new();
        for (id, mut note) in self.all_note_rows()? {
            let title_words: Vec<String> = note
                .title
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
                .collect();
            let hit = lowered.iter().any(|term| {
                title_words
                    .iter()
                    .any(|word| word == term || within_edit_distance_1(term, word))
            });
            if hit {
                self.attach_first_chunk(id, &mut note)?;
                out.push(note);
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn fts_search(&self, query: &str, limit: usize) -> Result<Vec<Note>> {
        // Quote each token so user punctuation cannot inject FTS syntax.
        let sanitized: Vec<String> = query
            .split_whitespace()
            .map(|t| t.replace('"', ""))
            .filter(|t| t.len() >= 2)
            .map(|t| format!("\"{t}\""))
            .collect();
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = sanitized.join(" OR ");

        let mut stmt = self
            .conn
            .prepare(
                "SELECT c.note_id, c.content
                 FROM chunks_fts f JOIN chunks c ON c.id = f.rowid
                 WHERE chunks_fts MATCH ?
                 ORDER BY bm25(chunks_fts)
                 LIMIT ?",
            )?;
        let rows = stmt
            .query_map(params![match_expr, limit as i64 * 4], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;

        let mut seen = Vec::new();
        let mut out = Vec::new();
        for row in rows {
            let (note_id, content) = row?;
            if seen.contains(&note_id) {
                continue;
            }
            seen.push(note_id);
            if let Some(mut note) = self.note_by_row_id(note_id)? {
                if is_private(&note.path) {
                    continue;
                }
                note.text = content;
                out.push(note);
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn recent_notes(&self, n: usize) -> Result<Vec<Note>> {
        let mut rows = self.all_note_rows()?;
        rows.sort_by(|a, b| b.1.modified.cmp(&a.1.modified));
        let mut out = Vec::new();
        for (id, mut note) in rows.into_iter().take(n) {
            self.attach_first_chunk(id, &mut note)?;
            out.push(note);
        }
        Ok(out)
    }

    fn note_refs(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .all_note_rows()?
            .into_iter()
            .map(|(_, note)| (note.path, note.title))
            .collect())
    }

    fn pinned_notes(&self) -> Result<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, path, title, content_type, confidence, modified, tags
                 FROM notes WHERE pinned = 1 ORDER BY id",
            )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Note {
                        path: row.get(1)?,
                        title: row.get(2)?,
                        content_type: row.get(3)?,
                        confidence: row.get(4)?,
                        modified: row.get(5)?,
                        text: String::new(),
                        tags: parse_tags(&row.get::<_, String>(6)?),
                    },
                ))
            })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, mut note) = row?;
            if is_private(&note.path) {
                continue;
            }
            self.attach_first_chunk(id, &mut note)?;
            out.push(note);
        }
        Ok(out)
    }

    fn stale_notes(&self, n: usize, now_unix: i64) -> Result<Vec<Note>> {
        let cutoff = now_unix - STALE_AGE_SECS;
        let mut out: Vec<Note> = self
            .all_note_rows()?
            .into_iter()
            .map(|(_, note)| note)
            .filter(|note| note.modified < cutoff && note.confidence < 0.5)
            .collect();
        out.sort_by(|a, b| a.modified.cmp(&b.modified));
        out.truncate(n);
        Ok(out)
    }

    fn session_state_get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM session_state WHERE session_id = ? AND key = ?",
                params![session_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn session_state_set(&mut self, session_id: &str, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO session_state (session_id, key, value, updated_at)
                 VALUES (?, ?, ?, ?)",
                params![session_id, key, value, unix_now()],
            )?;
        Ok(())
    }

    fn insert_decision(&mut self, decision: &DecisionRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO decisions (session_id, content, created_at) VALUES (?, ?, ?)",
                params![decision.session_id, decision.content, decision.created_at],
            )?;
        Ok(())
    }

    fn insert_hook_activity(&mut self, record: &HookActivityRecord) -> Result<()> {
        let record = record.clone().normalized();
        let paths = serde_json::to_string(&record.note_paths).map_err(StoreError::from)?;
        self.conn
            .execute(
                "INSERT INTO hook_activity
                 (timestamp, session_id, hook_name, status, surfaced_notes,
                  estimated_tokens, error_message, detail, note_paths)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    record.timestamp,
                    record.session_id,
                    record.hook_name,
                    record.status,
                    record.surfaced_notes,
                    record.estimated_tokens,
                    record.error_message,
                    record.detail,
                    paths,
                ],
            )?;
        Ok(())
    }

    fn record_recovery(
        &mut self,
        session_id: &str,
        source: &str,
        completeness: f64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO recoveries (session_id, source, completeness, created_at)
                 VALUES (?, ?, ?, ?)",
                params![session_id, source, completeness, unix_now()],
            )?;
        Ok(())
    }

    fn log_injection(&mut self, session_id: &str, paths: &[String]) -> Result<()> {
        let now = unix_now();
        for path in paths {
            self.conn
                .execute(
                    "INSERT INTO note_usage (session_id, note_path, created_at)
                     VALUES (?, ?, ?)",
                    params![session_id, path, now],
                )?;
        }
        Ok(())
    }

    fn usage_by_session(&self, session_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT note_path FROM note_usage WHERE session_id = ? ORDER BY id")?;
        let rows = stmt
            .query_map(params![session_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn increment_access_count(&mut self, path: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE notes SET access_count = access_count + 1 WHERE path = ?",
                params![path],
            )?;
        Ok(())
    }

    fn milestone_shown(&self, name: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM milestones WHERE name = ?",
                params![name],
                |row| row.get(0),
            )?;
        Ok(count > 0)
    }

    fn record_milestone(&mut self, name: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO milestones (name, shown_at) VALUES (?, ?)",
                params![name, unix_now()],
            )?;
        Ok(())
    }

    fn upsert_note(&mut self, note: &NoteMeta) -> Result<i64> {
        let tags = serde_json::to_string(&note.tags).map_err(StoreError::from)?;
        let now = unix_now();
        // Replacing a note clears its chunks (and, via cascade, embeddings).
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM notes WHERE path = ?",
                params![note.path],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            self.conn
                .execute("DELETE FROM chunks WHERE note_id = ?", params![id])?;
            self.conn
                .execute(
                    "UPDATE notes SET title = ?, content_type = ?, confidence = ?,
                     modified = ?, tags = ?, pinned = ? WHERE id = ?",
                    params![
                        note.title,
                        note.content_type,
                        note.confidence,
                        note.modified,
                        tags,
                        i64::from(note.pinned),
                        id,
                    ],
                )?;
            return Ok(id);
        }
        self.conn
            .execute(
                "INSERT INTO notes (path, title, content_type, confidence, modified, tags,
                 pinned, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    note.path,
                    note.title,
                    note.content_type,
                    note.confidence,
                    note.modified,
                    tags,
                    i64::from(note.pinned),
                    now,
                ],
            )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_chunk(&mut self, note_id: i64, text: &str, embedding: Option<&[f32]>) -> Result<i64> {
        let index: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(chunk_index) + 1, 0) FROM chunks WHERE note_id = ?",
                params![note_id],
                |row| row.get(0),
            )?;
        self.conn
            .execute(
                "INSERT INTO chunks (note_id, content, chunk_index, created_at)
                 VALUES (?, ?, ?, ?)",
                params![note_id, text, index, unix_now()],
            )?;
        let chunk_id = self.conn.last_insert_rowid();
        if let Some(embedding) = embedding {
            self.conn
                .execute(
                    "INSERT OR REPLACE INTO chunk_embeddings
                     (chunk_id, embedding, dimensions, created_at)
                     VALUES (?, ?, ?, ?)",
                    params![
                        chunk_id,
                        embedding_to_blob(embedding),
                        embedding.len() as i64,
                        unix_now(),
                    ],
                )?;
        }
        Ok(chunk_id)
    }

    fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            note_count: count("SELECT COUNT(*) FROM notes")?,
            chunk_count: count("SELECT COUNT(*) FROM chunks")?,
            embedded_count: count("SELECT COUNT(*) FROM chunk_embeddings")?,
            activity_count: count("SELECT COUNT(*) FROM hook_activity")?,
            schema_version: self.schema_version()?,
        })
    }
}
