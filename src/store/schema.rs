//! Physical layout of the vault index.
//!
//! The schema version lives in SQLite's `user_version` pragma rather than
//! a bookkeeping table; a fresh database reports version 0, which is the
//! signal to create everything from scratch. Upgrades are additive SQL
//! batches keyed by the version they bring the database to.

/// Version written to `user_version` after a fresh install or a completed
/// upgrade.
pub const SCHEMA_VERSION: u32 = 2;

/// Full schema for a fresh database.
pub const SCHEMA_SQL: &str = r"
-- Indexed notes (one row per vault note)
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    content_type TEXT NOT NULL DEFAULT 'note',
    confidence REAL NOT NULL DEFAULT 0.5,
    modified INTEGER NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',  -- JSON array
    pinned INTEGER NOT NULL DEFAULT 0,
    access_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_modified ON notes(modified);
CREATE INDEX IF NOT EXISTS idx_notes_type ON notes(content_type);

-- Chunks (embedded segments of note bodies)
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chunks_note ON chunks(note_id);

-- Chunk embeddings for dense-vector search
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id INTEGER PRIMARY KEY,
    embedding BLOB NOT NULL,  -- f32 array serialized as LE bytes
    dimensions INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
);

-- Porter-stemmed full-text index over chunk bodies. The chunks table is
-- the external-content source, so the triggers below must mirror every
-- write or FTS rows go stale.
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    content, content='chunks', content_rowid='id', tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS fts_chunk_add AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS fts_chunk_del AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, content)
        VALUES ('delete', old.id, old.content);
END;

CREATE TRIGGER IF NOT EXISTS fts_chunk_upd AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, content)
        VALUES ('delete', old.id, old.content);
    INSERT INTO chunks_fts(rowid, content) VALUES (new.id, new.content);
END;

-- Per-session key/value state
CREATE TABLE IF NOT EXISTS session_state (
    session_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (session_id, key)
);

-- Decisions extracted at session stop
CREATE TABLE IF NOT EXISTS decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Hook activity telemetry (append-only)
CREATE TABLE IF NOT EXISTS hook_activity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    session_id TEXT NOT NULL DEFAULT '',
    hook_name TEXT NOT NULL,
    status TEXT NOT NULL,
    surfaced_notes INTEGER NOT NULL DEFAULT 0,
    estimated_tokens INTEGER NOT NULL DEFAULT 0,
    error_message TEXT NOT NULL DEFAULT '',
    detail TEXT NOT NULL DEFAULT '',
    note_paths TEXT NOT NULL DEFAULT '[]'  -- JSON array
);

-- Session-recovery provenance
CREATE TABLE IF NOT EXISTS recoveries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    source TEXT NOT NULL,
    completeness REAL NOT NULL,
    created_at INTEGER NOT NULL
);

-- Surfaced-note usage per session (v2)
CREATE TABLE IF NOT EXISTS note_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    note_path TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_usage_session ON note_usage(session_id);

-- One-time milestone messages (v2)
CREATE TABLE IF NOT EXISTS milestones (
    name TEXT PRIMARY KEY,
    shown_at INTEGER NOT NULL
);
";

/// Upgrade batch bringing a v1 database to v2 (usage + milestones).
const UPGRADE_TO_V2: &str = r"
CREATE TABLE IF NOT EXISTS note_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    note_path TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_usage_session ON note_usage(session_id);

CREATE TABLE IF NOT EXISTS milestones (
    name TEXT PRIMARY KEY,
    shown_at INTEGER NOT NULL
);
";

/// Every known upgrade as `(resulting_version, sql)`, ascending.
pub const MIGRATIONS: &[(u32, &str)] = &[(2, UPGRADE_TO_V2)];

/// Upgrades still pending for a database currently at `version`.
#[must_use]
pub fn pending_migrations(version: u32) -> Vec<(u32, &'static str)> {
    MIGRATIONS
        .iter()
        .copied()
        .filter(|(target, _)| *target > version && *target <= SCHEMA_VERSION)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_covers_core_tables() {
        for table in ["notes", "chunks", "chunk_embeddings", "chunks_fts", "session_state"] {
            assert!(SCHEMA_SQL.contains(table), "schema must define {table}");
        }
    }

    #[test]
    fn test_migrations_ascend_to_current() {
        let mut last = 1;
        for (target, sql) in MIGRATIONS {
            assert!(*target > last);
            assert!(!sql.trim().is_empty());
            last = *target;
        }
        assert_eq!(last, SCHEMA_VERSION);
    }

    #[test]
    fn test_pending_migrations_windows() {
        // A v1 database needs exactly the v2 upgrade.
        let pending = pending_migrations(1);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, 2);
        // A current database needs nothing.
        assert!(pending_migrations(SCHEMA_VERSION).is_empty());
        // Version 0 means fresh; init creates the whole schema and never
        // consults this list, which therefore still reports everything.
        assert!(!pending_migrations(0).is_empty());
    }
}
