//! Instance registry: one JSON file per live agent session.
//!
//! Files are written 0600 via temp-file-and-rename; concurrent instances
//! are safe by filename separation (one file per session id).

use crate::error::{IoError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Age in hours past which an instance file is garbage.
const STALE_AGE_HOURS: i64 = 24;

/// One running agent session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceDescriptor {
    /// Session id this instance belongs to.
    pub session_id: String,
    /// Hostname, for multi-machine vaults.
    pub machine: String,
    /// Unix seconds the session started.
    pub started: i64,
    /// Unix seconds of the last opportunistic update.
    pub updated: i64,
    /// One-line summary of what the session is doing.
    pub summary: String,
    /// Free-form status, e.g. `active`.
    pub status: String,
}

/// Sanitizes a session id for use as a filename.
fn safe_file_stem(session_id: &str) -> String {
    session_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(64)
        .collect()
}

fn instance_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{}.json", safe_file_stem(session_id)))
}

/// Writes (or rewrites) the descriptor for a session.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written.
pub fn write_instance(dir: &Path, descriptor: &InstanceDescriptor) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = instance_path(dir, &descriptor.session_id);
    let json = serde_json::to_string_pretty(descriptor)
        .map_err(|e| IoError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    let tmp = path.with_extension("tmp");
    write_private(&tmp, json.as_bytes())?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Reads every parseable descriptor in the directory.
#[must_use]
pub fn read_instances(dir: &Path) -> Vec<InstanceDescriptor> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Ok(text) = std::fs::read_to_string(&path)
            && let Ok(descriptor) = serde_json::from_str::<InstanceDescriptor>(&text)
        {
            out.push(descriptor);
        }
    }
    out.sort_by(|a, b| b.updated.cmp(&a.updated));
    out
}

/// Deletes instance files older than 24 hours, never the current session's.
///
/// Returns how many files were removed.
pub fn clean_stale_instances(dir: &Path, current_session: &str, now_unix: i64) -> usize {
    let cutoff = now_unix - STALE_AGE_HOURS * 3600;
    let mut removed = 0;
    for descriptor in read_instances(dir) {
        if descriptor.session_id == current_session {
            continue;
        }
        if descriptor.updated < cutoff {
            let path = instance_path(dir, &descriptor.session_id);
            if std::fs::remove_file(path).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

/// Active instances other than the current session, most recent first.
#[must_use]
pub fn other_active_instances(
    dir: &Path,
    current_session: &str,
    now_unix: i64,
) -> Vec<InstanceDescriptor> {
    let cutoff = now_unix - STALE_AGE_HOURS * 3600;
    read_instances(dir)
        .into_iter()
        .filter(|d| d.session_id != current_session && d.updated >= cutoff)
        .collect()
}
