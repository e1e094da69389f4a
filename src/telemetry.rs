//! Hook activity telemetry and the advisory verbose log.
//!
//! One activity row is written per hook invocation, after the worker
//! completes and before the store closes. The verbose log is a styled,
//! append-only file for humans; rotation is non-atomic and that is
//! acceptable for advisory logging.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Valid normalized statuses for an activity row.
pub const STATUSES: &[&str] = &["injected", "skipped", "empty", "error"];

/// Append-only telemetry row describing one hook invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookActivityRecord {
    /// Unix seconds at write time.
    pub timestamp: i64,
    /// Session the hook ran under; may be empty.
    pub session_id: String,
    /// Hook name, e.g. `context-surfacing`.
    pub hook_name: String,
    /// One of [`STATUSES`] after normalization.
    pub status: String,
    /// Number of notes surfaced.
    pub surfaced_notes: u32,
    /// Estimated tokens injected.
    pub estimated_tokens: u32,
    /// Short error text; empty when none.
    pub error_message: String,
    /// Free-form detail, e.g. `"handoff updated"`.
    pub detail: String,
    /// Vault-relative paths of surfaced notes.
    pub note_paths: Vec<String>,
}

impl HookActivityRecord {
    /// Normalizes a record in place and returns it.
    ///
    /// Rules: trim all strings; when status is empty, derive it from the
    /// presence of an error message or surfaced output. Idempotent.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.session_id = self.session_id.trim().to_string();
        self.hook_name = self.hook_name.trim().to_string();
        self.status = self.status.trim().to_lowercase();
        self.error_message = self.error_message.trim().to_string();
        self.detail = self.detail.trim().to_string();
        for path in &mut self.note_paths {
            *path = path.trim().to_string();
        }
        self.note_paths.retain(|p| !p.is_empty());

        if self.status.is_empty() {
            self.status = if !self.error_message.is_empty() {
                "error".to_string()
            } else if self.surfaced_notes > 0 {
                "injected".to_string()
            } else {
                "empty".to_string()
            };
        }
        self
    }
}

/// Maximum size of the verbose log before rotation.
const VERBOSE_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Tail kept when the verbose log rotates.
const VERBOSE_LOG_KEEP_BYTES: usize = 1024 * 1024;

/// Appends one line to the verbose log at `path`, rotating first when the
/// file exceeds 5 MiB. Errors are swallowed: the log is advisory.
pub fn append_verbose_line(path: &Path, line: &str) {
    rotate_if_needed(path);
    let mut options = std::fs::OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    if let Ok(mut file) = options.open(path) {
        let _ = writeln!(file, "{line}");
    }
}

/// Truncates the log to roughly its last 1 MiB when over the cap.
fn rotate_if_needed(path: &Path) {
    let Ok(meta) = std::fs::metadata(path) else {
        return;
    };
    if meta.len() <= VERBOSE_LOG_MAX_BYTES {
        return;
    }
    let Ok(data) = std::fs::read(path) else {
        return;
    };
    let start = data.len().saturating_sub(VERBOSE_LOG_KEEP_BYTES);
    // Start the kept tail at a line boundary.
    let start = data[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(start, |offset| start + offset + 1);
    let _ = std::fs::write(path, &data[start..]);
}
