//! Session-recovery cascade.
//!
//! At session start the previous session is reconstructed from the richest
//! available source: a handoff note, then the instance registry, then the
//! IDE's session index. The first source that yields data wins.

use crate::config::stays_within;
use crate::session::instances::read_instances;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Character budget for the extracted handoff body.
pub const HANDOFF_MAX_CHARS: usize = 2500;

/// Character bound on the formatted recovery block.
const RECOVERY_BLOCK_MAX_CHARS: usize = 4000;

/// First-prompt echo truncation length.
const FIRST_PROMPT_MAX_CHARS: usize = 147;

/// Size cap on the IDE session index read.
const SESSION_INDEX_MAX_BYTES: u64 = 1024 * 1024;

/// Entries this fresh may be the live session when we have no current id.
const SESSION_INDEX_FRESHNESS_SECS: i64 = 600;

/// Handoff section headings surfaced first, in this order.
const PRIORITY_SECTIONS: &[&str] = &["summary", "decisions", "next steps", "open questions", "blockers"];

/// Placeholder bodies that carry no information.
const PLACEHOLDER_BODIES: &[&str] = &["(none)", "(none recorded)", "(not recorded)"];

/// Where the recovered data came from. Completeness strictly increases
/// with source richness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySource {
    /// Nothing recovered.
    None,
    /// IDE session index (0.3).
    SessionIndex,
    /// Instance registry (0.4).
    Instance,
    /// Handoff note (1.0).
    Handoff,
}

impl RecoverySource {
    /// Telemetry name of the source.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SessionIndex => "session_index",
            Self::Instance => "instance",
            Self::Handoff => "handoff",
        }
    }

    /// Completeness of the recovered view.
    #[must_use]
    pub fn completeness(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::SessionIndex => 0.3,
            Self::Instance => 0.4,
            Self::Handoff => 1.0,
        }
    }
}

/// Reconstructed previous-session view.
#[derive(Debug, Clone)]
pub struct RecoveredSession {
    /// Which source produced the data.
    pub source: RecoverySource,
    /// Previous session id, when known.
    pub session_id: Option<String>,
    /// One-line summary.
    pub summary: String,
    /// First prompt of the previous session, when known.
    pub first_prompt: Option<String>,
    /// Message count, 0 when unknown.
    pub message_count: u32,
    /// Git branch, empty when unknown.
    pub git_branch: String,
    /// Human-readable end time, empty when unknown.
    pub ended_at: String,
    /// Extracted handoff body (handoff source only).
    pub handoff_text: String,
}

impl RecoveredSession {
    fn none() -> Self {
        Self {
            source: RecoverySource::None,
            session_id: None,
            summary: String::new(),
            first_prompt: None,
            message_count: 0,
            git_branch: String::new(),
            ended_at: String::new(),
            handoff_text: String::new(),
        }
    }
}

/// Inputs to the cascade, gathered by the session-bootstrap handler.
#[derive(Debug, Clone)]
pub struct RecoveryInputs {
    /// Vault root.
    pub vault: PathBuf,
    /// Vault-relative handoff directory.
    pub handoff_dir: String,
    /// Maximum handoff/instance age in hours.
    pub max_age_hours: u64,
    /// Instance registry directory.
    pub instances_dir: PathBuf,
    /// Current session id, when known.
    pub current_session: Option<String>,
    /// Home directory for the IDE index lookup.
    pub home: Option<PathBuf>,
    /// Working directory hashed into the IDE index path.
    pub cwd: PathBuf,
    /// Unix seconds now.
    pub now: i64,
}

/// Runs the cascade and returns the first source that yields data.
#[must_use]
pub fn recover_previous_session(inputs: &RecoveryInputs) -> RecoveredSession {
    if let Some(recovered) = try_handoff(inputs) {
        return recovered;
    }
    if let Some(recovered) = try_instance(inputs) {
        return recovered;
    }
    if let Some(recovered) = try_session_index(inputs) {
        return recovered;
    }
    RecoveredSession::none()
}

// ==================== Source 1: handoff file ====================

fn try_handoff(inputs: &RecoveryInputs) -> Option<RecoveredSession> {
    if !stays_within(&inputs.vault, &inputs.handoff_dir) {
        return None;
    }
    let dir = inputs.vault.join(&inputs.handoff_dir);
    let entries = std::fs::read_dir(&dir).ok()?;

    // Filenames are date-prefixed; descending order is newest-first.
    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.ends_with(".md"))
        .collect();
    names.sort_by(|a, b| b.cmp(a));

    #[allow(clippy::cast_possible_wrap)]
    let max_age_secs = (inputs.max_age_hours * 3600) as i64;
    for name in names {
        let path = dir.join(&name);
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| {
                #[allow(clippy::cast_possible_wrap)]
                let secs = d.as_secs() as i64;
                secs
            });
        // Strict ">": a handoff exactly at the age limit still counts.
        if inputs.now - mtime > max_age_secs {
            continue;
        }
        let Some(raw) = read_capped(&path, 2 * HANDOFF_MAX_CHARS as u64) else {
            continue;
        };
        let Some(body) = extract_handoff_sections(&raw, HANDOFF_MAX_CHARS) else {
            continue;
        };
        return Some(RecoveredSession {
            source: RecoverySource::Handoff,
            session_id: None,
            summary: name.trim_end_matches(".md").to_string(),
            first_prompt: None,
            message_count: 0,
            git_branch: String::new(),
            ended_at: String::new(),
            handoff_text: body,
        });
    }
    None
}

fn read_capped(path: &Path, cap: u64) -> Option<String> {
    use std::io::Read;
    let file = std::fs::File::open(path).ok()?;
    let mut buffer = String::new();
    file.take(cap).read_to_string(&mut buffer).ok()?;
    Some(buffer)
}

/// Extracts the useful sections of a handoff note.
///
/// Strips YAML frontmatter and the leading `# ` title, then reorders `## `
/// sections: priority headings first (in priority order), the rest in
/// source order. Placeholder bodies are dropped.
#[must_use]
pub fn extract_handoff_sections(markdown: &str, max_chars: usize) -> Option<String> {
    let body = strip_frontmatter(markdown);
    let body = strip_leading_title(body);

    // Split into (heading, body) pairs on `## ` at line starts.
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current_heading: Option<String> = None;
    let mut current_body = String::new();
    for line in body.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some(h) = current_heading.take() {
                sections.push((h, current_body.trim().to_string()));
            }
            current_heading = Some(heading.trim().to_string());
            current_body = String::new();
        } else if current_heading.is_some() {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }
    if let Some(h) = current_heading {
        sections.push((h, current_body.trim().to_string()));
    }

    sections.retain(|(_, b)| !is_placeholder_body(b));
    if sections.is_empty() {
        return None;
    }

    // Priority headings first, then the remainder in source order.
    let mut ordered: Vec<&(String, String)> = Vec::new();
    for priority in PRIORITY_SECTIONS {
        if let Some(section) = sections
            .iter()
            .find(|(h, _)| h.to_lowercase() == *priority)
        {
            ordered.push(section);
        }
    }
    for section in &sections {
        if !ordered
            .iter()
            .any(|(h, _)| h == &section.0)
        {
            ordered.push(section);
        }
    }

    let mut out = String::new();
    for (heading, body) in ordered {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("## ");
        out.push_str(heading);
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }
    Some(truncate_chars(&out, max_chars))
}

fn is_placeholder_body(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty()
        || PLACEHOLDER_BODIES.contains(&trimmed)
        || trimmed.starts_with("(see ")
        || trimmed.starts_with("(review ")
}

fn strip_frontmatter(markdown: &str) -> &str {
    let trimmed = markdown.trim_start();
    let Some(rest) = trimmed.strip_prefix("---") else {
        return markdown;
    };
    rest.find("\n---")
        .map_or(markdown, |idx| {
            let after = &rest[idx + 4..];
            after.strip_prefix('\n').unwrap_or(after)
        })
}

fn strip_leading_title(body: &str) -> &str {
    let trimmed = body.trim_start();
    if trimmed.starts_with("# ") {
        trimmed.find('\n').map_or("", |idx| &trimmed[idx + 1..])
    } else {
        body
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

// ==================== Source 2: instance registry ====================

fn try_instance(inputs: &RecoveryInputs) -> Option<RecoveredSession> {
    #[allow(clippy::cast_possible_wrap)]
    let max_age_secs = (inputs.max_age_hours * 3600) as i64;
    let current = inputs.current_session.as_deref().unwrap_or("");
    let descriptor = read_instances(&inputs.instances_dir)
        .into_iter()
        .filter(|d| d.session_id != current)
        .filter(|d| !d.summary.trim().is_empty())
        .find(|d| inputs.now - d.updated <= max_age_secs)?;
    Some(RecoveredSession {
        source: RecoverySource::Instance,
        session_id: Some(descriptor.session_id),
        summary: descriptor.summary,
        first_prompt: None,
        message_count: 0,
        git_branch: String::new(),
        ended_at: format_unix(descriptor.updated),
        handoff_text: String::new(),
    })
}

fn format_unix(unix: i64) -> String {
    chrono::DateTime::from_timestamp(unix, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default()
}

// ==================== Source 3: IDE session index ====================

#[derive(Debug, Deserialize)]
struct SessionIndexEntry {
    #[serde(alias = "sessionId", default)]
    session_id: String,
    #[serde(default)]
    summary: String,
    #[serde(alias = "firstPrompt", default)]
    first_prompt: String,
    #[serde(alias = "messageCount", default)]
    message_count: u32,
    #[serde(alias = "gitBranch", default)]
    git_branch: String,
    #[serde(default)]
    modified: i64,
}

/// FNV-1a over the canonical cwd string; hex-encoded into the index path.
fn cwd_hash(cwd: &Path) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in cwd.to_string_lossy().as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{hash:016x}")
}

fn try_session_index(inputs: &RecoveryInputs) -> Option<RecoveredSession> {
    let home = inputs.home.as_ref()?;
    let path = home
        .join(".claude/projects")
        .join(cwd_hash(&inputs.cwd))
        .join("sessions-index.json");
    if std::fs::metadata(&path).ok()?.len() > SESSION_INDEX_MAX_BYTES {
        return None;
    }
    let text = std::fs::read_to_string(&path).ok()?;
    let mut entries: Vec<SessionIndexEntry> = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| {
            let list = if v.is_array() { v } else { v.get("sessions")?.clone() };
            serde_json::from_value(list).ok()
        })?;

    entries.sort_by(|a, b| b.modified.cmp(&a.modified));
    let current = inputs.current_session.as_deref();
    let entry = entries.into_iter().find(|e| {
        if e.session_id.is_empty() {
            return false;
        }
        match current {
            Some(current) => e.session_id != current,
            // Without a current id, a very fresh entry may be this live
            // session; skip it.
            None => inputs.now - e.modified > SESSION_INDEX_FRESHNESS_SECS,
        }
    })?;

    Some(RecoveredSession {
        source: RecoverySource::SessionIndex,
        session_id: Some(entry.session_id),
        summary: entry.summary,
        first_prompt: (!entry.first_prompt.is_empty()).then_some(entry.first_prompt),
        message_count: entry.message_count,
        git_branch: entry.git_branch,
        ended_at: format_unix(entry.modified),
        handoff_text: String::new(),
    })
}

// ==================== Formatting ====================

/// Formats the recovered session as a bounded orientation block.
#[must_use]
pub fn format_recovery_context(recovered: &RecoveredSession) -> String {
    let header = match recovered.source {
        RecoverySource::None => return String::new(),
        RecoverySource::Handoff => "## Previous Session (full handoff)",
        RecoverySource::Instance => "## Previous Session (instance registry)",
        RecoverySource::SessionIndex => "## Previous Session (IDE session index)",
    };

    let mut out = String::new();
    out.push_str(header);
    out.push('\n');
    if !recovered.summary.is_empty() {
        out.push_str(&format!("Summary: {}\n", recovered.summary));
    }
    if let Some(prompt) = &recovered.first_prompt {
        let truncated = if prompt.chars().count() > FIRST_PROMPT_MAX_CHARS {
            let head: String = prompt.chars().take(FIRST_PROMPT_MAX_CHARS).collect();
            format!("{head}…")
        } else {
            prompt.clone()
        };
        out.push_str(&format!("First prompt: {truncated}\n"));
    }
    if recovered.message_count > 0 {
        out.push_str(&format!("Messages: {}\n", recovered.message_count));
    }
    if !recovered.git_branch.is_empty() {
        out.push_str(&format!("Branch: {}\n", recovered.git_branch));
    }
    if !recovered.ended_at.is_empty() {
        out.push_str(&format!("Ended: {}\n", recovered.ended_at));
    }
    if !recovered.handoff_text.is_empty() {
        out.push('\n');
        out.push_str(&recovered.handoff_text);
    }
    truncate_chars(&out, RECOVERY_BLOCK_MAX_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::instances::{InstanceDescriptor, write_instance};

    const NOW: i64 = 1_753_000_000;

    fn inputs(vault: &Path, instances: &Path) -> RecoveryInputs {
        RecoveryInputs {
            vault: vault.to_path_buf(),
            handoff_dir: "sessions".to_string(),
            max_age_hours: 24,
            instances_dir: instances.to_path_buf(),
            current_session: Some("current".to_string()),
            home: None,
            cwd: PathBuf::from("/work/project"),
            now: NOW,
        }
    }

    fn write_handoff(vault: &Path, name: &str, body: &str) {
        let dir = vault.join("sessions");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), body).unwrap();
    }

    const HANDOFF_BODY: &str = "---\ndate: 2026-07-30\n---\n# Session\n\n## Next Steps\nFinish the planner.\n\n## Summary\nWorked on chunk overlap.\n\n## Open Questions\n(none)\n";

    #[test]
    fn test_handoff_wins_over_instance() {
        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        write_handoff(vault.path(), "2026-07-30-session.md", HANDOFF_BODY);
        write_instance(
            instances.path(),
            &InstanceDescriptor {
                session_id: "peer".to_string(),
                machine: "m".to_string(),
                started: NOW - 1800,
                updated: NOW - 1800,
                summary: "instance summary".to_string(),
                status: "active".to_string(),
            },
        )
        .unwrap();
        let recovered = recover_previous_session(&inputs(vault.path(), instances.path()));
        assert_eq!(recovered.source, RecoverySource::Handoff);
        assert!((recovered.source.completeness() - 1.0).abs() < 1e-9);
        let block = format_recovery_context(&recovered);
        assert!(block.starts_with("## Previous Session (full handoff)"));
    }

    #[test]
    fn test_sections_reordered_and_placeholders_dropped() {
        let body = extract_handoff_sections(HANDOFF_BODY, 2500).unwrap();
        let summary_pos = body.find("## Summary").unwrap();
        let next_pos = body.find("## Next Steps").unwrap();
        assert!(summary_pos < next_pos, "priority order puts Summary first");
        assert!(!body.contains("Open Questions"));
    }

    #[test]
    fn test_placeholder_variants_rejected() {
        for placeholder in ["(none)", "(none recorded)", "(not recorded)", "(see above)", "(review the log)"] {
            let markdown = format!("## Summary\n{placeholder}\n");
            assert!(
                extract_handoff_sections(&markdown, 2500).is_none(),
                "placeholder {placeholder:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_instance_fallback() {
        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        write_instance(
            instances.path(),
            &InstanceDescriptor {
                session_id: "peer".to_string(),
                machine: "m".to_string(),
                started: NOW - 1800,
                updated: NOW - 1800,
                summary: "instance summary".to_string(),
                status: "active".to_string(),
            },
        )
        .unwrap();
        let recovered = recover_previous_session(&inputs(vault.path(), instances.path()));
        assert_eq!(recovered.source, RecoverySource::Instance);
        assert_eq!(recovered.summary, "instance summary");
        assert!((recovered.source.completeness() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_instance_skips_current_and_empty_summary() {
        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        write_instance(
            instances.path(),
            &InstanceDescriptor {
                session_id: "current".to_string(),
                machine: "m".to_string(),
                started: NOW,
                updated: NOW,
                summary: "mine".to_string(),
                status: "active".to_string(),
            },
        )
        .unwrap();
        write_instance(
            instances.path(),
            &InstanceDescriptor {
                session_id: "peer".to_string(),
                machine: "m".to_string(),
                started: NOW,
                updated: NOW,
                summary: "  ".to_string(),
                status: "active".to_string(),
            },
        )
        .unwrap();
        let recovered = recover_previous_session(&inputs(vault.path(), instances.path()));
        assert_eq!(recovered.source, RecoverySource::None);
    }

    #[test]
    fn test_stale_handoff_rejected() {
        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        write_handoff(vault.path(), "2026-01-01-session.md", HANDOFF_BODY);
        // The file's mtime is the wall clock at test time; a synthetic
        // "now" far in the future makes it stale.
        let mut i = inputs(vault.path(), instances.path());
        i.now = 4_000_000_000;
        let recovered = recover_previous_session(&i);
        assert_eq!(recovered.source, RecoverySource::None);
    }

    #[test]
    fn test_traversal_handoff_dir_rejected() {
        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        let mut i = inputs(vault.path(), instances.path());
        i.handoff_dir = "../outside".to_string();
        assert_eq!(
            recover_previous_session(&i).source,
            RecoverySource::None
        );
    }

    #[test]
    fn test_first_prompt_truncated() {
        let recovered = RecoveredSession {
            source: RecoverySource::SessionIndex,
            session_id: Some("s0".to_string()),
            summary: "s".to_string(),
            first_prompt: Some("p".repeat(200)),
            message_count: 3,
            git_branch: "main".to_string(),
            ended_at: String::new(),
            handoff_text: String::new(),
        };
        let block = format_recovery_context(&recovered);
        assert!(block.contains(&format!("{}…", "p".repeat(147))));
        assert!(block.len() <= RECOVERY_BLOCK_MAX_CHARS);
    }

    #[test]
    fn test_session_index_parsing_and_selection() {
        let home = tempfile::tempdir().unwrap();
        let cwd = PathBuf::from("/work/project");
        let dir = home
            .path()
            .join(".claude/projects")
            .join(cwd_hash(&cwd));
        std::fs::create_dir_all(&dir).unwrap();
        let index = serde_json::json!([
            {"sessionId": "current", "summary": "live", "modified": NOW},
            {"sessionId": "older", "summary": "prior work", "firstPrompt": "fix the indexer",
             "messageCount": 12, "gitBranch": "main", "modified": NOW - 4000}
        ]);
        std::fs::write(dir.join("sessions-index.json"), index.to_string()).unwrap();

        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        let mut i = inputs(vault.path(), instances.path());
        i.home = Some(home.path().to_path_buf());
        let recovered = recover_previous_session(&i);
        assert_eq!(recovered.source, RecoverySource::SessionIndex);
        assert_eq!(recovered.session_id.as_deref(), Some("older"));
        assert_eq!(recovered.message_count, 12);
        assert_eq!(recovered.git_branch, "main");
        assert!((recovered.source.completeness() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_completeness_strictly_increases() {
        assert!(RecoverySource::None.completeness() < RecoverySource::SessionIndex.completeness());
        assert!(
            RecoverySource::SessionIndex.completeness() < RecoverySource::Instance.completeness()
        );
        assert!(RecoverySource::Instance.completeness() < RecoverySource::Handoff.completeness());
    }
}
