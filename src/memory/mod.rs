//! Memory collaborator surface used by the hook handlers.
//!
//! Token estimation, transcript reading, reference detection, decision
//! extraction, and handoff generation. The heuristics here are modest on
//! purpose; the pipeline's quality lives in the planner and scorer, not in
//! these extractors.

use crate::error::{IoError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Rough token estimate: ceil(chars / 4).
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// One transcript message.
#[derive(Debug, Clone)]
pub struct TranscriptMessage {
    /// `user` or `assistant`.
    pub role: String,
    /// Concatenated text content.
    pub text: String,
}

/// Reads up to `max` messages from a Claude Code transcript (JSONL).
///
/// Tolerant by construction: unparseable lines are skipped, content may be
/// a plain string or an array of text blocks.
#[must_use]
pub fn read_transcript_messages(path: &Path, max: usize) -> Vec<TranscriptMessage> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for line in text.lines() {
        if out.len() >= max {
            break;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        let role = match value["type"].as_str() {
            Some(role @ ("user" | "assistant")) => role.to_string(),
            _ => continue,
        };
        let content = &value["message"]["content"];
        let text = if let Some(s) = content.as_str() {
            s.to_string()
        } else if let Some(blocks) = content.as_array() {
            blocks
                .iter()
                .filter(|b| b["type"].as_str() == Some("text"))
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            continue;
        };
        if !text.trim().is_empty() {
            out.push(TranscriptMessage { role, text });
        }
    }
    out
}

// ==================== Reference detection ====================

#[allow(clippy::unwrap_used)]
fn wiki_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[([^\[\]]{1,120})\]\]").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn md_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_./-]+\.md\b").unwrap()
    })
}

/// Detects which known notes a text refers to.
///
/// Matches `[[wiki links]]` against titles and path stems, and `*.md`
/// mentions against paths. Returns matched paths, deduped, in order of
/// first mention.
#[must_use]
pub fn detect_references(text: &str, known: &[(String, String)]) -> Vec<String> {
    // known: (path, title) pairs.
    let mut out: Vec<String> = Vec::new();
    let mut push = |path: &str| {
        if !out.iter().any(|p| p == path) {
            out.push(path.to_string());
        }
    };

    for cap in wiki_link_re().captures_iter(text) {
        let name = cap[1].trim().to_lowercase();
        for (path, title) in known {
            let stem = path
                .rsplit_once('/')
                .map_or(path.as_str(), |(_, f)| f)
                .trim_end_matches(".md")
                .to_lowercase();
            if title.to_lowercase() == name || stem == name {
                push(path);
            }
        }
    }

    for m in md_path_re().find_iter(text) {
        let mention = m.as_str().trim_start_matches("./");
        for (path, _) in known {
            if path == mention || path.ends_with(&format!("/{mention}")) {
                push(path);
            }
        }
    }

    out
}

// ==================== Decision extraction ====================

/// Maximum decisions extracted per run.
const MAX_DECISIONS: usize = 20;

/// Maximum length of one extracted decision line.
const MAX_DECISION_CHARS: usize = 200;

#[allow(clippy::unwrap_used)]
fn decision_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(decided to|decision:|going with|we'll use|we will use|settled on|agreed to|conclusion:)\s",
        )
        .unwrap()
    })
}

/// Extracts one-line decisions from assistant messages.
///
/// Lines matching decision phrasing are trimmed to a single sentence-ish
/// line, deduped by their first 100 characters, capped at 20.
#[must_use]
pub fn extract_decisions(messages: &[TranscriptMessage]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for message in messages {
        if message.role != "assistant" {
            continue;
        }
        for line in message.text.lines() {
            if out.len() >= MAX_DECISIONS {
                return out;
            }
            let trimmed = line.trim().trim_start_matches(['-', '*', ' ']);
            if trimmed.is_empty() || !decision_re().is_match(trimmed) {
                continue;
            }
            let mut decision: String = trimmed.chars().take(MAX_DECISION_CHARS).collect();
            decision = decision.trim().to_string();
            let key: String = decision.chars().take(100).collect::<String>().to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            out.push(decision);
        }
    }
    out
}

// ==================== Handoff generation ====================

/// Result of an auto-handoff run.
#[derive(Debug, Clone)]
pub struct HandoffResult {
    /// Vault-relative path of the written handoff.
    pub path: String,
    /// True when this run overwrote an existing handoff for the session.
    pub updated: bool,
}

/// Generates a handoff note from the transcript and writes it into the
/// handoff directory (date-prefixed filename).
///
/// # Errors
///
/// Returns an error if the handoff directory escapes the vault or the
/// write fails.
pub fn auto_handoff_from_transcript(
    vault: &Path,
    handoff_dir: &str,
    session_id: &str,
    messages: &[TranscriptMessage],
    now_unix: i64,
) -> Result<HandoffResult> {
    if !crate::config::stays_within(vault, handoff_dir) {
        return Err(IoError::PathTraversal {
            path: handoff_dir.to_string(),
        }
        .into());
    }
    let dir = vault.join(handoff_dir);
    std::fs::create_dir_all(&dir)?;

    let date = chrono::DateTime::from_timestamp(now_unix, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    let stem: String = session_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(16)
        .collect();
    let filename = format!("{date}-{stem}.md");
    let path = dir.join(&filename);
    let updated = path.exists();

    let first_prompt = messages
        .iter()
        .find(|m| m.role == "user")
        .map_or(String::new(), |m| {
            m.text.chars().take(200).collect::<String>()
        });
    let decisions = extract_decisions(messages);

    let mut body = String::new();
    body.push_str(&format!("# Session Handoff {date}\n\n"));
    body.push_str("## Summary\n");
    if first_prompt.is_empty() {
        body.push_str("(none recorded)\n");
    } else {
        body.push_str(&format!(
            "Session opened with: {first_prompt}\n{} messages exchanged.\n",
            messages.len()
        ));
    }
    body.push_str("\n## Decisions\n");
    if decisions.is_empty() {
        body.push_str("(none recorded)\n");
    } else {
        for decision in &decisions {
            body.push_str(&format!("- {decision}\n"));
        }
    }
    body.push_str("\n## Next Steps\n(none recorded)\n");

    std::fs::write(&path, body).map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(HandoffResult {
        path: PathBuf::from(handoff_dir)
            .join(filename)
            .to_string_lossy()
            .into_owned(),
        updated,
    })
}
