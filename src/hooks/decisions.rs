//! decision-extractor handler (Stop).
//!
//! Reads the transcript, extracts one-line decisions, records them in the
//! store, and appends them to a decision log inside the vault.

use crate::config::stays_within;
use crate::hooks::HandlerContext;
use crate::hooks::input::{HookEvent, HookOutput, HookRunResult, RunStatus};
use crate::memory::{extract_decisions, read_transcript_messages};
use crate::store::{DecisionRow, NoteStore};
use std::path::Path;

/// Transcript messages read per run.
const TRANSCRIPT_MESSAGE_LIMIT: usize = 200;

/// Vault-relative decision log path.
const DECISION_LOG_PATH: &str = "decisions/decision-log.md";

/// Runs the decision-extractor handler.
pub fn handle(store: &mut dyn NoteStore, ctx: &HandlerContext) -> HookRunResult {
    if ctx.input.transcript_path.is_empty() {
        return HookRunResult::skipped("no transcript");
    }
    let messages = read_transcript_messages(
        Path::new(&ctx.input.transcript_path),
        TRANSCRIPT_MESSAGE_LIMIT,
    );
    let decisions = extract_decisions(&messages);
    if decisions.is_empty() {
        return HookRunResult::empty("no decisions found");
    }

    let session = ctx.input.session().unwrap_or("").to_string();
    for decision in &decisions {
        let _ = store.insert_decision(&DecisionRow {
            session_id: session.clone(),
            content: decision.clone(),
            created_at: ctx.now,
        });
    }

    if let Err(e) = append_to_decision_log(&ctx.vault, &decisions, ctx.now) {
        tracing::warn!("decision log append failed: {e}");
    }

    let mut block = format!(
        "<vault-decisions>\nRecorded {} decision(s) from this session:\n",
        decisions.len()
    );
    for decision in &decisions {
        block.push_str(&format!("- {decision}\n"));
    }
    block.push_str("</vault-decisions>");
    let tokens = crate::memory::estimate_tokens(&block);

    HookRunResult {
        status: RunStatus::Injected,
        output: HookOutput::with_context(HookEvent::Stop, block),
        surfaced: Vec::new(),
        tokens,
        detail: format!("{} decisions", decisions.len()),
        error_message: String::new(),
        user_message: Some(format!("same: recorded {} decision(s)", decisions.len())),
    }
}

/// Appends dated entries to the vault decision log.
fn append_to_decision_log(vault: &Path, decisions: &[String], now_unix: i64) -> crate::Result<()> {
    if !stays_within(vault, DECISION_LOG_PATH) {
        return Err(crate::error::IoError::PathTraversal {
            path: DECISION_LOG_PATH.to_string(),
        }
        .into());
    }
    let path = vault.join(DECISION_LOG_PATH);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let date = chrono::DateTime::from_timestamp(now_unix, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let mut entry = format!("\n## {date}\n");
    for decision in decisions {
        entry.push_str(&format!("- {decision}\n"));
    }
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    file.write_all(entry.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hooks::input::HookInput;
    use crate::store::SqliteNoteStore;

    const NOW: i64 = 1_753_000_000;

    fn transcript(dir: &Path) -> String {
        let path = dir.join("t.jsonl");
        let lines = [
            r#"{"type":"user","message":{"content":"pick a search backend"}}"#,
            r#"{"type":"assistant","message":{"content":"Decided to use FTS5 for content search."}}"#,
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_no_transcript_skips() {
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = HookInput::default();
        let ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: std::path::PathBuf::new(),
            instances_dir: std::path::PathBuf::new(),
            now: NOW,
        };
        assert_eq!(handle(&mut store, &ctx).status, RunStatus::Skipped);
    }

    #[test]
    fn test_extracts_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let vault = tempfile::tempdir().unwrap();
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = HookInput {
            transcript_path: transcript(dir.path()),
            session_id: "s1".to_string(),
            ..Default::default()
        };
        let ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: vault.path().to_path_buf(),
            instances_dir: std::path::PathBuf::new(),
            now: NOW,
        };
        let result = handle(&mut store, &ctx);
        assert_eq!(result.status, RunStatus::Injected);
        let message = result.output.system_message.unwrap();
        assert!(message.starts_with("<vault-decisions>"));
        assert!(message.contains("FTS5"));

        let log = std::fs::read_to_string(vault.path().join(DECISION_LOG_PATH)).unwrap();
        assert!(log.contains("FTS5"));
        assert!(log.contains("## "));
    }

    #[test]
    fn test_no_decisions_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        std::fs::write(
            &path,
            r#"{"type":"assistant","message":{"content":"Just chatting, nothing firm."}}"#,
        )
        .unwrap();
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = HookInput {
            transcript_path: path.display().to_string(),
            ..Default::default()
        };
        let ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: std::path::PathBuf::new(),
            instances_dir: std::path::PathBuf::new(),
            now: NOW,
        };
        assert_eq!(handle(&mut store, &ctx).status, RunStatus::Empty);
    }
}
