//! handoff-generator handler (Stop).
//!
//! Debounced per session. The first successful handoff announces itself;
//! later runs silently overwrite the same file.

use crate::hooks::HandlerContext;
use crate::hooks::input::{HookEvent, HookOutput, HookRunResult, RunStatus};
use crate::memory::{auto_handoff_from_transcript, read_transcript_messages};
use crate::session::{KEY_HANDOFF_CREATED, stop_hook_debounce};
use crate::store::NoteStore;
use std::path::Path;

/// Transcript messages read per run.
const TRANSCRIPT_MESSAGE_LIMIT: usize = 200;

/// Runs the handoff-generator handler.
pub fn handle(store: &mut dyn NoteStore, ctx: &HandlerContext) -> HookRunResult {
    let Some(session) = ctx.input.session() else {
        return HookRunResult::skipped("no session id");
    };
    if stop_hook_debounce(store, session, "handoff-generator", ctx.now) {
        return HookRunResult::skipped("cooldown");
    }
    if ctx.input.transcript_path.is_empty() {
        return HookRunResult::skipped("no transcript");
    }

    let messages = read_transcript_messages(
        Path::new(&ctx.input.transcript_path),
        TRANSCRIPT_MESSAGE_LIMIT,
    );
    if messages.is_empty() {
        return HookRunResult::empty("empty transcript");
    }

    let handoff = match auto_handoff_from_transcript(
        &ctx.vault,
        &ctx.config.handoff.directory,
        session,
        &messages,
        ctx.now,
    ) {
        Ok(handoff) => handoff,
        Err(e) => {
            let mut result = HookRunResult::status_only(RunStatus::Error);
            result.error_message = e.to_string();
            return result;
        }
    };

    let first_for_session = store
        .session_state_get(session, KEY_HANDOFF_CREATED)
        .ok()
        .flatten()
        .is_none();
    let _ = store.session_state_set(session, KEY_HANDOFF_CREATED, &handoff.path);

    if !first_for_session || handoff.updated {
        let mut result = HookRunResult::empty("handoff updated");
        result.detail = "handoff updated".to_string();
        return result;
    }

    let block = format!(
        "<vault-handoff>\nHandoff written: {} (session {session})\n</vault-handoff>",
        handoff.path
    );
    HookRunResult {
        status: RunStatus::Injected,
        output: HookOutput::with_context(HookEvent::Stop, block),
        surfaced: vec![handoff.path.clone()],
        tokens: 0,
        detail: String::new(),
        error_message: String::new(),
        user_message: Some(format!("same: handoff saved to {}", handoff.path)),
    }
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
        std::fs::write(
            &path,
            r#"{"type":"user","message":{"content":"work on the planner"}}"#,
        )
        .unwrap();
        path.display().to_string()
    }

    fn make_input(transcript_path: String) -> HookInput {
        HookInput {
            transcript_path,
            session_id: "s1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_run_announces_then_debounces() {
        let dir = tempfile::tempdir().unwrap();
        let vault = tempfile::tempdir().unwrap();
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = make_input(transcript(dir.path()));
        let ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: vault.path().to_path_buf(),
            instances_dir: std::path::PathBuf::new(),
            now: NOW,
        };
        let result = handle(&mut store, &ctx);
        assert_eq!(result.status, RunStatus::Injected);
        assert!(result.user_message.unwrap().contains("handoff saved"));
        let message = result.output.system_message.unwrap();
        assert!(message.starts_with("<vault-handoff>"));
        assert!(message.contains("session s1"));

        // Immediately after: the cooldown short-circuits.
        let again = handle(&mut store, &ctx);
        assert_eq!(again.status, RunStatus::Skipped);
        assert_eq!(again.detail, "cooldown");
    }

    #[test]
    fn test_second_generation_is_silent_update() {
        let dir = tempfile::tempdir().unwrap();
        let vault = tempfile::tempdir().unwrap();
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = make_input(transcript(dir.path()));
        let first_ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: vault.path().to_path_buf(),
            instances_dir: std::path::PathBuf::new(),
            now: NOW,
        };
        assert_eq!(handle(&mut store, &first_ctx).status, RunStatus::Injected);

        // Past the cooldown, same session: silent overwrite.
        let later_ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: vault.path().to_path_buf(),
            instances_dir: std::path::PathBuf::new(),
            now: NOW + 400,
        };
        let result = handle(&mut store, &later_ctx);
        assert_eq!(result.status, RunStatus::Empty);
        assert_eq!(result.detail, "handoff updated");
        assert!(result.user_message.is_none());
    }

    #[test]
    fn test_no_session_skips() {
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
}
