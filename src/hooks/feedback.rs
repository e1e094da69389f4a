//! feedback-loop handler (Stop).
//!
//! Detects which vault notes the assistant referred to during the session
//! and bumps their access counts. Never injects context.

use crate::hooks::HandlerContext;
use crate::hooks::input::{HookRunResult, RunStatus};
use crate::memory::{detect_references, read_transcript_messages};
use crate::store::NoteStore;
use std::path::Path;

/// Transcript messages read per run.
const TRANSCRIPT_MESSAGE_LIMIT: usize = 200;

/// One-time milestone for the first detected reference.
const MILESTONE_FIRST_REFERENCE: &str = "first-reference";

/// Runs the feedback-loop handler.
pub fn handle(store: &mut dyn NoteStore, ctx: &HandlerContext) -> HookRunResult {
    if ctx.input.transcript_path.is_empty() {
        return HookRunResult::skipped("no transcript");
    }
    let messages = read_transcript_messages(
        Path::new(&ctx.input.transcript_path),
        TRANSCRIPT_MESSAGE_LIMIT,
    );
    let assistant_text: String = messages
        .iter()
        .filter(|m| m.role == "assistant")
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if assistant_text.is_empty() {
        return HookRunResult::empty("no assistant messages");
    }

    let Ok(known) = store.note_refs() else {
        return HookRunResult::empty("store listing failed");
    };
    let referenced = detect_references(&assistant_text, &known);
    if referenced.is_empty() {
        return HookRunResult::empty("no references");
    }

    for path in &referenced {
        let _ = store.increment_access_count(path);
    }

    // One-time tip the first time references are picked up.
    let user_message = match store.milestone_shown(MILESTONE_FIRST_REFERENCE) {
        Ok(false) => {
            let _ = store.record_milestone(MILESTONE_FIRST_REFERENCE);
            Some("same: noting which vault notes this session used".to_string())
        }
        _ => None,
    };

    let mut result = HookRunResult::status_only(RunStatus::Empty);
    result.detail = format!("{} notes referenced", referenced.len());
    result.surfaced = referenced;
    result.user_message = user_message;
    result
}
