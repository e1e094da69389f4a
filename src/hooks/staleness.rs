//! staleness-check handler (SessionStart).

use crate::hooks::HandlerContext;
use crate::hooks::input::{HookEvent, HookOutput, HookRunResult, RunStatus};
use crate::store::NoteStore;

/// How many stale notes to surface.
const STALE_LIMIT: usize = 5;

/// Runs the staleness-check handler.
pub fn handle(store: &mut dyn NoteStore, ctx: &HandlerContext) -> HookRunResult {
    let stale = match store.stale_notes(STALE_LIMIT, ctx.now) {
        Ok(stale) => stale,
        Err(_) => return HookRunResult::empty("stale query failed"),
    };
    if stale.is_empty() {
        return HookRunResult::empty("no stale notes");
    }

    let mut block = String::from("<vault-staleness>\nNotes that may need a refresh:\n");
    for note in &stale {
        block.push_str(&format!("- {} ({})\n", note.title, note.path));
    }
    block.push_str("</vault-staleness>");
    let tokens = crate::memory::estimate_tokens(&block);

    HookRunResult {
        status: RunStatus::Injected,
        output: HookOutput::with_context(HookEvent::SessionStart, block),
        surfaced: stale.into_iter().map(|n| n.path).collect(),
        tokens,
        detail: String::new(),
        error_message: String::new(),
        user_message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hooks::input::HookInput;
    use crate::store::{NoteMeta, SqliteNoteStore};
    use std::path::PathBuf;

    const NOW: i64 = 1_753_000_000;

    fn ctx<'a>(config: &'a Config, input: &'a HookInput) -> HandlerContext<'a> {
        HandlerContext {
            config,
            input,
            vault: PathBuf::new(),
            instances_dir: PathBuf::new(),
            now: NOW,
        }
    }

    #[test]
    fn test_no_stale_notes() {
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = HookInput::default();
        let result = handle(&mut store, &ctx(&config, &input));
        assert_eq!(result.status, RunStatus::Empty);
    }

    #[test]
    fn test_stale_block_as_system_message() {
        let mut store = SqliteNoteStore::in_memory().unwrap();
        store
            .upsert_note(&NoteMeta {
                path: "old/ideas.md".to_string(),
                title: "Old Ideas".to_string(),
                content_type: "note".to_string(),
                confidence: 0.2,
                modified: NOW - 90 * 86_400,
                tags: Vec::new(),
                pinned: false,
            })
            .unwrap();
        let config = Config::default();
        let input = HookInput::default();
        let result = handle(&mut store, &ctx(&config, &input));
        assert_eq!(result.status, RunStatus::Injected);
        let message = result.output.system_message.unwrap();
        assert!(message.starts_with("<vault-staleness>"));
        assert!(message.contains("old/ideas.md"));
        assert!(result.output.hook_specific_output.is_none());
    }
}
