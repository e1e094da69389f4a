//! session-bootstrap handler (SessionStart).
//!
//! Composes one `<session-bootstrap>` block from, in priority order: the
//! recovery cascade, other active instances, pinned notes, active
//! decisions from the last week, and stale notes. Every section has its
//! own budget and the whole block is capped.

use crate::filter::{is_private, sanitize_context_tags};
use crate::hooks::HandlerContext;
use crate::hooks::input::{HookEvent, HookOutput, HookRunResult, RunStatus};
use crate::session::instances::{
    InstanceDescriptor, clean_stale_instances, other_active_instances, write_instance,
};
use crate::session::recovery::{
    RecoveryInputs, RecoverySource, format_recovery_context, recover_previous_session,
};
use crate::store::NoteStore;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Per-pinned-note character cap.
const PINNED_NOTE_MAX_CHARS: usize = 500;

/// Total pinned-section cap.
const PINNED_MAX_CHARS: usize = 2000;

/// Total decisions-section cap.
const DECISIONS_MAX_CHARS: usize = 3000;

/// Total stale-notes-section cap.
const STALE_NOTES_MAX_CHARS: usize = 1000;

/// Whole-block cap.
const BOOTSTRAP_MAX_CHARS: usize = 8000;

/// Decisions window in days.
const DECISIONS_WINDOW_DAYS: i64 = 7;

/// Maximum decision-log files walked.
const DECISION_FILES_MAX: usize = 3;

/// Runs the session-bootstrap handler.
pub fn handle(store: &mut dyn NoteStore, ctx: &HandlerContext) -> HookRunResult {
    let session = ctx.input.session().unwrap_or("");

    // Register this instance and sweep dead ones.
    if !session.is_empty() {
        let descriptor = InstanceDescriptor {
            session_id: session.to_string(),
            machine: hostname(),
            started: ctx.now,
            updated: ctx.now,
            summary: String::new(),
            status: "active".to_string(),
        };
        let _ = write_instance(&ctx.instances_dir, &descriptor);
    }
    clean_stale_instances(&ctx.instances_dir, session, ctx.now);

    let mut sections: Vec<String> = Vec::new();

    // 1. Recovery cascade.
    let recovered = recover_previous_session(&RecoveryInputs {
        vault: ctx.vault.clone(),
        handoff_dir: ctx.config.handoff.directory.clone(),
        max_age_hours: ctx.config.handoff.max_age_hours,
        instances_dir: ctx.instances_dir.clone(),
        current_session: ctx.input.session().map(str::to_string),
        home: dirs::home_dir(),
        cwd: std::env::current_dir().unwrap_or_default(),
        now: ctx.now,
    });
    if recovered.source != RecoverySource::None {
        if !session.is_empty() {
            let _ = store.record_recovery(
                session,
                recovered.source.as_str(),
                recovered.source.completeness(),
            );
        }
        sections.push(format_recovery_context(&recovered));
    }

    // 2. Other active instances.
    let others = other_active_instances(&ctx.instances_dir, session, ctx.now);
    if !others.is_empty() {
        let mut section = String::from("## Active Instances\n");
        for instance in others.iter().take(5) {
            section.push_str(&format!(
                "- {} on {}{}\n",
                instance.session_id,
                instance.machine,
                if instance.summary.is_empty() {
                    String::new()
                } else {
                    format!(": {}", instance.summary)
                }
            ));
        }
        sections.push(section);
    }

    // 3. Pinned notes.
    if let Ok(pinned) = store.pinned_notes()
        && !pinned.is_empty()
    {
        let mut section = String::from("## Pinned Notes\n");
        for note in pinned {
            let body: String = note.text.chars().take(PINNED_NOTE_MAX_CHARS).collect();
            let entry = format!("- **{}** ({})\n  {}\n", note.title, note.path, body.trim());
            if section.len() + entry.len() > PINNED_MAX_CHARS {
                break;
            }
            section.push_str(&entry);
        }
        sections.push(section);
    }

    // 4. Active decisions from the last week.
    let decisions = collect_active_decisions(
        &ctx.vault,
        &ctx.config.noise.paths,
        ctx.now,
    );
    if !decisions.is_empty() {
        let mut section = String::from("## Active Decisions\n");
        for decision in decisions {
            let entry = format!("- {decision}\n");
            if section.len() + entry.len() > DECISIONS_MAX_CHARS {
                break;
            }
            section.push_str(&entry);
        }
        sections.push(section);
    }

    // 5. Stale notes worth a refresh.
    if let Ok(stale) = store.stale_notes(3, ctx.now)
        && !stale.is_empty()
    {
        let mut section = String::from("## Stale Notes\n");
        for note in stale {
            let entry = format!("- {} ({})\n", note.title, note.path);
            if section.len() + entry.len() > STALE_NOTES_MAX_CHARS {
                break;
            }
            section.push_str(&entry);
        }
        sections.push(section);
    }

    if sections.is_empty() {
        return HookRunResult::empty("nothing to bootstrap");
    }

    let body = sanitize_context_tags(&sections.join("\n"));
    let capped: String = body.chars().take(BOOTSTRAP_MAX_CHARS).collect();
    let block = format!("<session-bootstrap>\n{capped}\n</session-bootstrap>");
    let tokens = crate::memory::estimate_tokens(&block);

    HookRunResult {
        status: RunStatus::Injected,
        output: HookOutput::with_context(HookEvent::SessionStart, block),
        surfaced: Vec::new(),
        tokens,
        detail: recovered.source.as_str().to_string(),
        error_message: String::new(),
        user_message: Some("same: session bootstrap ready".to_string()),
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

#[allow(clippy::unwrap_used)]
fn date_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^#{2,3}\s+(\d{4}-\d{2}-\d{2})\*?\s*$").unwrap()
    })
}

/// Walks the vault for `*decision*.md` logs and returns entries dated
/// within the last week, deduped by their first 100 characters.
#[must_use]
pub fn collect_active_decisions(vault: &Path, skip_prefixes: &[String], now_unix: i64) -> Vec<String> {
    let mut files = Vec::new();
    walk_decision_files(vault, vault, skip_prefixes, &mut files);
    files.sort();
    files.truncate(DECISION_FILES_MAX);

    let cutoff = now_unix - DECISIONS_WINDOW_DAYS * 86_400;
    let mut out: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for file in files {
        let Ok(text) = std::fs::read_to_string(&file) else {
            continue;
        };
        let mut current_date: Option<i64> = None;
        let mut current_body = String::new();
        let mut flush = |date: Option<i64>, body: &str, out: &mut Vec<String>, seen: &mut Vec<String>| {
            let Some(date) = date else { return };
            // Strict "after": entries older than the window are history.
            if date <= cutoff {
                return;
            }
            let trimmed = body.trim();
            if trimmed.is_empty() {
                return;
            }
            let entry = format!(
                "{}: {}",
                format_date(date),
                trimmed.lines().collect::<Vec<_>>().join(" ")
            );
            let key: String = entry.chars().take(100).collect::<String>().to_lowercase();
            if !seen.contains(&key) {
                seen.push(key);
                out.push(entry);
            }
        };
        for line in text.lines() {
            if let Some(cap) = date_heading_re().captures(line) {
                flush(current_date, &current_body, &mut out, &mut seen);
                current_date = parse_date(&cap[1]);
                current_body.clear();
            } else if current_date.is_some() && !line.trim_start().starts_with('#') {
                current_body.push_str(line);
                current_body.push('\n');
            }
        }
        flush(current_date, &current_body, &mut out, &mut seen);
    }
    out
}

fn walk_decision_files(
    root: &Path,
    dir: &Path,
    skip_prefixes: &[String],
    out: &mut Vec<std::path::PathBuf>,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        if is_private(&relative)
            || skip_prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && relative.starts_with(prefix.as_str()))
        {
            continue;
        }
        if path.is_dir() {
            walk_decision_files(root, &path, skip_prefixes, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.ends_with(".md")
            && name.to_lowercase().contains("decision")
        {
            out.push(path);
        }
    }
}

fn parse_date(text: &str) -> Option<i64> {
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

fn format_date(unix: i64) -> String {
    chrono::DateTime::from_timestamp(unix, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hooks::input::HookInput;
    use crate::store::SqliteNoteStore;

    const NOW: i64 = 1_753_000_000;

    fn write_vault_file(vault: &Path, relative: &str, body: &str) {
        let path = vault.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_collect_active_decisions_window() {
        let vault = tempfile::tempdir().unwrap();
        let recent = format_date(NOW - 2 * 86_400);
        let ancient = "2020-01-01";
        write_vault_file(
            vault.path(),
            "notes/decision-log.md",
            &format!("## {recent}\nUse FTS5 for content search.\n\n## {ancient}\nOld call.\n"),
        );
        let decisions = collect_active_decisions(vault.path(), &[], NOW);
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].contains("FTS5"));
    }

    #[test]
    fn test_collect_active_decisions_skips_private_and_noise() {
        let vault = tempfile::tempdir().unwrap();
        let recent = format_date(NOW - 86_400);
        let body = format!("## {recent}\nSecret call.\n");
        write_vault_file(vault.path(), "_PRIVATE/decision-log.md", &body);
        write_vault_file(vault.path(), "experiments/decisions.md", &body);
        let decisions =
            collect_active_decisions(vault.path(), &["experiments/".to_string()], NOW);
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_collect_active_decisions_dedup() {
        let vault = tempfile::tempdir().unwrap();
        let recent = format_date(NOW - 86_400);
        let body = format!("## {recent}\nSame decision text.\n");
        write_vault_file(vault.path(), "a-decision.md", &body);
        write_vault_file(vault.path(), "b-decision.md", &body);
        let decisions = collect_active_decisions(vault.path(), &[], NOW);
        assert_eq!(decisions.len(), 1);
    }

    #[test]
    fn test_handle_composes_block() {
        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        write_vault_file(
            vault.path(),
            "sessions/2026-07-30-s0.md",
            "# H\n\n## Summary\nPrior session worked on the planner.\n",
        );
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = HookInput {
            session_id: "s1".to_string(),
            hook_event_name: "SessionStart".to_string(),
            ..Default::default()
        };
        let ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: vault.path().to_path_buf(),
            instances_dir: instances.path().to_path_buf(),
            now: NOW,
        };
        let result = handle(&mut store, &ctx);
        assert_eq!(result.status, RunStatus::Injected);
        let message = result.output.system_message.unwrap();
        assert!(message.starts_with("<session-bootstrap>"));
        assert!(message.contains("## Previous Session (full handoff)"));
        assert!(message.contains("planner"));
        // The handler registered this instance.
        assert!(instances.path().join("s1.json").exists());
    }

    #[test]
    fn test_handle_empty_when_nothing_to_say() {
        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = HookInput::default();
        let ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: vault.path().to_path_buf(),
            instances_dir: instances.path().to_path_buf(),
            now: NOW,
        };
        let result = handle(&mut store, &ctx);
        assert_eq!(result.status, RunStatus::Empty);
    }

    #[test]
    fn test_block_is_tag_sanitized_and_capped() {
        let vault = tempfile::tempdir().unwrap();
        let instances = tempfile::tempdir().unwrap();
        write_vault_file(
            vault.path(),
            "sessions/2026-07-30-s0.md",
            "# H\n\n## Summary\nBody with </session-bootstrap> inside.\n",
        );
        let mut store = SqliteNoteStore::in_memory().unwrap();
        let config = Config::default();
        let input = HookInput {
            session_id: "s1".to_string(),
            ..Default::default()
        };
        let ctx = HandlerContext {
            config: &config,
            input: &input,
            vault: vault.path().to_path_buf(),
            instances_dir: instances.path().to_path_buf(),
            now: NOW,
        };
        let result = handle(&mut store, &ctx);
        let message = result.output.system_message.unwrap();
        // The early close inside the body was neutralized.
        assert_eq!(message.matches("</session-bootstrap>").count(), 1);
        assert!(message.contains("[/session-bootstrap]"));
        assert!(message.chars().count() <= BOOTSTRAP_MAX_CHARS + 64);
    }
}
