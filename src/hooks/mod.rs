//! Hook dispatch runtime.
//!
//! One short-lived process per hook invocation: read bounded stdin, open
//! the store, run the handler in a worker thread raced against a timer,
//! fan out to plugins, write exactly one JSON object to stdout, record one
//! telemetry row, close the store. The store handle outlives the worker on
//! every path, including timeout; the join is the completion latch.

pub mod bootstrap;
pub mod context;
pub mod decisions;
pub mod diag;
pub mod feedback;
pub mod handoff;
pub mod input;
pub mod plugins;
pub mod staleness;

use crate::config::{Config, DisplayMode, data_dir, instances_dir, store_path};
use crate::error::{HookError, Result};
use crate::store::{NoteStore, SqliteNoteStore};
use crate::telemetry::{HookActivityRecord, append_verbose_line};
use input::{HookEvent, HookInput, HookOutput, HookRunResult, MAX_STDIN_SIZE, RunStatus};
use std::io::{Read, Write};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::mpsc::{RecvTimeoutError, sync_channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Overall hook deadline.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Built-in hook names.
pub const HOOK_NAMES: &[&str] = &[
    "context-surfacing",
    "session-bootstrap",
    "staleness-check",
    "decision-extractor",
    "handoff-generator",
    "feedback-loop",
];

/// Hooks run for each event, in order. Configurable upstream; these are
/// the defaults.
#[must_use]
pub fn hooks_for_event(event: HookEvent) -> &'static [&'static str] {
    match event {
        HookEvent::UserPromptSubmit => &["context-surfacing"],
        HookEvent::SessionStart => &["session-bootstrap", "staleness-check"],
        HookEvent::Stop => &["decision-extractor", "handoff-generator", "feedback-loop"],
        _ => &[],
    }
}

/// Default event for a hook when the input does not carry one.
#[must_use]
pub fn default_event_for_hook(hook_name: &str) -> HookEvent {
    match hook_name {
        "context-surfacing" => HookEvent::UserPromptSubmit,
        "session-bootstrap" | "staleness-check" => HookEvent::SessionStart,
        _ => HookEvent::Stop,
    }
}

/// Everything a handler needs besides the store.
pub struct HandlerContext<'a> {
    /// Loaded configuration.
    pub config: &'a Config,
    /// Parsed, transcript-validated hook input.
    pub input: &'a HookInput,
    /// Resolved vault root.
    pub vault: PathBuf,
    /// Instance registry directory.
    pub instances_dir: PathBuf,
    /// Unix seconds now.
    pub now: i64,
}

/// Runs the named built-in handler.
fn dispatch(hook_name: &str, store: &mut dyn NoteStore, ctx: &HandlerContext) -> HookRunResult {
    match hook_name {
        "context-surfacing" => context::handle(store, ctx),
        "session-bootstrap" => bootstrap::handle(store, ctx),
        "staleness-check" => staleness::handle(store, ctx),
        "decision-extractor" => decisions::handle(store, ctx),
        "handoff-generator" => handoff::handle(store, ctx),
        "feedback-loop" => feedback::handle(store, ctx),
        other => {
            let mut result = HookRunResult::status_only(RunStatus::Error);
            result.error_message = HookError::UnknownHook {
                name: other.to_string(),
            }
            .to_string();
            result
        }
    }
}

/// Paths and configuration for one invocation.
pub struct HookRuntime {
    /// Loaded configuration.
    pub config: Config,
    /// Store database path.
    pub store_path: PathBuf,
    /// Data directory (verbose log lives here).
    pub data_dir: PathBuf,
    /// Instance registry directory.
    pub instances_dir: PathBuf,
    /// Unix seconds now.
    pub now: i64,
}

impl HookRuntime {
    /// Builds the runtime from the environment.
    #[must_use]
    pub fn from_env(config: Config) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            config,
            store_path: store_path(),
            data_dir: data_dir(),
            instances_dir: instances_dir(),
            now,
        }
    }
}

/// Outcome of racing the worker against the timer.
enum WorkerOutcome {
    /// Worker returned (join already performed).
    Completed(HookRunResult),
    /// Timer fired first; the caller must join before closing the store.
    TimedOut(std::thread::JoinHandle<()>),
}

/// Spawns the worker and waits for either its result or the deadline.
///
/// A worker panic is caught and converted to an error result; the host
/// still gets valid JSON.
fn race_worker<W>(worker: W, timeout: Duration) -> WorkerOutcome
where
    W: FnOnce() -> HookRunResult + Send + 'static,
{
    let (tx, rx) = sync_channel::<HookRunResult>(1);
    let handle = std::thread::spawn(move || {
        let result = std::panic::catch_unwind(AssertUnwindSafe(worker)).unwrap_or_else(|_| {
            tracing::error!("hook worker panicked");
            let mut result = HookRunResult::status_only(RunStatus::Error);
            result.error_message = HookError::WorkerPanic.to_string();
            result
        });
        let _ = tx.send(result);
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => {
            let _ = handle.join();
            WorkerOutcome::Completed(result)
        }
        Err(RecvTimeoutError::Timeout) => WorkerOutcome::TimedOut(handle),
        Err(RecvTimeoutError::Disconnected) => {
            let _ = handle.join();
            let mut result = HookRunResult::status_only(RunStatus::Error);
            result.error_message = HookError::WorkerPanic.to_string();
            WorkerOutcome::Completed(result)
        }
    }
}

/// Serializes the output, falling back to `{}`; the host treats an empty
/// stream as failure, so something is always written.
fn write_output(out: &mut dyn Write, output: &HookOutput) {
    let json = serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string());
    let _ = out.write_all(json.as_bytes());
    let _ = out.flush();
}

/// Runs one hook invocation end to end.
///
/// # Errors
///
/// Returns an error only for failures before stdin is consumed (unknown
/// hook name). Every later failure degrades to diagnostic output or a
/// silent return, never a crash of the host flow.
pub fn run_hook(
    hook_name: &str,
    runtime: &HookRuntime,
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
) -> Result<()> {
    if !HOOK_NAMES.contains(&hook_name) {
        return Err(HookError::UnknownHook {
            name: hook_name.to_string(),
        }
        .into());
    }

    // 1. Bounded stdin read + parse. Malformed input: silent return.
    let mut raw = Vec::new();
    if stdin.take(MAX_STDIN_SIZE).read_to_end(&mut raw).is_err() {
        return Ok(());
    }
    let Ok(mut hook_input) = serde_json::from_slice::<HookInput>(&raw) else {
        return Ok(());
    };

    // 2. Transcript validation: clear-and-continue.
    if let Some(reason) = input::validate_transcript_path(&mut hook_input) {
        tracing::debug!("transcript path cleared: {reason}");
    }

    let event = if hook_input.hook_event_name.is_empty() {
        default_event_for_hook(hook_name)
    } else {
        HookEvent::parse(&hook_input.hook_event_name)
    };

    // 3. Store open; on failure emit the canned diagnostic and stop (the
    // store is also the telemetry sink, so no row is written).
    let store = match SqliteNoteStore::open(&runtime.store_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("store unavailable: {e}");
            write_output(stdout, &HookOutput::with_context(event, diag::DIAG_NO_DB.to_string()));
            return Ok(());
        }
    };
    let store = Arc::new(Mutex::new(store));

    // 4. Worker raced against the timer.
    let worker_store = Arc::clone(&store);
    let worker_config = runtime.config.clone();
    let worker_input = hook_input.clone();
    let vault = runtime.config.resolved_vault_path();
    let worker_instances = runtime.instances_dir.clone();
    let now = runtime.now;
    let hook_owned = hook_name.to_string();
    let outcome = race_worker(
        move || {
            let mut guard = worker_store
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let ctx = HandlerContext {
                config: &worker_config,
                input: &worker_input,
                vault,
                instances_dir: worker_instances,
                now,
            };
            dispatch(&hook_owned, &mut *guard, &ctx)
        },
        HOOK_TIMEOUT,
    );

    let result = match outcome {
        WorkerOutcome::Completed(result) => result,
        WorkerOutcome::TimedOut(handle) => {
            // Diagnostic out first, then wait for the worker: it may hold
            // a write transaction, and close-before-join would corrupt
            // telemetry or session state.
            write_output(
                stdout,
                &HookOutput::with_context(event, diag::DIAG_TIMEOUT.to_string()),
            );
            let _ = handle.join();
            record_activity(
                &store,
                hook_name,
                &hook_input,
                &HookRunResult {
                    status: RunStatus::Error,
                    output: HookOutput::default(),
                    surfaced: Vec::new(),
                    tokens: 0,
                    detail: String::new(),
                    error_message: "timeout".to_string(),
                    user_message: None,
                },
                runtime.now,
            );
            return Ok(());
        }
    };

    // 5. Plugin fan-out; failures never fail the hook.
    let mut output = result.output.clone();
    if let Some(block) = plugins::run_plugins_for_event(
        &runtime.config.plugins,
        event.as_str(),
        &raw,
        HOOK_TIMEOUT,
    ) {
        output.append_context(event, &block);
    }

    // 6. Pending one-line status for the user.
    if runtime.config.display.mode != DisplayMode::Quiet
        && let Some(message) = &result.user_message
    {
        match &mut output.system_message {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(message);
            }
            None => output.system_message = Some(message.clone()),
        }
    }

    // 7. Always valid JSON on stdout.
    write_output(stdout, &output);

    // 8. Telemetry after all worker activity, before close.
    record_activity(&store, hook_name, &hook_input, &result, runtime.now);

    if runtime.config.display.mode == DisplayMode::Verbose {
        append_verbose_line(
            &runtime.data_dir.join("verbose.log"),
            &format!(
                "{} {} status={} notes={} tokens={}",
                runtime.now,
                hook_name,
                result.status.as_str(),
                result.surfaced.len(),
                result.tokens,
            ),
        );
    }

    drop(store);
    Ok(())
}

/// Inserts the single activity row for this invocation.
fn record_activity(
    store: &Arc<Mutex<SqliteNoteStore>>,
    hook_name: &str,
    hook_input: &HookInput,
    result: &HookRunResult,
    now: i64,
) {
    #[allow(clippy::cast_possible_truncation)]
    let record = HookActivityRecord {
        timestamp: now,
        session_id: hook_input.session_id.clone(),
        hook_name: hook_name.to_string(),
        status: result.status.as_str().to_string(),
        surfaced_notes: result.surfaced.len() as u32,
        estimated_tokens: result.tokens as u32,
        error_message: result.error_message.clone(),
        detail: result.detail.clone(),
        note_paths: result.surfaced.clone(),
    };
    let mut guard = store.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = guard.insert_hook_activity(&record) {
        tracing::warn!("telemetry insert failed: {e}");
    }
}
