//! External plugin execution.
//!
//! Each enabled plugin subscribed to the current event runs in its own
//! subprocess with the raw hook input on stdin. Plugin failures never fail
//! the hook; their contribution is simply dropped.

use crate::config::PluginEntry;
use crate::error::{HookError, Result};
use crate::filter::sanitize_context_tags;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Cap on a plugin's stdout.
pub const MAX_PLUGIN_OUTPUT: usize = 1024 * 1024;

/// Poll interval while waiting for a plugin to exit.
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Shell metacharacters rejected anywhere in a command or argument.
const SHELL_METACHARACTERS: &[char] = &[
    ';', '|', '&', '$', '`', '!', '(', ')', '{', '}', '<', '>', '\\', '\n', '\r',
];

fn has_forbidden_chars(text: &str) -> bool {
    text.contains('\0') || text.chars().any(|c| SHELL_METACHARACTERS.contains(&c))
}

fn has_parent_segment(text: &str) -> bool {
    Path::new(text)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Validates a plugin command and resolves it to an executable path.
///
/// # Errors
///
/// Returns [`HookError::PluginCommandRejected`] for an empty command,
/// shell metacharacters or null bytes anywhere, `..` segments, a relative
/// command containing a path separator, or a command that does not resolve
/// to an executable regular file.
pub fn validate_plugin_command(entry: &PluginEntry) -> Result<PathBuf> {
    let command = entry.command.trim();
    if command.is_empty() {
        return Err(reject("empty command"));
    }
    if has_forbidden_chars(command) || has_parent_segment(command) {
        return Err(reject("command contains forbidden characters"));
    }
    for arg in &entry.args {
        if has_forbidden_chars(arg) || has_parent_segment(arg) {
            return Err(reject("argument contains forbidden characters"));
        }
    }

    let path = Path::new(command);
    if path.is_absolute() {
        return check_executable(path).map(Path::to_path_buf);
    }
    if command.contains('/') {
        return Err(reject("relative command must not contain path separators"));
    }
    resolve_via_path(command).ok_or_else(|| reject("command not found on PATH"))
}

fn reject(reason: &str) -> crate::Error {
    HookError::PluginCommandRejected {
        reason: reason.to_string(),
    }
    .into()
}

fn check_executable(path: &Path) -> Result<&Path> {
    let Ok(meta) = std::fs::metadata(path) else {
        return Err(reject("command does not exist"));
    };
    if !meta.is_file() {
        return Err(reject("command is not a regular file"));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(reject("command is not executable"));
        }
    }
    Ok(path)
}

fn resolve_via_path(command: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(command);
        if check_executable(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

/// Runs one plugin and returns its raw stdout (capped at 1 MiB).
///
/// stderr is inherited so plugin diagnostics reach the user. Callers
/// extract the context field and sanitize before merging.
///
/// # Errors
///
/// Returns [`HookError::PluginFailed`] on spawn failure, a timeout kill,
/// or a non-zero exit. Callers log and drop the contribution.
pub fn run_plugin(
    entry: &PluginEntry,
    input_bytes: &[u8],
    max_duration: Duration,
) -> Result<String> {
    let executable = validate_plugin_command(entry)?;

    let mut child = Command::new(&executable)
        .args(&entry.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| failed(entry, &e.to_string()))?;

    // Feed stdin from a thread so a non-reading plugin cannot deadlock us.
    if let Some(mut stdin) = child.stdin.take() {
        let bytes = input_bytes.to_vec();
        std::thread::spawn(move || {
            use std::io::Write;
            let _ = stdin.write_all(&bytes);
        });
    }

    // Drain stdout on a thread, capped.
    let stdout = child.stdout.take();
    let reader = std::thread::spawn(move || -> Vec<u8> {
        let Some(stdout) = stdout else {
            return Vec::new();
        };
        let mut buffer = Vec::new();
        let _ = stdout
            .take(MAX_PLUGIN_OUTPUT as u64)
            .read_to_end(&mut buffer);
        buffer
    });

    let deadline = Instant::now() + max_duration;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(failed(entry, "timed out"));
                }
                std::thread::sleep(WAIT_POLL);
            }
            Err(e) => return Err(failed(entry, &e.to_string())),
        }
    };

    let stdout_bytes = reader.join().unwrap_or_default();
    if !status.success() {
        return Err(failed(entry, &format!("exit status {status}")));
    }

    Ok(String::from_utf8_lossy(&stdout_bytes).into_owned())
}

fn failed(entry: &PluginEntry, reason: &str) -> crate::Error {
    HookError::PluginFailed {
        name: entry.name.clone(),
        reason: reason.to_string(),
    }
    .into()
}

/// Parses a plugin's stdout as hook output and extracts the context field;
/// returns the trimmed literal stdout otherwise.
#[must_use]
pub fn plugin_context_from_stdout(stdout: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout) {
        for context in [
            &value["hookSpecificOutput"]["additionalContext"],
            &value["additionalContext"],
            &value["additional_context"],
        ] {
            if let Some(text) = context.as_str() {
                return text.to_string();
            }
        }
    }
    stdout.trim().to_string()
}

/// Runs every enabled plugin subscribed to `event` and returns the merged,
/// tag-sanitized `<plugin-context>` block. Failures are logged and skipped.
#[must_use]
pub fn run_plugins_for_event(
    plugins: &[PluginEntry],
    event: &str,
    input_bytes: &[u8],
    hook_deadline: Duration,
) -> Option<String> {
    let mut contributions = Vec::new();
    for entry in plugins {
        if !entry.enabled || entry.event != event {
            continue;
        }
        let per_plugin = Duration::from_secs(entry.timeout_secs.max(1)).min(hook_deadline);
        match run_plugin(entry, input_bytes, per_plugin) {
            Ok(raw) => {
                let context = sanitize_context_tags(&plugin_context_from_stdout(&raw));
                if !context.trim().is_empty() {
                    contributions.push(context.trim().to_string());
                }
            }
            Err(e) => {
                tracing::warn!(plugin = %entry.name, "plugin dropped: {e}");
            }
        }
    }
    if contributions.is_empty() {
        return None;
    }
    Some(format!(
        "<plugin-context>\n{}\n</plugin-context>",
        contributions.join("\n---\n")
    ))
}
