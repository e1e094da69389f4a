//! Hook I/O types: stdin input, stdout output, transcript validation.

use crate::error::{HookError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Maximum bytes read from stdin.
pub const MAX_STDIN_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum transcript file size accepted.
pub const MAX_TRANSCRIPT_SIZE: u64 = 50 * 1024 * 1024;

/// Hook lifecycle events the host emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// User submitted a prompt.
    UserPromptSubmit,
    /// Agent turn finished.
    Stop,
    /// Session started or resumed.
    SessionStart,
    /// Before a tool call.
    PreToolUse,
    /// After a tool call.
    PostToolUse,
    /// Anything else; treated like Stop for output routing.
    Other,
}

impl HookEvent {
    /// Parses the host's event name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "UserPromptSubmit" => Self::UserPromptSubmit,
            "Stop" => Self::Stop,
            "SessionStart" => Self::SessionStart,
            "PreToolUse" => Self::PreToolUse,
            "PostToolUse" => Self::PostToolUse,
            _ => Self::Other,
        }
    }

    /// The wire name of the event.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::Stop => "Stop",
            Self::SessionStart => "SessionStart",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::Other => "Other",
        }
    }

    /// Whether the host accepts `hookSpecificOutput.additionalContext` for
    /// this event. Everything else routes through `systemMessage`.
    #[must_use]
    pub fn allows_additional_context(self) -> bool {
        matches!(
            self,
            Self::UserPromptSubmit | Self::PreToolUse | Self::PostToolUse
        )
    }
}

/// Parsed hook input. snake_case is authoritative; camelCase accepted for
/// compatibility.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    /// The user's prompt (UserPromptSubmit).
    #[serde(default)]
    pub prompt: Option<String>,
    /// Absolute path to the session transcript JSONL.
    #[serde(default, alias = "transcriptPath")]
    pub transcript_path: String,
    /// Session id.
    #[serde(default, alias = "sessionId")]
    pub session_id: String,
    /// Event name from the host.
    #[serde(default, alias = "hookEventName")]
    pub hook_event_name: String,
}

impl HookInput {
    /// Session id as an option, empty string mapped to `None`.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        let trimmed = self.session_id.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Reads and parses hook input from a bounded stdin stream.
///
/// # Errors
///
/// Returns [`HookError::InputMalformed`] on read or parse failure; the
/// runner returns silently in that case.
pub fn read_hook_input(reader: &mut dyn Read) -> Result<HookInput> {
    let mut buffer = String::new();
    reader
        .take(MAX_STDIN_SIZE)
        .read_to_string(&mut buffer)
        .map_err(|e| HookError::InputMalformed(e.to_string()))?;
    let input = serde_json::from_str(&buffer).map_err(HookError::from)?;
    Ok(input)
}

/// Validates the transcript path in place.
///
/// On any failure the field is cleared and the reason returned; the
/// handler continues with a reduced view.
pub fn validate_transcript_path(input: &mut HookInput) -> Option<String> {
    if input.transcript_path.is_empty() {
        return None;
    }
    let reason = transcript_problem(Path::new(&input.transcript_path));
    if reason.is_some() {
        input.transcript_path.clear();
    }
    reason
}

fn transcript_problem(path: &Path) -> Option<String> {
    if !path.is_absolute() {
        return Some("not absolute".to_string());
    }
    if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
        return Some("not a .jsonl file".to_string());
    }
    let Ok(meta) = std::fs::metadata(path) else {
        return Some("not readable".to_string());
    };
    if !meta.is_file() {
        return Some("not a regular file".to_string());
    }
    if meta.len() > MAX_TRANSCRIPT_SIZE {
        return Some(format!("larger than {MAX_TRANSCRIPT_SIZE} bytes"));
    }
    None
}

/// Event-specific payload for UserPromptSubmit / PreToolUse / PostToolUse.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    /// Echo of the event name.
    pub hook_event_name: String,
    /// Context injected into the agent's next turn.
    pub additional_context: String,
}

/// Hook output written to stdout. `{}` is a valid no-op response; an empty
/// stream is not.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    /// Present only for events that accept additional context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
    /// User-visible message; also the context channel for Stop and
    /// SessionStart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

impl HookOutput {
    /// Routes `context` into the correct field for `event`.
    #[must_use]
    pub fn with_context(event: HookEvent, context: String) -> Self {
        if event.allows_additional_context() {
            Self {
                hook_specific_output: Some(HookSpecificOutput {
                    hook_event_name: event.as_str().to_string(),
                    additional_context: context,
                }),
                system_message: None,
            }
        } else {
            Self {
                hook_specific_output: None,
                system_message: Some(context),
            }
        }
    }

    /// Appends more context to whichever field is in use (or routes fresh).
    pub fn append_context(&mut self, event: HookEvent, context: &str) {
        if context.is_empty() {
            return;
        }
        if event.allows_additional_context() {
            match &mut self.hook_specific_output {
                Some(existing) => {
                    existing.additional_context.push('\n');
                    existing.additional_context.push_str(context);
                }
                None => {
                    self.hook_specific_output = Some(HookSpecificOutput {
                        hook_event_name: event.as_str().to_string(),
                        additional_context: context.to_string(),
                    });
                }
            }
        } else {
            match &mut self.system_message {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(context);
                }
                None => self.system_message = Some(context.to_string()),
            }
        }
    }
}

/// Normalized handler outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Context was injected.
    Injected,
    /// A gate decided not to run retrieval.
    Skipped,
    /// Ran but produced nothing.
    Empty,
    /// Something failed.
    Error,
}

impl RunStatus {
    /// Telemetry name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Injected => "injected",
            Self::Skipped => "skipped",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

/// Result a handler hands back to the runner.
#[derive(Debug, Clone)]
pub struct HookRunResult {
    /// Outcome status.
    pub status: RunStatus,
    /// Output to serialize (merged with plugin output).
    pub output: HookOutput,
    /// Paths of surfaced notes.
    pub surfaced: Vec<String>,
    /// Estimated injected tokens.
    pub tokens: usize,
    /// Telemetry detail.
    pub detail: String,
    /// Short error text for telemetry.
    pub error_message: String,
    /// One-line user-visible status for non-quiet display modes.
    pub user_message: Option<String>,
}

impl HookRunResult {
    /// A result with the given status and no output.
    #[must_use]
    pub fn status_only(status: RunStatus) -> Self {
        Self {
            status,
            output: HookOutput::default(),
            surfaced: Vec::new(),
            tokens: 0,
            detail: String::new(),
            error_message: String::new(),
            user_message: None,
        }
    }

    /// A skipped result with a telemetry detail.
    #[must_use]
    pub fn skipped(detail: &str) -> Self {
        let mut result = Self::status_only(RunStatus::Skipped);
        result.detail = detail.to_string();
        result
    }

    /// An empty result with a telemetry detail.
    #[must_use]
    pub fn empty(detail: &str) -> Self {
        let mut result = Self::status_only(RunStatus::Empty);
        result.detail = detail.to_string();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_snake_and_camel() {
        let snake: HookInput = serde_json::from_str(
            r#"{"prompt":"p","transcript_path":"/t.jsonl","session_id":"s","hook_event_name":"Stop"}"#,
        )
        .unwrap();
        assert_eq!(snake.session(), Some("s"));
        assert_eq!(snake.hook_event_name, "Stop");

        let camel: HookInput = serde_json::from_str(
            r#"{"sessionId":"s2","hookEventName":"SessionStart"}"#,
        )
        .unwrap();
        assert_eq!(camel.session(), Some("s2"));
        assert_eq!(camel.hook_event_name, "SessionStart");
    }

    #[test]
    fn test_read_hook_input_rejects_garbage() {
        let mut cursor = std::io::Cursor::new(b"not json".to_vec());
        assert!(read_hook_input(&mut cursor).is_err());
    }

    #[test]
    fn test_read_hook_input_empty_object() {
        let mut cursor = std::io::Cursor::new(b"{}".to_vec());
        let input = read_hook_input(&mut cursor).unwrap();
        assert!(input.prompt.is_none());
        assert_eq!(input.session(), None);
    }

    #[test]
    fn test_transcript_validation_relative_rejected() {
        let mut input = HookInput {
            transcript_path: "relative/t.jsonl".to_string(),
            ..Default::default()
        };
        assert!(validate_transcript_path(&mut input).is_some());
        assert!(input.transcript_path.is_empty());
    }

    #[test]
    fn test_transcript_validation_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, "x").unwrap();
        let mut input = HookInput {
            transcript_path: path.display().to_string(),
            ..Default::default()
        };
        assert!(validate_transcript_path(&mut input).is_some());
    }

    #[test]
    fn test_transcript_validation_size_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        std::fs::write(&path, "x").unwrap();
        let mut input = HookInput {
            transcript_path: path.display().to_string(),
            ..Default::default()
        };
        // A small real file passes and the field survives.
        assert!(validate_transcript_path(&mut input).is_none());
        assert!(!input.transcript_path.is_empty());
    }

    #[test]
    fn test_output_routing_by_event() {
        let output = HookOutput::with_context(HookEvent::UserPromptSubmit, "ctx".to_string());
        assert!(output.hook_specific_output.is_some());
        assert!(output.system_message.is_none());

        let output = HookOutput::with_context(HookEvent::SessionStart, "ctx".to_string());
        assert!(output.hook_specific_output.is_none());
        assert_eq!(output.system_message.as_deref(), Some("ctx"));
    }

    #[test]
    fn test_output_serialization_camel_case() {
        let output = HookOutput::with_context(HookEvent::UserPromptSubmit, "ctx".to_string());
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("hookSpecificOutput"));
        assert!(json.contains("hookEventName"));
        assert!(json.contains("additionalContext"));
        assert!(!json.contains("system_message"));
    }

    #[test]
    fn test_empty_output_serializes_to_empty_object() {
        let json = serde_json::to_string(&HookOutput::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_append_context() {
        let mut output = HookOutput::with_context(HookEvent::Stop, "a".to_string());
        output.append_context(HookEvent::Stop, "b");
        assert_eq!(output.system_message.as_deref(), Some("a\nb"));
        output.append_context(HookEvent::Stop, "");
        assert_eq!(output.system_message.as_deref(), Some("a\nb"));
    }

    #[test]
    fn test_event_parse_roundtrip() {
        for name in ["UserPromptSubmit", "Stop", "SessionStart", "PreToolUse", "PostToolUse"] {
            assert_eq!(HookEvent::parse(name).as_str(), name);
        }
        assert_eq!(HookEvent::parse("SomethingNew"), HookEvent::Other);
    }
}
