//! Configuration for the SAME hook runtime.
//!
//! Loaded from `same.toml` in the data directory when present, with every
//! section falling back to defaults. A handful of environment variables
//! override the file: `SAME_QUIET`, `SAME_COMPACT`, `VAULT_PATH`,
//! `SAME_DATA_DIR`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How much the hook prints to stderr for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// No user-facing output at all.
    Quiet,
    /// One-line status per hook.
    Compact,
    /// Status plus per-note echo and the styled verbose log.
    Verbose,
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Retrieval and ranking options.
    pub memory: MemoryConfig,
    /// Handoff note recovery options.
    pub handoff: HandoffConfig,
    /// Vault location.
    pub vault: VaultConfig,
    /// Noise-path exclusions.
    pub noise: NoiseConfig,
    /// User-facing display options.
    pub display: DisplayConfig,
    /// Embedding provider selection.
    pub embedding: EmbeddingConfig,
    /// Ollama endpoint, used when `embedding.provider = "ollama"`.
    pub ollama: OllamaConfig,
    /// External plugin commands, fanned out per event.
    #[serde(rename = "plugin")]
    pub plugins: Vec<PluginEntry>,
}

/// Retrieval and ranking options (`[memory]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum notes surfaced per injection.
    pub max_results: usize,
    /// Maximum acceptable best L2 distance before the vector mode is
    /// considered empty.
    pub distance_threshold: f64,
    /// Minimum composite score for a candidate to survive.
    pub composite_threshold: f64,
    /// Token budget for the packed context block.
    pub max_token_budget: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            distance_threshold: 16.2,
            composite_threshold: 0.6,
            max_token_budget: 2000,
        }
    }
}

/// Handoff recovery options (`[handoff]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Maximum handoff age in hours before it is considered stale.
    pub max_age_hours: u64,
    /// Vault-relative directory holding handoff notes.
    pub directory: String,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            directory: "sessions".to_string(),
        }
    }
}

/// Vault location (`[vault]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Absolute path to the note vault (supports `~` expansion).
    pub path: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: "~/vault".to_string(),
        }
    }
}

/// Noise-path exclusions (`[noise]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Vault-relative prefixes whose notes are never surfaced.
    pub paths: Vec<String>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            paths: vec!["experiments/".to_string()],
        }
    }
}

/// Display options (`[display]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Output mode for user-facing stderr lines.
    pub mode: DisplayMode,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Compact,
        }
    }
}

/// Embedding provider selection (`[embedding]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: `ollama`, `openai`, or `hash`.
    pub provider: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// API key for OpenAI-compatible providers.
    pub api_key: String,
    /// Expected embedding dimensions.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: String::new(),
            dimensions: 768,
        }
    }
}

/// Ollama endpoint (`[ollama]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    pub url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
        }
    }
}

/// One external plugin command (`[[plugin]]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PluginEntry {
    /// Plugin name, used in logs and error rows.
    pub name: String,
    /// Executable: absolute path or bare command resolved via PATH.
    pub command: String,
    /// Arguments passed verbatim (after validation).
    pub args: Vec<String>,
    /// Hook event this plugin subscribes to (e.g. `UserPromptSubmit`).
    pub event: String,
    /// Whether the plugin runs at all.
    pub enabled: bool,
    /// Per-plugin timeout in seconds, bounded by the hook timeout.
    pub timeout_secs: u64,
}

impl Default for PluginEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            command: String::new(),
            args: Vec::new(),
            event: String::new(),
            enabled: false,
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Loads configuration from `<data_dir>/same.toml`, falling back to
    /// defaults on a missing or unreadable file, then applies environment
    /// overrides.
    #[must_use]
    pub fn load() -> Self {
        let path = data_dir().join("same.toml");
        let mut config = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| toml::from_str(&text).ok())
            .unwrap_or_default();
        apply_env_overrides(&mut config);
        config
    }

    /// Parses configuration from a TOML string (used by tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(text: &str) -> crate::Result<Self> {
        toml::from_str(text).map_err(|e| crate::Error::Config {
            message: e.to_string(),
        })
    }

    /// Resolves the vault path, expanding `~`.
    #[must_use]
    pub fn resolved_vault_path(&self) -> PathBuf {
        expand_tilde(&self.vault.path)
    }
}

/// Applies `SAME_QUIET` / `SAME_COMPACT` / `VAULT_PATH` overrides.
fn apply_env_overrides(config: &mut Config) {
    if env_flag("SAME_QUIET") {
        config.display.mode = DisplayMode::Quiet;
    } else if env_flag("SAME_COMPACT") {
        config.display.mode = DisplayMode::Compact;
    }
    if let Ok(path) = std::env::var("VAULT_PATH")
        && !path.trim().is_empty()
    {
        config.vault.path = path;
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Returns the SAME data directory.
///
/// `SAME_DATA_DIR` wins; otherwise `~/.same`. Falls back to the current
/// directory when no home can be determined.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SAME_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".same")
}

/// Returns the default store path inside the data directory.
#[must_use]
pub fn store_path() -> PathBuf {
    data_dir().join("same.db")
}

/// Returns the instances registry directory (sibling of the data dir
/// contents, one JSON file per live session).
#[must_use]
pub fn instances_dir() -> PathBuf {
    data_dir().join("instances")
}

/// Expands a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    PathBuf::from(path)
}

/// Returns true when `candidate` stays inside `root` after normalization.
///
/// Rejects absolute candidates and any `..` traversal. Used wherever a
/// configured vault-relative path (handoff directory, decision log) is
/// joined onto the vault root.
#[must_use]
pub fn stays_within(root: &Path, candidate: &str) -> bool {
    let candidate = Path::new(candidate);
    if candidate.is_absolute() {
        return false;
    }
    let mut depth: i32 = 0;
    for component in candidate.components() {
        match component {
            std::path::Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            std::path::Component::Normal(_) => depth += 1,
            _ => {}
        }
    }
    root.join(candidate).starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.memory.max_results, 5);
        assert!((config.memory.distance_threshold - 16.2).abs() < f64::EPSILON);
        assert!((config.memory.composite_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.handoff.max_age_hours, 24);
        assert_eq!(config.handoff.directory, "sessions");
        assert_eq!(config.display.mode, DisplayMode::Compact);
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml(
            r#"
            [memory]
            max_results = 3

            [display]
            mode = "verbose"

            [[plugin]]
            name = "linker"
            command = "/usr/local/bin/same-linker"
            event = "UserPromptSubmit"
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.memory.max_results, 3);
        // Unset fields keep defaults
        assert!((config.memory.composite_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.display.mode, DisplayMode::Verbose);
        assert_eq!(config.plugins.len(), 1);
        assert!(config.plugins[0].enabled);
        assert_eq!(config.plugins[0].timeout_secs, 10);
    }

    #[test]
    fn test_from_toml_malformed() {
        assert!(Config::from_toml("[memory\nmax_results = ").is_err());
    }

    #[test]
    fn test_stays_within() {
        let root = Path::new("/home/user/vault");
        assert!(stays_within(root, "sessions"));
        assert!(stays_within(root, "notes/decisions.md"));
        assert!(stays_within(root, "a/../b"));
        assert!(!stays_within(root, "../outside"));
        assert!(!stays_within(root, "a/../../outside"));
        assert!(!stays_within(root, "/etc/passwd"));
    }

    #[test]
    fn test_expand_tilde_passthrough() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("rel/path"), PathBuf::from("rel/path"));
    }
}
