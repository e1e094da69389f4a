//! CLI layer.
//!
//! The binary is deliberately thin: hooks are the product, and the few
//! maintenance commands defer to the library.

use crate::config::{Config, store_path};
use crate::error::Result;
use crate::hooks::{HOOK_NAMES, HookRuntime, run_hook};
use crate::store::{NoteStore, SqliteNoteStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SAME-RS: Stateless Agent Memory Engine for Claude Code.
///
/// A hook process that surfaces persistent vault context on agent
/// lifecycle events.
#[derive(Parser, Debug)]
#[command(name = "same-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vault index database.
    ///
    /// Defaults to `same.db` inside the data directory.
    #[arg(short, long, env = "SAME_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a hook: read event JSON from stdin, write hook output JSON.
    Hook {
        /// Hook name (e.g. context-surfacing, session-bootstrap).
        name: String,
    },

    /// Initialize the vault index database.
    Init,

    /// Show index statistics.
    Status,
}

/// Executes a parsed CLI invocation.
///
/// The `hook` command writes its JSON to stdout itself and returns an
/// empty string; maintenance commands return their report.
///
/// # Errors
///
/// Returns an error for unknown hooks or store failures.
pub fn execute(cli: &Cli) -> Result<String> {
    let config = Config::load();
    let db_path = cli.db_path.clone().unwrap_or_else(store_path);

    match &cli.command {
        Commands::Hook { name } => {
            let mut runtime = HookRuntime::from_env(config);
            runtime.store_path = db_path;
            let mut stdin = std::io::stdin().lock();
            let mut stdout = std::io::stdout().lock();
            run_hook(name, &runtime, &mut stdin, &mut stdout)?;
            Ok(String::new())
        }
        Commands::Init => {
            let store = SqliteNoteStore::open(&db_path)?;
            let stats = store.stats()?;
            Ok(format!(
                "initialized {} (schema v{})\n",
                db_path.display(),
                stats.schema_version
            ))
        }
        Commands::Status => {
            let store = SqliteNoteStore::open(&db_path)?;
            let stats = store.stats()?;
            Ok(format!(
                "notes: {}\nchunks: {} ({} embedded)\nhook runs: {}\nschema: v{}\n",
                stats.note_count,
                stats.chunk_count,
                stats.embedded_count,
                stats.activity_count,
                stats.schema_version
            ))
        }
    }
}

/// Known hook names, for shell completion and validation messages.
#[must_use]
pub fn hook_names() -> &'static [&'static str] {
    HOOK_NAMES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_hook_command() {
        let cli = Cli::try_parse_from(["same-rs", "hook", "context-surfacing"]).unwrap();
        match cli.command {
            Commands::Hook { ref name } => assert_eq!(name, "context-surfacing"),
            _ => panic!("expected hook command"),
        }
    }

    #[test]
    fn test_cli_parses_db_path_flag() {
        let cli = Cli::try_parse_from(["same-rs", "--db-path", "/tmp/x.db", "status"]).unwrap();
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_cli_rejects_missing_subcommand() {
        assert!(Cli::try_parse_from(["same-rs"]).is_err());
    }

    #[test]
    fn test_hook_names_exposed() {
        assert!(hook_names().contains(&"context-surfacing"));
    }
}
