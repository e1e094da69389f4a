//! # SAME-RS
//!
//! Stateless Agent Memory Engine for Claude Code.
//!
//! SAME-RS is a short-lived hook process that augments a coding agent with
//! persistent, cross-session context drawn from a local note vault. On
//! each lifecycle event (prompt submit, session start, session stop) it
//! reads event data from stdin, consults the vault index, and emits
//! structured context for the host to inject into its next turn.
//!
//! ## Features
//!
//! - **Multi-mode retrieval**: dense-vector, title/path keyword, full-text
//!   content, fuzzy title, and recency-biased hybrid search
//! - **Composite ranking**: semantic + recency + confidence scoring with
//!   title-overlap tiering and near-deduplication
//! - **Bounded runtime**: worker/timer race, diagnostic fallbacks, and a
//!   session-recovery cascade
//! - **Defense in depth**: private-path exclusion, prompt-injection
//!   filtering, and structural-tag neutralization

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod memory;
pub mod query;
pub mod score;
pub mod search;
pub mod session;
pub mod store;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use store::{Note, NoteStore, RawSearchResult, SqliteNoteStore};

// Re-export pipeline types
pub use query::{PromptMode, QueryAnalysis};
pub use search::{PackedResults, RecencyPlanner, ScoredCandidate, SearchOptions, StandardPlanner};

// Re-export hook runtime types
pub use hooks::input::{HookEvent, HookInput, HookOutput, HookRunResult, RunStatus};
pub use hooks::{HOOK_NAMES, HOOK_TIMEOUT, HookRuntime, run_hook};

// Re-export embedding types
pub use embedding::{HashEmbedder, QueryEmbedder, create_embedder};

// Re-export configuration
pub use config::{Config, DisplayMode};
