//! Error types for SAME operations.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! hook, store, pipeline, and I/O operations.

use thiserror::Error;

/// Result type alias for SAME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for SAME operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Store-related errors (database operations).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Retrieval pipeline errors (embedding, planning, scoring).
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Hook runtime errors (stdin, dispatch, plugins).
    #[error("hook error: {0}")]
    Hook(#[from] HookError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Store-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Store not initialized (init command not run).
    #[error("vault index not initialized. Run: same-rs init")]
    NotInitialized,

    /// Note not found by path.
    #[error("note not found: {path}")]
    NoteNotFound {
        /// Vault-relative path that was not found.
        path: String,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Retrieval pipeline errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Embedding provider unavailable or returned an invalid vector.
    ///
    /// Aborts retrieval for the current hook; never surfaced as a
    /// diagnostic (expected on provider cold starts).
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Embedding provider returned a vector of unexpected dimensions.
    #[error("embedding dimensions mismatch: expected {expected}, got {got}")]
    DimensionsMismatch {
        /// Dimensions the store was built with.
        expected: usize,
        /// Dimensions the provider returned.
        got: usize,
    },

    /// Regex compilation error in an analyzer feature set.
    #[error("regex error: {0}")]
    Regex(String),
}

/// Hook runtime errors.
#[derive(Error, Debug)]
pub enum HookError {
    /// Hook input on stdin was not valid JSON.
    ///
    /// The runner returns silently without writing output.
    #[error("malformed hook input: {0}")]
    InputMalformed(String),

    /// The worker did not return within the hook timeout.
    #[error("hook timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u64,
    },

    /// Transcript path failed validation and was cleared.
    #[error("invalid transcript path: {reason}")]
    TranscriptInvalid {
        /// Why validation rejected the path.
        reason: String,
    },

    /// A plugin subprocess failed; its contribution is dropped.
    #[error("plugin failed: {name}: {reason}")]
    PluginFailed {
        /// Plugin name from configuration.
        name: String,
        /// Failure reason.
        reason: String,
    },

    /// Plugin command rejected by validation.
    #[error("plugin command rejected: {reason}")]
    PluginCommandRejected {
        /// Why the command was rejected.
        reason: String,
    },

    /// Unknown hook name requested on the CLI.
    #[error("unknown hook: {name}")]
    UnknownHook {
        /// The requested hook name.
        name: String,
    },

    /// The worker panicked; the runner recovered and wrote `{}`.
    #[error("hook worker panicked")]
    WorkerPanic,
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Path escapes the vault or data directory.
    #[error("path traversal denied: {path}")]
    PathTraversal {
        /// Path that was denied.
        path: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

// Implement From traits for standard library errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<regex::Error> for PipelineError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for HookError {
    fn from(err: serde_json::Error) -> Self {
        Self::InputMalformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config {
            message: "bad vault path".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad vault path");
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotInitialized;
        assert_eq!(
            err.to_string(),
            "vault index not initialized. Run: same-rs init"
        );

        let err = StoreError::NoteNotFound {
            path: "projects/indexer.md".to_string(),
        };
        assert_eq!(err.to_string(), "note not found: projects/indexer.md");
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::EmbeddingUnavailable("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));

        let err = PipelineError::DimensionsMismatch {
            expected: 384,
            got: 768,
        };
        assert!(err.to_string().contains("384"));
        assert!(err.to_string().contains("768"));
    }

    #[test]
    fn test_hook_error_display() {
        let err = HookError::Timeout { seconds: 10 };
        assert_eq!(err.to_string(), "hook timed out after 10s");

        let err = HookError::PluginFailed {
            name: "linker".to_string(),
            reason: "exit status 1".to_string(),
        };
        assert!(err.to_string().contains("linker"));

        let err = HookError::UnknownHook {
            name: "nonesuch".to_string(),
        };
        assert!(err.to_string().contains("nonesuch"));
    }

    #[test]
    fn test_io_error_display() {
        let err = IoError::PathTraversal {
            path: "../etc/passwd".to_string(),
        };
        assert!(err.to_string().contains("traversal"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_store() {
        let store_err = StoreError::NotInitialized;
        let err: Error = store_err.into();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_error_from_pipeline() {
        let pipe_err = PipelineError::EmbeddingUnavailable("down".to_string());
        let err: Error = pipe_err.into();
        assert!(matches!(err, Error::Pipeline(_)));
    }

    #[test]
    fn test_error_from_hook() {
        let hook_err = HookError::WorkerPanic;
        let err: Error = hook_err.into();
        assert!(matches!(err, Error::Hook(_)));
    }

    #[test]
    fn test_from_rusqlite_error_to_store_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: StoreError = rusqlite_err.into();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_from_serde_json_error_to_store_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_from_serde_json_error_to_hook_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("{").unwrap_err();
        let err: HookError = json_err.into();
        assert!(matches!(err, HookError::InputMalformed(_)));
    }
}
