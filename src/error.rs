//! Domain-specific error types for rsapt.
//!
//! This module defines `RsaptError`, a `thiserror`-based enum that
//! provides typed error variants for common failure modes. Public API
//! functions return `Result<T, RsaptError>` for programmatic error
//! handling, while trait boundaries continue to use `anyhow::Result`.
//!
//! `RsaptError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at trait boundaries that return `anyhow::Result`.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message
/// directly (e.g., "I/O error: connection refused").
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for rsapt.
///
/// Provides typed variants for common failure modes, enabling callers
/// to match on error kinds programmatically rather than parsing error
/// message strings.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RsaptError {
    /// A package source specification could not be applied.
    #[error("source configuration error: {0}")]
    SourceConfig(String),

    /// A GPG key could not be imported.
    #[error("GPG key error: {0}")]
    GpgKey(String),

    /// A command execution failed (non-zero exit, spawn failure, wait failure, etc.).
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command that was executed.
        command: String,
        /// Human-readable reason for the failure: exit code, signal information,
        /// or a description of the internal error (e.g., thread spawn failure).
        status: String,
    },

    /// A command binary was not found in PATH.
    #[error("command not found in PATH: {command}")]
    CommandNotFound {
        /// The command that could not be resolved.
        command: String,
    },

    /// A validation constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A configuration file could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred.
        ///
        /// This is either a file path (e.g., `"/etc/apt/sources.list.d/proposed.list"`)
        /// or an operation description with a path (e.g., `"failed to read
        /// metadata: /path/to/file"`). Combined with `message` in the Display
        /// format: `"{context}: {message}"`.
        context: String,
        /// Human-readable description of the I/O failure, derived from
        /// [`io_error_kind_message`] for consistent formatting across the codebase.
        message: String,
        /// The underlying I/O error, preserved for programmatic inspection
        /// (e.g., `source.kind() == ErrorKind::NotFound`).
        #[source]
        source: std::io::Error,
    },
}

impl RsaptError {
    /// Creates an `Io` variant with the `message` field automatically derived
    /// from the `source` via [`io_error_kind_message`].
    ///
    /// This is the preferred way to construct `Io` errors, ensuring that
    /// the `message` field is always consistent with the `source`.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }
}
