//! src/error.rs
//! ============================================================================
//! # `AppError`: Unified Error Type for the Scan/Search Worker
//!
//! This module defines the error enum used across the crate. Each variant
//! carries enough context for diagnostics, and all fallible operations return
//! `Result<T, AppError>`. Cancellation is deliberately *not* represented here:
//! a cancelled operation is reported through the `cancelled` flag on its
//! terminal [`Response`](crate::system::Response), never as an error.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Unified error type for all worker operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Standard IO error, auto-converted from `io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error retrieving file or directory metadata.
    #[error("Filesystem metadata error on {path:?}: {source}")]
    FsMetadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Requested file or directory does not exist or cannot be resolved.
    #[error("File or directory not found: {0:?}")]
    NotFound(PathBuf),

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Config file I/O error with path.
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// External process/command failure (e.g. ripgrep).
    #[error("External command failed: {cmd} (exit code: {code:?})\n{stderr}")]
    ExternalCmd {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },

    /// No usable external engine installed for a content query.
    #[error("Command unavailable: {0}")]
    CommandUnavailable(String),

    /// Search operation specific errors.
    #[error("Search failed in {path:?}: {reason}")]
    SearchFailed { path: PathBuf, reason: String },

    /// Input validation errors.
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    /// Request channel is full; the caller should retry or drop.
    #[error("Worker channel full, request not accepted")]
    ChannelFull,

    /// Worker is gone; the request channel is closed.
    #[error("Worker channel closed")]
    ChannelClosed,

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl AppError {
    #[must_use]
    /// Attach extra context to an error.
    pub fn with_context<S: Into<String>>(self, ctx: S) -> Self {
        Self::Other(format!("{}: {}", ctx.into(), self))
    }

    /// Create a search failure error.
    pub fn search_failed<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::SearchFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an input validation error.
    pub fn invalid_input<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a command-unavailable error.
    pub fn command_unavailable<S: Into<String>>(cmd: S) -> Self {
        Self::CommandUnavailable(cmd.into())
    }

    /// Create a metadata error bound to a path.
    pub fn fs_metadata<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::FsMetadata {
            path: path.into(),
            source,
        }
    }
}

// Manual Clone implementation to handle non-Clone fields. Responses carry an
// optional AppError and the UI may clone them freely.
impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
            Self::FsMetadata { path, source } => Self::FsMetadata {
                path: path.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            },
            Self::NotFound(path) => Self::NotFound(path.clone()),
            Self::Config(e) => Self::Other(format!("Config error: {e}")),
            Self::ConfigIo { path, source } => Self::ConfigIo {
                path: path.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            },
            Self::ExternalCmd { cmd, code, stderr } => Self::ExternalCmd {
                cmd: cmd.clone(),
                code: *code,
                stderr: stderr.clone(),
            },
            Self::CommandUnavailable(cmd) => Self::CommandUnavailable(cmd.clone()),
            Self::SearchFailed { path, reason } => Self::SearchFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::InvalidInput { field, message } => Self::InvalidInput {
                field: field.clone(),
                message: message.clone(),
            },
            Self::ChannelFull => Self::ChannelFull,
            Self::ChannelClosed => Self::ChannelClosed,
            Self::Other(msg) => Self::Other(msg.clone()),
        }
    }
}

// Allow conversion from `anyhow::Error` as fallback.
impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e.to_string())
    }
}
