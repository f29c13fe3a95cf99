//! Error types for kvwal
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for kvwal operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error on {}: {source}", path.display())]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("failed to encode command: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode command: {0}")]
    Decode(#[source] bincode::Error),

    #[error("invalid state: {0}")]
    State(&'static str),

    #[error("WAL flush failed: {0}")]
    Flush(#[source] Arc<KvError>),

    #[error("operation cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Attach a path to an I/O error
    pub fn path_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KvError::PathIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error (or the flush error it wraps) is a `State` error
    pub fn is_state(&self) -> bool {
        match self {
            KvError::State(_) => true,
            KvError::Flush(inner) => inner.is_state(),
            _ => false,
        }
    }
}
