//! Error type shared by the filesystem layer and the store clients.

use std::io;
use thiserror::Error;

/// Failures surfaced by path translation, metadata resolution and the
/// bulk rename/delete engines.
///
/// `NotFound` doubles as the "already gone" signal inside bulk traversals:
/// callers walking a listing catch it per entry instead of failing the
/// whole operation.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("operation failed: {0}")]
    OperationFailed(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("unexpected status {status} from {operation}")]
    BadResponse { operation: String, status: u16 },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// Shortcut for a missing path or object.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Shortcut for a semantic conflict (rename collision, non-empty dir).
    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for FsError {
    fn from(err: serde_json::Error) -> Self {
        FsError::Protocol(err.to_string())
    }
}
