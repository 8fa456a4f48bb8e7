//! Error types for the sync engine.

use thiserror::Error;
use vendorsync_protocol::ProtocolError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for configuration store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or remote store error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A record or manifest could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] ProtocolError),

    /// The local configuration store rejected an operation.
    #[error("configuration store error: {0}")]
    Store(#[from] StoreError),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The controller event loop is no longer running.
    #[error("sync controller has shut down")]
    Shutdown,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport { retryable: true, .. })
    }

    /// Returns the message shown to users in `SyncStatus::Error`.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Transport { message, .. } => {
                format!("Could not reach cloud storage: {message}")
            }
            SyncError::Serialization(e) => format!("A synced record could not be encoded: {e}"),
            SyncError::Store(e) => format!("Local configuration could not be updated: {e}"),
            SyncError::Io(e) => format!("Could not access storage: {e}"),
            SyncError::Shutdown => "Sync is not running".into(),
        }
    }
}

/// Errors reported by a configuration store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record with this id already exists.
    #[error("record '{0}' already exists")]
    AlreadyExists(String),

    /// No record with this id exists.
    #[error("record '{0}' not found")]
    NotFound(String),

    /// The record is the last one and cannot be removed.
    #[error("record '{0}' is the last record and cannot be removed")]
    LastRecord(String),

    /// The backing storage failed.
    #[error("storage error: {0}")]
    Storage(String),
}
