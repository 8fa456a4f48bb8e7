//! Sync status and statistics.

use std::fmt;
use std::time::Instant;

/// The sync status shown to users.
///
/// Exactly one value holds at a time. `Success` is a transient display state
/// that decays to `Idle`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing in progress.
    #[default]
    Idle,
    /// A push or pull is running, or a push retry is scheduled.
    Syncing,
    /// The last cycle succeeded.
    Success,
    /// A push was attempted without network.
    Offline,
    /// The last operation failed; carries a readable message.
    Error(String),
}

impl SyncStatus {
    /// Returns true while a cycle is running or a retry is pending.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }

    /// Returns true for `Idle` and `Success`, which are equivalent at rest.
    pub fn is_at_rest(&self) -> bool {
        matches!(self, SyncStatus::Idle | SyncStatus::Success)
    }

    /// Returns the error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            SyncStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => f.write_str("idle"),
            SyncStatus::Syncing => f.write_str("syncing"),
            SyncStatus::Success => f.write_str("synced"),
            SyncStatus::Offline => f.write_str("offline"),
            SyncStatus::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Number of pushes that completed successfully.
    pub pushes_completed: u64,
    /// Number of pull cycles that ran to completion.
    pub pulls_completed: u64,
    /// Number of failed push attempts.
    pub push_failures: u64,
    /// Number of retries scheduled.
    pub retries_scheduled: u64,
    /// Number of remote records imported without conflict.
    pub records_imported: u64,
    /// Number of conflicts detected by pulls.
    pub conflicts_detected: u64,
    /// Number of conflicts resolved.
    pub conflicts_resolved: u64,
    /// Time of the last successful push or pull.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}
