//! CLI command implementations.

pub mod enable;
pub mod inspect;
pub mod resolve;
pub mod sync;

use std::path::Path;
use std::sync::Arc;
use vendorsync_engine::{
    DirRemoteStore, FileConfigStore, SyncConfig, SyncController, SyncHandle, SyncStatus,
};

/// The stores a command operates on.
pub struct Stores {
    /// Local configuration file.
    pub local: Arc<FileConfigStore>,
    /// Remote store directory.
    pub remote: Arc<DirRemoteStore>,
}

impl Stores {
    /// Opens both stores.
    pub fn open(local: &Path, remote: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            local: Arc::new(FileConfigStore::open(local)?),
            remote: Arc::new(DirRemoteStore::open(remote)?),
        })
    }

    /// Starts a controller over the stores.
    pub fn start(&self) -> SyncHandle {
        SyncController::spawn(
            SyncConfig::default(),
            Arc::clone(&self.local),
            Arc::clone(&self.remote),
        )
    }
}

/// Fails unless sync is enabled in the local manifest.
pub fn require_enabled(handle: &SyncHandle) -> Result<(), Box<dyn std::error::Error>> {
    if !handle.is_enabled() {
        return Err("Sync is disabled; run `vendorsync enable` first".into());
    }
    Ok(())
}

/// Waits until no push is running or scheduled, returning the final status.
pub async fn wait_for_outcome(handle: &SyncHandle) -> Result<SyncStatus, Box<dyn std::error::Error>> {
    handle.settle().await?;
    let mut rx = handle.subscribe();
    loop {
        let status = rx.borrow_and_update().clone();
        if !status.is_active() {
            return Ok(status);
        }
        rx.changed().await?;
    }
}
