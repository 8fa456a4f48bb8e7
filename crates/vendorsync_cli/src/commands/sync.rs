//! Push and pull command implementations.

use super::{require_enabled, wait_for_outcome, Stores};
use vendorsync_engine::{SyncHandle, SyncStatus};

/// Runs one explicit push and prints the final status.
pub async fn push(stores: &Stores) -> Result<(), Box<dyn std::error::Error>> {
    let handle = stores.start();
    require_enabled(&handle)?;

    handle.sync_now();
    let status = wait_for_outcome(&handle).await?;
    handle.shutdown().await?;

    println!("Push: {status}");
    if let SyncStatus::Error(message) = status {
        return Err(message.into());
    }
    Ok(())
}

/// Runs one pull and prints imports and pending conflicts.
pub async fn pull(stores: &Stores) -> Result<(), Box<dyn std::error::Error>> {
    let handle = stores.start();
    require_enabled(&handle)?;

    run_pull(&handle).await?;
    let stats = handle.stats();
    let conflicts = handle.pending_conflicts();
    handle.shutdown().await?;

    println!("Imported: {} record(s)", stats.records_imported);
    if conflicts.is_empty() {
        println!("Conflicts: none");
    } else {
        println!("Conflicts:");
        for conflict in &conflicts {
            println!(
                "  {} ({}): {}",
                conflict.record_id,
                conflict.local.name(),
                conflict.changed_fields().join(", ")
            );
        }
    }
    Ok(())
}

/// Triggers a pull and waits for it.
pub(crate) async fn run_pull(handle: &SyncHandle) -> Result<(), Box<dyn std::error::Error>> {
    handle.on_remote_change();
    handle.settle().await?;
    if let SyncStatus::Error(message) = handle.status() {
        return Err(message.into());
    }
    Ok(())
}
