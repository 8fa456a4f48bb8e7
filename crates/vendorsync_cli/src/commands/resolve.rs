//! Resolve command implementation.

use super::sync::run_pull;
use super::{require_enabled, Stores};
use vendorsync_engine::ResolveOutcome;

/// Pulls, then resolves the conflict for `id`.
pub async fn run(
    stores: &Stores,
    id: &str,
    keep_local: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let handle = stores.start();
    require_enabled(&handle)?;

    run_pull(&handle).await?;
    let outcome = handle.resolve(id, keep_local).await?;
    handle.shutdown().await?;

    let side = if keep_local { "local" } else { "remote" };
    match outcome {
        ResolveOutcome::Resolved => {
            println!("Resolved {id}: kept {side} version");
            Ok(())
        }
        ResolveOutcome::NotPending => {
            println!("No conflict pending for {id}");
            Ok(())
        }
        ResolveOutcome::Failed(message) => Err(message.into()),
    }
}
