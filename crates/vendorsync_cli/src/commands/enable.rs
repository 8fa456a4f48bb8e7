//! Enable and disable command implementations.

use super::{wait_for_outcome, Stores};

/// Sets the enabled flag. Enabling also pushes.
pub async fn run(stores: &Stores, enabled: bool) -> Result<(), Box<dyn std::error::Error>> {
    let handle = stores.start();
    let was_enabled = handle.is_enabled();

    handle.set_enabled(enabled);
    let status = wait_for_outcome(&handle).await?;
    handle.shutdown().await?;

    match (was_enabled, enabled) {
        (false, true) => println!("Sync enabled ({status})"),
        (true, false) => println!("Sync disabled"),
        (_, true) => println!("Sync already enabled"),
        (_, false) => println!("Sync already disabled"),
    }
    Ok(())
}
