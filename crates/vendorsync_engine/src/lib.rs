//! # VendorSync Engine
//!
//! Keeps a device's vendor configuration records in step with a
//! cloud-backed key-value store shared by the user's devices.
//!
//! This crate provides:
//! - The sync controller event loop and its [`SyncHandle`]
//! - Debounced push of the full local record set
//! - Pull with conflict detection and auto-import
//! - Retry with quadratic backoff
//! - Reachability edge tracking
//! - Local configuration store and remote key-value store abstractions
//!
//! ## Architecture
//!
//! The engine implements a **last-writer-wins-per-record with user
//! arbitration** model:
//! 1. Local edits are debounced, then every record is written remotely
//! 2. Remote change notifications trigger a pull
//! 3. Records that differ on both sides are surfaced as conflicts
//! 4. The user keeps the local or accepts the remote version
//!
//! ## Key Invariants
//!
//! - At most one push or pull is in flight
//! - A pull never overwrites a local record silently
//! - Every push rewrites the manifest from the full local id set
//! - A pending conflict ends only by resolution or by a pull that finds
//!   both versions equal
//! - Disabling sync cancels every pending timer

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod config;
mod controller;
mod detector;
mod error;
mod local;
mod reachability;
mod remote;
mod retry;
mod status;

pub use adapter::RecordStore;
pub use config::{RetryConfig, SyncConfig};
pub use controller::{ResolveOutcome, SyncController, SyncHandle};
pub use detector::{detect_conflicts, Detection};
pub use error::{StoreError, StoreResult, SyncError, SyncResult};
pub use local::{ConfigDocument, ConfigStore, FileConfigStore, MemoryConfigStore};
pub use reachability::{Reachability, ReachabilityEdge, ReachabilityTracker};
pub use remote::{DirRemoteStore, MemoryRemoteStore, RemoteKeyValueStore};
pub use retry::{RetryDecision, RetryScheduler, RetryState};
pub use status::{SyncStats, SyncStatus};
