//! Integration tests for the sync controller.
//!
//! All tests run on a paused clock, so timer-driven behavior (debounce,
//! retry backoff, success decay) is deterministic.

use std::sync::Arc;
use std::time::Duration;
use vendorsync_engine::{
    ConfigStore, DirRemoteStore, FileConfigStore, MemoryConfigStore, MemoryRemoteStore,
    RemoteKeyValueStore, ResolveOutcome, RetryConfig, SyncConfig, SyncController, SyncHandle,
    SyncStatus,
};
use vendorsync_protocol::{record_key, Record, SyncManifest, MANIFEST_KEY};

struct Device {
    handle: SyncHandle,
    local: Arc<MemoryConfigStore>,
    remote: Arc<MemoryRemoteStore>,
}

fn device(records: Vec<Record>) -> Device {
    device_with_config(records, SyncConfig::default())
}

fn device_with_config(records: Vec<Record>, config: SyncConfig) -> Device {
    let local = MemoryConfigStore::with_records(records).unwrap();
    local.save_manifest(&SyncManifest::new(true)).unwrap();
    let local = Arc::new(local);
    let remote = Arc::new(MemoryRemoteStore::new());
    let handle = SyncController::spawn(config, Arc::clone(&local), Arc::clone(&remote));
    Device {
        handle,
        local,
        remote,
    }
}

fn vendor(id: &str, url: &str) -> Record {
    Record::new(id, "Vendor").with_field("URL", url)
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn edits_within_debounce_window_push_once() {
    let d = device(vec![vendor("a", "x"), vendor("b", "y")]);

    for _ in 0..5 {
        d.handle.on_local_change();
        advance(500).await;
    }
    // Last change at t=2.0s; the push is due at t=4.0s.
    advance(1400).await;
    assert_eq!(d.remote.write_count(MANIFEST_KEY), 0);

    advance(200).await;
    assert_eq!(d.remote.write_count(MANIFEST_KEY), 1);
    assert_eq!(d.remote.write_count(&record_key("a")), 1);
    assert_eq!(d.remote.write_count(&record_key("b")), 1);
    assert_eq!(d.remote.flush_count(), 1);
    assert_eq!(d.handle.status(), SyncStatus::Success);

    let manifest = d.remote.manifest().unwrap();
    assert!(manifest.enabled);
    assert_eq!(manifest.ids(), ["a".to_string(), "b".to_string()]);
    assert_eq!(d.local.load_manifest().unwrap(), manifest);
}

#[tokio::test(start_paused = true)]
async fn pull_imports_records_missing_locally() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "x"));
    d.remote.seed_record(&vendor("b", "z"));
    d.remote
        .seed_manifest(&SyncManifest::with_ids(true, ["a", "b"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    assert_eq!(d.local.get_record("b").unwrap(), Some(vendor("b", "z")));
    assert!(d.handle.pending_conflicts().is_empty());
    assert_eq!(d.handle.status(), SyncStatus::Success);
    assert_eq!(d.handle.stats().records_imported, 1);
}

#[tokio::test(start_paused = true)]
async fn identical_records_do_not_conflict() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "x"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    assert!(d.handle.pending_conflicts().is_empty());
    assert_eq!(d.local.all_records().unwrap(), vec![vendor("a", "x")]);
}

#[tokio::test(start_paused = true)]
async fn divergent_record_keep_local_writes_remote() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    let conflicts = d.handle.pending_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].record_id, "a");
    assert_eq!(conflicts[0].local, vendor("a", "x"));
    assert_eq!(conflicts[0].remote, vendor("a", "y"));
    assert_eq!(d.handle.status(), SyncStatus::Idle);

    let outcome = d.handle.resolve("a", true).await.unwrap();
    assert_eq!(outcome, ResolveOutcome::Resolved);
    assert_eq!(d.remote.record("a"), Some(vendor("a", "x")));
    assert_eq!(d.local.get_record("a").unwrap(), Some(vendor("a", "x")));
    assert!(d.handle.pending_conflicts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn divergent_record_keep_remote_updates_local() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    let outcome = d.handle.resolve("a", false).await.unwrap();
    assert_eq!(outcome, ResolveOutcome::Resolved);
    assert_eq!(d.local.get_record("a").unwrap(), Some(vendor("a", "y")));
    assert_eq!(d.remote.write_count(&record_key("a")), 0);
    assert!(d.handle.pending_conflicts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resolving_twice_is_a_no_op() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    assert_eq!(
        d.handle.resolve("a", true).await.unwrap(),
        ResolveOutcome::Resolved
    );
    let writes = d.remote.write_attempts();
    assert_eq!(
        d.handle.resolve("a", true).await.unwrap(),
        ResolveOutcome::NotPending
    );
    assert_eq!(d.remote.write_attempts(), writes);
    assert_eq!(
        d.handle.resolve("unknown", false).await.unwrap(),
        ResolveOutcome::NotPending
    );
}

#[tokio::test(start_paused = true)]
async fn failed_resolution_keeps_conflict() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    d.local.set_fail_writes(true);
    let outcome = d.handle.resolve("a", false).await.unwrap();
    assert!(matches!(outcome, ResolveOutcome::Failed(_)));
    assert_eq!(d.handle.pending_conflicts().len(), 1);
    assert!(d.handle.status().error_message().is_some());

    d.local.set_fail_writes(false);
    assert_eq!(
        d.handle.resolve("a", false).await.unwrap(),
        ResolveOutcome::Resolved
    );
    assert_eq!(d.handle.status(), SyncStatus::Idle);

    advance(60_000).await;
    assert_eq!(d.handle.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn unreadable_remote_keeps_pending_conflicts() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.pending_conflicts().len(), 1);

    d.remote.set_fail_reads(true);
    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    assert_eq!(d.handle.pending_conflicts().len(), 1);
    assert!(d
        .handle
        .status()
        .error_message()
        .unwrap()
        .starts_with("Could not reach cloud storage"));
}

#[tokio::test(start_paused = true)]
async fn unreadable_record_keeps_its_conflict() {
    let d = device(vec![vendor("a", "x"), vendor("b", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_record(&vendor("b", "x"));
    d.remote
        .seed_manifest(&SyncManifest::with_ids(true, ["a", "b"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.pending_conflicts().len(), 1);

    d.remote.seed_raw(&record_key("a"), vec![0xff, 0x00]);
    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    let conflicts = d.handle.pending_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].remote, vendor("a", "y"));
    assert_eq!(d.handle.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn missing_remote_manifest_keeps_pending_conflicts() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    d.remote.remove(MANIFEST_KEY).unwrap();
    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    assert_eq!(d.handle.pending_conflicts().len(), 1);
    assert_eq!(d.handle.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn equal_versions_supersede_pending_conflict() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.pending_conflicts().len(), 1);

    // Another device wrote the same value this device holds.
    d.remote.seed_record(&vendor("a", "x"));
    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    assert!(d.handle.pending_conflicts().is_empty());
    assert_eq!(d.handle.status(), SyncStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn newer_remote_version_replaces_pending_conflict() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    d.remote.seed_record(&vendor("a", "z"));
    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    let conflicts = d.handle.pending_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].remote, vendor("a", "z"));
}

#[tokio::test(start_paused = true)]
async fn pull_while_offline_does_nothing() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("b", "z"));
    d.remote
        .seed_manifest(&SyncManifest::with_ids(true, ["a", "b"]));

    d.handle.on_reachability(false);
    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();

    assert_eq!(d.remote.read_count(), 0);
    assert_eq!(d.local.get_record("b").unwrap(), None);
    assert_eq!(d.handle.status(), SyncStatus::Idle);
    assert_eq!(d.handle.stats().pulls_completed, 0);
}

#[tokio::test(start_paused = true)]
async fn declined_flush_still_completes_push() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.set_flush_result(false);

    d.handle.sync_now();
    d.handle.settle().await.unwrap();

    assert_eq!(d.remote.flush_count(), 1);
    assert_eq!(d.remote.record("a"), Some(vendor("a", "x")));
    assert_eq!(d.handle.status(), SyncStatus::Success);
    assert_eq!(d.handle.retry_attempt(), 0);
}

#[tokio::test(start_paused = true)]
async fn resolve_all_applies_one_choice() {
    let d = device(vec![vendor("a", "x"), vendor("b", "x")]);
    d.remote.seed_record(&vendor("a", "y"));
    d.remote.seed_record(&vendor("b", "y"));
    d.remote
        .seed_manifest(&SyncManifest::with_ids(true, ["a", "b"]));

    d.handle.on_remote_change();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.pending_conflicts().len(), 2);

    let outcomes = d.handle.resolve_all(false).await.unwrap();
    assert_eq!(
        outcomes,
        vec![
            ("a".to_string(), ResolveOutcome::Resolved),
            ("b".to_string(), ResolveOutcome::Resolved),
        ]
    );
    assert_eq!(
        d.local.all_records().unwrap(),
        vec![vendor("a", "y"), vendor("b", "y")]
    );
    assert_eq!(d.handle.stats().conflicts_resolved, 2);
}

#[tokio::test(start_paused = true)]
async fn failing_pushes_back_off_then_surface_error() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.set_fail_writes(true);

    d.handle.sync_now();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.retry_attempt(), 1);
    assert_eq!(d.handle.status(), SyncStatus::Syncing);
    assert_eq!(d.remote.write_attempts(), 1);

    // First retry after 1s.
    advance(900).await;
    assert_eq!(d.remote.write_attempts(), 1);
    advance(200).await;
    assert_eq!(d.remote.write_attempts(), 2);
    assert_eq!(d.handle.retry_attempt(), 2);
    assert_eq!(d.handle.status(), SyncStatus::Syncing);

    // Second retry after 4s; the third failure gives up.
    advance(3800).await;
    assert_eq!(d.remote.write_attempts(), 2);
    advance(200).await;
    assert_eq!(d.remote.write_attempts(), 3);
    assert_eq!(d.handle.retry_attempt(), 0);
    let status = d.handle.status();
    assert!(status
        .error_message()
        .unwrap()
        .starts_with("Could not reach cloud storage"));

    // Nothing else is scheduled.
    advance(30_000).await;
    assert_eq!(d.remote.write_attempts(), 3);

    // A new trigger starts a fresh sequence at attempt 1.
    d.handle.on_local_change();
    advance(2100).await;
    assert_eq!(d.remote.write_attempts(), 4);
    assert_eq!(d.handle.retry_attempt(), 1);

    d.remote.set_fail_writes(false);
    advance(1000).await;
    assert_eq!(d.handle.status(), SyncStatus::Success);
    assert_eq!(d.handle.retry_attempt(), 0);
    assert_eq!(d.remote.record("a"), Some(vendor("a", "x")));
}

#[tokio::test(start_paused = true)]
async fn success_cancels_pending_retry() {
    let config = SyncConfig::default()
        .with_retry(RetryConfig::new(3).with_base_delay(Duration::from_secs(10)));
    let d = device_with_config(vec![vendor("a", "x")], config);
    d.remote.set_fail_writes(true);

    d.handle.sync_now();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.retry_attempt(), 1);

    d.remote.set_fail_writes(false);
    d.handle.on_local_change();
    advance(2100).await;
    assert_eq!(d.remote.write_count(MANIFEST_KEY), 1);
    assert_eq!(d.handle.retry_attempt(), 0);

    // The retry that was due at t=10s never fires.
    advance(15_000).await;
    assert_eq!(d.remote.write_count(MANIFEST_KEY), 1);
    assert_eq!(d.handle.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn offline_push_is_deferred_until_back_online() {
    let d = device(vec![vendor("a", "x")]);

    d.handle.on_reachability(false);
    d.handle.sync_now();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.status(), SyncStatus::Offline);
    assert_eq!(d.handle.retry_attempt(), 0);

    d.handle.on_local_change();
    advance(3000).await;
    assert_eq!(d.remote.write_attempts(), 0);
    assert_eq!(d.handle.status(), SyncStatus::Offline);

    d.handle.on_reachability(true);
    d.handle.settle().await.unwrap();
    assert_eq!(d.remote.write_count(MANIFEST_KEY), 1);
    assert_eq!(d.handle.status(), SyncStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn repeated_online_callbacks_do_not_push() {
    let d = device(vec![vendor("a", "x")]);

    for _ in 0..3 {
        d.handle.on_reachability(true);
    }
    d.handle.settle().await.unwrap();
    assert_eq!(d.remote.write_attempts(), 0);
    assert!(d.handle.is_online());
}

#[tokio::test(start_paused = true)]
async fn disabling_cancels_pending_work() {
    let d = device(vec![vendor("a", "x")]);

    d.handle.on_local_change();
    advance(1000).await;
    d.handle.set_enabled(false);
    advance(5000).await;

    assert_eq!(d.remote.write_attempts(), 0);
    assert_eq!(d.handle.status(), SyncStatus::Idle);
    assert!(!d.handle.is_enabled());
    assert!(!d.local.load_manifest().unwrap().enabled);
}

#[tokio::test(start_paused = true)]
async fn disabling_during_backoff_stops_retries() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.set_fail_writes(true);

    d.handle.sync_now();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.retry_attempt(), 1);

    d.handle.set_enabled(false);
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.retry_attempt(), 0);
    assert_eq!(d.handle.status(), SyncStatus::Idle);

    advance(10_000).await;
    assert_eq!(d.remote.write_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn enabling_pushes_immediately() {
    let local = Arc::new(MemoryConfigStore::with_records([vendor("a", "x")]).unwrap());
    let remote = Arc::new(MemoryRemoteStore::new());
    let handle = SyncController::spawn(
        SyncConfig::default(),
        Arc::clone(&local),
        Arc::clone(&remote),
    );

    handle.set_enabled(true);
    handle.settle().await.unwrap();

    assert!(handle.is_enabled());
    assert_eq!(remote.write_count(MANIFEST_KEY), 1);
    assert!(local.load_manifest().unwrap().enabled);

    // Enabling again is not a transition.
    handle.set_enabled(true);
    handle.settle().await.unwrap();
    assert_eq!(remote.write_count(MANIFEST_KEY), 1);
}

#[tokio::test(start_paused = true)]
async fn success_decays_to_idle() {
    let d = device(vec![vendor("a", "x")]);

    d.handle.sync_now();
    d.handle.settle().await.unwrap();
    assert_eq!(d.handle.status(), SyncStatus::Success);

    advance(1900).await;
    assert_eq!(d.handle.status(), SyncStatus::Success);
    advance(200).await;
    assert_eq!(d.handle.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn remote_notifications_coalesce_into_one_pull() {
    let d = device(vec![vendor("a", "x")]);
    d.remote.seed_record(&vendor("a", "x"));
    d.remote.seed_manifest(&SyncManifest::with_ids(true, ["a"]));

    for _ in 0..5 {
        d.handle.on_remote_change();
    }
    d.handle.settle().await.unwrap();

    // One manifest read plus one record read.
    assert_eq!(d.remote.read_count(), 2);
    assert_eq!(d.handle.stats().pulls_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn status_changes_are_published() {
    let d = device(vec![vendor("a", "x")]);
    let mut rx = d.handle.subscribe();

    d.handle.sync_now();
    rx.changed().await.unwrap();
    d.handle.settle().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), SyncStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn two_devices_share_a_directory_store() {
    let dir = tempfile::tempdir().unwrap();
    let remote_dir = dir.path().join("cloud");

    let local_a = FileConfigStore::open(dir.path().join("a.json")).unwrap();
    local_a.add_record(vendor("a", "x")).unwrap();
    local_a.add_record(vendor("shared", "x")).unwrap();
    local_a.save_manifest(&SyncManifest::new(true)).unwrap();
    let local_b = FileConfigStore::open(dir.path().join("b.json")).unwrap();
    local_b.add_record(vendor("shared", "y")).unwrap();
    local_b.save_manifest(&SyncManifest::new(true)).unwrap();

    let local_a = Arc::new(local_a);
    let local_b = Arc::new(local_b);
    let remote_a = Arc::new(DirRemoteStore::open(&remote_dir).unwrap());
    let remote_b = Arc::new(DirRemoteStore::open(&remote_dir).unwrap());

    let device_a = SyncController::spawn(SyncConfig::default(), local_a, remote_a);
    let device_b = SyncController::spawn(SyncConfig::default(), Arc::clone(&local_b), remote_b);

    device_a.sync_now();
    device_a.settle().await.unwrap();
    assert_eq!(device_a.status(), SyncStatus::Success);

    device_b.on_remote_change();
    device_b.settle().await.unwrap();

    assert_eq!(local_b.get_record("a").unwrap(), Some(vendor("a", "x")));
    let conflicts = device_b.pending_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].record_id, "shared");
    assert_eq!(conflicts[0].changed_fields(), vec!["URL".to_string()]);

    device_b.resolve("shared", false).await.unwrap();
    let reopened = FileConfigStore::open(dir.path().join("b.json")).unwrap();
    assert_eq!(
        reopened.get_record("shared").unwrap(),
        Some(vendor("shared", "x"))
    );
}
