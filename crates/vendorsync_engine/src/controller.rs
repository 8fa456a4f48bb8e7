//! Sync controller event loop.
//!
//! A [`SyncController`] owns every piece of mutable sync state (status,
//! retry scheduler, pending conflicts, timers) and runs on a single tokio
//! task. Hosts talk to it through a cloneable [`SyncHandle`], which only
//! sends commands and reads published snapshots.
//!
//! ## Cycles
//!
//! Push and pull cycles run inline on the event loop, so at most one is in
//! flight. Commands that arrive while a cycle runs are drained afterwards
//! and collapsed into at most one follow-up push and one follow-up pull.
//!
//! ## Timers
//!
//! The debounce window, the retry backoff and the `Success → Idle` decay
//! are single-slot deadlines: arming one replaces the previous deadline of
//! the same kind.

use crate::adapter::RecordStore;
use crate::config::SyncConfig;
use crate::detector::detect_conflicts;
use crate::error::{SyncError, SyncResult};
use crate::local::ConfigStore;
use crate::reachability::{ReachabilityEdge, ReachabilityTracker};
use crate::remote::RemoteKeyValueStore;
use crate::retry::{RetryDecision, RetryScheduler};
use crate::status::{SyncStats, SyncStatus};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use vendorsync_protocol::{Conflict, ConflictResolution, SyncManifest};

/// Result of a conflict resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The chosen version was applied and the conflict removed.
    Resolved,
    /// No conflict is pending for the id; nothing happened.
    NotPending,
    /// Applying the choice failed; the conflict stays pending.
    Failed(String),
}

enum Command {
    LocalChange,
    RemoteChange,
    Reachability(bool),
    SyncNow,
    SetEnabled(bool),
    Resolve {
        record_id: String,
        keep_local: bool,
        reply: oneshot::Sender<ResolveOutcome>,
    },
    ResolveAll {
        keep_local: bool,
        reply: oneshot::Sender<Vec<(String, ResolveOutcome)>>,
    },
    Settle(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// State published by the event loop for read-only access.
struct Shared {
    status: watch::Sender<SyncStatus>,
    conflicts: RwLock<Vec<Conflict>>,
    stats: RwLock<SyncStats>,
    retry_attempt: AtomicU32,
    enabled: AtomicBool,
    reachability: ReachabilityTracker,
}

/// Cloneable handle to a running [`SyncController`].
///
/// Trigger methods never block and are silently dropped once the controller
/// has shut down.
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl SyncHandle {
    /// Signals that the local configuration changed. Debounced.
    pub fn on_local_change(&self) {
        self.send(Command::LocalChange);
    }

    /// Signals that another device's writes became visible. Starts a pull.
    pub fn on_remote_change(&self) {
        self.send(Command::RemoteChange);
    }

    /// Forwards a reachability callback. Repeated values are harmless.
    pub fn on_reachability(&self, reachable: bool) {
        self.send(Command::Reachability(reachable));
    }

    /// Explicit user-triggered sync: pushes now and restarts the retry
    /// sequence.
    pub fn sync_now(&self) {
        self.send(Command::SyncNow);
    }

    /// Enables or disables sync.
    pub fn set_enabled(&self, enabled: bool) {
        self.send(Command::SetEnabled(enabled));
    }

    /// Applies the user's choice for one pending conflict.
    ///
    /// Failures are also reported through the status as
    /// `SyncStatus::Error`.
    pub async fn resolve(&self, record_id: &str, keep_local: bool) -> SyncResult<ResolveOutcome> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Command::Resolve {
                record_id: record_id.to_string(),
                keep_local,
                reply,
            },
            rx,
        )
        .await
    }

    /// Applies one choice to every pending conflict, in list order.
    pub async fn resolve_all(&self, keep_local: bool) -> SyncResult<Vec<(String, ResolveOutcome)>> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::ResolveAll { keep_local, reply }, rx)
            .await
    }

    /// Waits until every command sent so far has been processed and the
    /// cycles it triggered have run. Pending timers are not awaited.
    pub async fn settle(&self) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Settle(reply), rx).await
    }

    /// Stops the event loop once the in-flight cycle has completed.
    pub async fn shutdown(&self) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Shutdown(reply), rx).await
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        self.shared.status.borrow().clone()
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status.subscribe()
    }

    /// Returns the conflicts waiting for a decision.
    pub fn pending_conflicts(&self) -> Vec<Conflict> {
        self.shared.conflicts.read().clone()
    }

    /// Returns the number of consecutive failed pushes in the current
    /// retry sequence.
    pub fn retry_attempt(&self) -> u32 {
        self.shared.retry_attempt.load(Ordering::SeqCst)
    }

    /// Returns true if sync is enabled.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// Returns the last observed reachability.
    pub fn is_online(&self) -> bool {
        self.shared.reachability.is_online()
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.read().clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("sync controller stopped, dropping trigger");
        }
    }

    async fn request<T>(&self, command: Command, rx: oneshot::Receiver<T>) -> SyncResult<T> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::Shutdown)?;
        rx.await.map_err(|_| SyncError::Shutdown)
    }
}

/// The sync controller.
///
/// Construct with [`SyncController::new`] and drive with
/// [`SyncController::run`], or use [`SyncController::spawn`].
pub struct SyncController<L: ConfigStore, R: RemoteKeyValueStore> {
    config: SyncConfig,
    local: Arc<L>,
    store: RecordStore<R>,
    shared: Arc<Shared>,
    retry: RetryScheduler,
    commands: mpsc::UnboundedReceiver<Command>,
    debounce_deadline: Option<Instant>,
    retry_deadline: Option<Instant>,
    decay_deadline: Option<Instant>,
    push_pending: bool,
    pull_pending: bool,
    settle_waiters: Vec<oneshot::Sender<()>>,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
    stopping: bool,
}

impl<L, R> SyncController<L, R>
where
    L: ConfigStore + 'static,
    R: RemoteKeyValueStore + 'static,
{
    /// Creates a controller and its handle.
    ///
    /// The enabled flag is read from the local manifest.
    pub fn new(config: SyncConfig, local: Arc<L>, remote: Arc<R>) -> (Self, SyncHandle) {
        let enabled = match local.load_manifest() {
            Ok(manifest) => manifest.enabled,
            Err(e) => {
                warn!(error = %e, "could not load local manifest, sync starts disabled");
                false
            }
        };

        let (status, _) = watch::channel(SyncStatus::Idle);
        let shared = Arc::new(Shared {
            status,
            conflicts: RwLock::new(Vec::new()),
            stats: RwLock::new(SyncStats::default()),
            retry_attempt: AtomicU32::new(0),
            enabled: AtomicBool::new(enabled),
            reachability: ReachabilityTracker::new(),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let controller = Self {
            retry: RetryScheduler::new(config.retry.clone()),
            config,
            local,
            store: RecordStore::new(remote),
            shared: Arc::clone(&shared),
            commands: rx,
            debounce_deadline: None,
            retry_deadline: None,
            decay_deadline: None,
            push_pending: false,
            pull_pending: false,
            settle_waiters: Vec::new(),
            shutdown_waiters: Vec::new(),
            stopping: false,
        };
        let handle = SyncHandle {
            commands: tx,
            shared,
        };
        (controller, handle)
    }

    /// Creates a controller and runs it on a new tokio task.
    pub fn spawn(config: SyncConfig, local: Arc<L>, remote: Arc<R>) -> SyncHandle {
        let (controller, handle) = Self::new(config, local, remote);
        tokio::spawn(controller.run());
        handle
    }

    /// Runs the event loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!(enabled = self.is_enabled(), "sync controller started");

        while !self.stopping {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => self.stopping = true,
                },
                _ = sleep_until(self.debounce_deadline) => {
                    self.debounce_deadline = None;
                    debug!("debounce window closed");
                    self.push_pending = true;
                }
                _ = sleep_until(self.retry_deadline) => {
                    self.retry_deadline = None;
                    self.retry.retry_elapsed();
                    debug!(attempt = self.retry.attempt(), "retrying push");
                    self.push_pending = true;
                }
                _ = sleep_until(self.decay_deadline) => {
                    self.decay_deadline = None;
                    if self.status() == SyncStatus::Success {
                        self.set_status(SyncStatus::Idle);
                    }
                }
            }

            while let Ok(command) = self.commands.try_recv() {
                self.handle_command(command);
            }
            self.run_pending();

            for waiter in self.settle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }

        self.commands.close();
        info!("sync controller stopped");
        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::LocalChange => {
                if !self.is_enabled() {
                    debug!("sync disabled, ignoring local change");
                    return;
                }
                self.debounce_deadline = Some(Instant::now() + self.config.debounce);
            }
            Command::RemoteChange => {
                if !self.is_enabled() {
                    debug!("sync disabled, ignoring remote change");
                    return;
                }
                self.pull_pending = true;
            }
            Command::Reachability(reachable) => {
                let edge = self.shared.reachability.observe(reachable);
                if edge == Some(ReachabilityEdge::BecameOnline) {
                    info!("network reachable again");
                    if self.is_enabled() {
                        self.debounce_deadline = None;
                        self.push_pending = true;
                    }
                }
            }
            Command::SyncNow => {
                if !self.is_enabled() {
                    debug!("sync disabled, ignoring sync request");
                    return;
                }
                self.debounce_deadline = None;
                self.retry_deadline = None;
                self.retry.reset();
                self.publish_retry_attempt();
                self.push_pending = true;
            }
            Command::SetEnabled(enabled) => run_blocking(|| self.set_enabled(enabled)),
            Command::Resolve {
                record_id,
                keep_local,
                reply,
            } => {
                let outcome = run_blocking(|| self.resolve(&record_id, keep_local));
                let _ = reply.send(outcome);
            }
            Command::ResolveAll { keep_local, reply } => {
                let ids: Vec<String> = self
                    .shared
                    .conflicts
                    .read()
                    .iter()
                    .map(|c| c.record_id.clone())
                    .collect();
                let outcomes: Vec<(String, ResolveOutcome)> = run_blocking(|| {
                    ids.into_iter()
                        .map(|id| {
                            let outcome = self.resolve(&id, keep_local);
                            (id, outcome)
                        })
                        .collect()
                });
                let _ = reply.send(outcomes);
            }
            Command::Settle(reply) => self.settle_waiters.push(reply),
            Command::Shutdown(reply) => {
                self.stopping = true;
                self.shutdown_waiters.push(reply);
            }
        }
    }

    fn run_pending(&mut self) {
        if std::mem::take(&mut self.push_pending) {
            run_blocking(|| self.push_cycle());
        }
        if std::mem::take(&mut self.pull_pending) {
            run_blocking(|| self.pull_cycle());
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        let was_enabled = self.shared.enabled.swap(enabled, Ordering::SeqCst);

        match self.local.load_manifest() {
            Ok(mut manifest) => {
                manifest.enabled = enabled;
                if let Err(e) = self.local.save_manifest(&manifest) {
                    warn!(error = %e, "could not persist enabled flag");
                }
            }
            Err(e) => warn!(error = %e, "could not load local manifest"),
        }

        if enabled {
            if !was_enabled {
                info!("sync enabled");
                self.push_pending = true;
            }
            return;
        }

        info!("sync disabled");
        self.debounce_deadline = None;
        self.retry_deadline = None;
        self.push_pending = false;
        self.pull_pending = false;
        self.retry.reset();
        self.publish_retry_attempt();
        self.set_status(SyncStatus::Idle);
    }

    /// Writes the full local record set to the remote store.
    fn push_cycle(&mut self) {
        if !self.is_enabled() {
            debug!("sync disabled, skipping push");
            return;
        }
        if !self.shared.reachability.is_online() {
            info!("offline, push deferred until the network returns");
            self.set_status(SyncStatus::Offline);
            return;
        }

        self.set_status(SyncStatus::Syncing);
        match self.push_all() {
            Ok(count) => {
                self.retry.record_success();
                self.retry_deadline = None;
                self.publish_retry_attempt();
                {
                    let mut stats = self.shared.stats.write();
                    stats.pushes_completed += 1;
                    stats.last_sync_time = Some(std::time::Instant::now());
                    stats.last_error = None;
                }
                info!(records = count, "push completed");
                self.set_success();
            }
            Err(e) => self.handle_push_failure(e),
        }
    }

    fn push_all(&self) -> SyncResult<usize> {
        let records = self.local.all_records()?;
        let manifest = SyncManifest::with_ids(true, records.iter().map(|r| r.id().to_string()));

        self.store.put_manifest(&manifest)?;
        for record in &records {
            self.store.put(record)?;
        }
        self.store.flush();

        if let Err(e) = self.local.save_manifest(&manifest) {
            warn!(error = %e, "could not persist local manifest");
        }
        Ok(records.len())
    }

    fn handle_push_failure(&mut self, err: SyncError) {
        {
            let mut stats = self.shared.stats.write();
            stats.push_failures += 1;
            stats.last_error = Some(err.to_string());
        }

        if !err.is_retryable() {
            error!(error = %err, "push failed");
            self.retry.reset();
            self.retry_deadline = None;
            self.publish_retry_attempt();
            self.set_status(SyncStatus::Error(err.user_message()));
            return;
        }

        match self.retry.record_failure() {
            RetryDecision::RetryAfter { attempt, delay } => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "push failed, retry scheduled"
                );
                self.retry_deadline = Some(Instant::now() + delay);
                self.shared.stats.write().retries_scheduled += 1;
            }
            RetryDecision::GiveUp { attempts } => {
                error!(attempts, error = %err, "push failed, giving up");
                self.retry_deadline = None;
                self.set_status(SyncStatus::Error(err.user_message()));
            }
        }
        self.publish_retry_attempt();
    }

    /// Reconciles remote state with the local store.
    ///
    /// Pending conflicts survive the pull unless it read both versions and
    /// found them equal; a fresh detection for the same id replaces them.
    fn pull_cycle(&mut self) {
        if !self.is_enabled() {
            debug!("sync disabled, skipping pull");
            return;
        }
        if !self.shared.reachability.is_online() {
            debug!("offline, skipping pull");
            return;
        }

        self.set_status(SyncStatus::Syncing);
        let manifest = match self.store.fetch_manifest() {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                debug!("no remote manifest, nothing to pull");
                self.shared.stats.write().pulls_completed += 1;
                self.set_pull_at_rest();
                return;
            }
            Err(e) => {
                error!(error = %e, "pull could not read the remote manifest");
                self.fail_pull(e);
                return;
            }
        };
        let local = match self.local.all_records() {
            Ok(records) => records,
            Err(e) => {
                let err = SyncError::from(e);
                error!(error = %err, "pull could not read local records");
                self.fail_pull(err);
                return;
            }
        };

        let detection = detect_conflicts(&local, manifest.ids(), &self.store);
        let mut settled: HashSet<String> = detection.settled.into_iter().collect();
        let mut imported = 0u64;
        let mut import_error = None;
        for record in detection.imports {
            let record_id = record.id().to_string();
            match self.local.add_record(record) {
                Ok(()) => {
                    info!(record_id = %record_id, "imported remote record");
                    imported += 1;
                    settled.insert(record_id);
                }
                Err(e) => {
                    warn!(record_id = %record_id, error = %e, "could not import remote record");
                    import_error = Some(SyncError::from(e));
                }
            }
        }

        let detected = detection.conflicts.len();
        for conflict in &detection.conflicts {
            info!(record_id = %conflict.record_id, "conflict detected");
        }
        let previous = self.shared.conflicts.read().clone();
        let mut conflicts = detection.conflicts;
        for conflict in previous {
            if settled.contains(&conflict.record_id) {
                info!(record_id = %conflict.record_id, "conflict superseded, versions now equal");
            } else if !conflicts.iter().any(|c| c.record_id == conflict.record_id) {
                conflicts.push(conflict);
            }
        }
        let pending = conflicts.len();
        *self.shared.conflicts.write() = conflicts;

        {
            let mut stats = self.shared.stats.write();
            stats.pulls_completed += 1;
            stats.records_imported += imported;
            stats.conflicts_detected += detected as u64;
            if import_error.is_none() {
                stats.last_sync_time = Some(std::time::Instant::now());
            }
        }

        if let Some(err) = import_error {
            self.fail_pull(err);
        } else if self.retry_deadline.is_some() {
            self.set_status(SyncStatus::Syncing);
        } else if pending == 0 {
            info!(imported, "pull completed");
            self.set_success();
        } else {
            info!(imported, conflicts = pending, "pull completed with conflicts");
            self.set_status(SyncStatus::Idle);
        }
    }

    fn fail_pull(&mut self, err: SyncError) {
        self.shared.stats.write().last_error = Some(err.to_string());
        self.set_status(SyncStatus::Error(err.user_message()));
    }

    fn set_pull_at_rest(&mut self) {
        if self.retry_deadline.is_some() {
            self.set_status(SyncStatus::Syncing);
        } else {
            self.set_status(SyncStatus::Idle);
        }
    }

    fn resolve(&mut self, record_id: &str, keep_local: bool) -> ResolveOutcome {
        let conflict = self
            .shared
            .conflicts
            .read()
            .iter()
            .find(|c| c.record_id == record_id)
            .cloned();
        let Some(conflict) = conflict else {
            debug!(record_id, "no pending conflict");
            return ResolveOutcome::NotPending;
        };

        let resolution = ConflictResolution::from_keep_local(keep_local);
        let winner = conflict.winner(resolution).clone();
        let result = match resolution {
            ConflictResolution::KeepLocal => self.store.put(&winner).map(|()| {
                self.store.flush();
            }),
            ConflictResolution::AcceptRemote => {
                self.local.upsert_record(winner).map_err(SyncError::from)
            }
        };

        match result {
            Ok(()) => {
                self.shared
                    .conflicts
                    .write()
                    .retain(|c| c.record_id != record_id);
                self.shared.stats.write().conflicts_resolved += 1;
                info!(record_id, ?resolution, "conflict resolved");
                if self.status().error_message().is_some() {
                    self.set_status(SyncStatus::Idle);
                }
                ResolveOutcome::Resolved
            }
            Err(e) => {
                error!(record_id, ?resolution, error = %e, "conflict resolution failed");
                let message = e.user_message();
                self.shared.stats.write().last_error = Some(e.to_string());
                self.set_status(SyncStatus::Error(message.clone()));
                ResolveOutcome::Failed(message)
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    fn status(&self) -> SyncStatus {
        self.shared.status.borrow().clone()
    }

    fn set_status(&mut self, status: SyncStatus) {
        if status != SyncStatus::Success {
            self.decay_deadline = None;
        }
        let previous = self.shared.status.send_replace(status.clone());
        if previous != status {
            debug!(from = %previous, to = %status, "status changed");
        }
    }

    fn set_success(&mut self) {
        self.set_status(SyncStatus::Success);
        self.decay_deadline = Some(Instant::now() + self.config.success_decay);
    }

    fn publish_retry_attempt(&self) {
        self.shared
            .retry_attempt
            .store(self.retry.attempt(), Ordering::SeqCst);
    }
}

/// Runs store calls, which may block on disk or network I/O.
///
/// On a multi-thread runtime the worker hands its other tasks off first.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

/// Sleeps until the deadline, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
