//! Remote key-value store abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use vendorsync_protocol::{record_key, Record, SyncManifest, MANIFEST_KEY};

/// A cloud key-value store shared by all devices of one account.
///
/// The store is eventually consistent and holds opaque bytes. Writes become
/// visible to other devices at some later point; the host forwards the
/// store's "changed externally" notification to
/// [`SyncHandle::on_remote_change`](crate::SyncHandle::on_remote_change).
///
/// Methods are synchronous and are called from the controller task. On a
/// multi-thread runtime the controller wraps them in
/// `tokio::task::block_in_place`; on a current-thread runtime they block the
/// whole runtime, so implementations should return promptly.
pub trait RemoteKeyValueStore: Send + Sync {
    /// Stores a value. `None` removes the key.
    fn set(&self, key: &str, value: Option<Vec<u8>>) -> SyncResult<()>;

    /// Reads a value.
    fn get(&self, key: &str) -> SyncResult<Option<Vec<u8>>>;

    /// Removes a key.
    fn remove(&self, key: &str) -> SyncResult<()> {
        self.set(key, None)
    }

    /// Asks the store to flush pending writes. Returns false if the flush
    /// could not be scheduled.
    fn synchronize(&self) -> bool;

    /// Lists all keys currently held.
    fn keys(&self) -> SyncResult<Vec<String>>;
}

/// An in-memory remote store.
///
/// Share one instance between several controllers (behind an `Arc`) to
/// simulate multiple devices. Failure injection and write counters make it
/// the store of choice for tests.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    flush_result: AtomicBool,
    writes: Mutex<HashMap<String, usize>>,
    write_attempts: AtomicUsize,
    reads: AtomicUsize,
    flushes: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            flush_result: AtomicBool::new(true),
            writes: Mutex::new(HashMap::new()),
            write_attempts: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent write fail with a retryable transport error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent read fail with a retryable transport error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Sets the value returned by [`RemoteKeyValueStore::synchronize`].
    pub fn set_flush_result(&self, result: bool) {
        self.flush_result.store(result, Ordering::SeqCst);
    }

    /// Stores a record under its key, bypassing failure injection.
    pub fn seed_record(&self, record: &Record) {
        if let Ok(bytes) = record.encode() {
            self.data.write().insert(record_key(record.id()), bytes);
        }
    }

    /// Stores a manifest, bypassing failure injection.
    pub fn seed_manifest(&self, manifest: &SyncManifest) {
        if let Ok(bytes) = manifest.encode() {
            self.data.write().insert(MANIFEST_KEY.to_string(), bytes);
        }
    }

    /// Stores raw bytes, bypassing failure injection.
    pub fn seed_raw(&self, key: &str, bytes: Vec<u8>) {
        self.data.write().insert(key.to_string(), bytes);
    }

    /// Decodes the record stored for an id.
    pub fn record(&self, id: &str) -> Option<Record> {
        let data = self.data.read();
        data.get(&record_key(id)).and_then(|b| Record::decode(b).ok())
    }

    /// Decodes the stored manifest.
    pub fn manifest(&self) -> Option<SyncManifest> {
        let data = self.data.read();
        data.get(MANIFEST_KEY)
            .and_then(|b| SyncManifest::decode(b).ok())
    }

    /// Returns the number of successful writes to a key.
    pub fn write_count(&self, key: &str) -> usize {
        self.writes.lock().get(key).copied().unwrap_or(0)
    }

    /// Returns the number of write calls, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Returns the number of read calls.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Returns the number of flush calls.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteKeyValueStore for MemoryRemoteStore {
    fn set(&self, key: &str, value: Option<Vec<u8>>) -> SyncResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable(format!(
                "write to '{key}' failed"
            )));
        }

        {
            let mut data = self.data.write();
            match value {
                Some(bytes) => {
                    data.insert(key.to_string(), bytes);
                }
                None => {
                    data.remove(key);
                }
            }
        }
        *self.writes.lock().entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn get(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable(format!(
                "read of '{key}' failed"
            )));
        }
        Ok(self.data.read().get(key).cloned())
    }

    fn synchronize(&self) -> bool {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.flush_result.load(Ordering::SeqCst)
    }

    fn keys(&self) -> SyncResult<Vec<String>> {
        Ok(self.data.read().keys().cloned().collect())
    }
}

/// A remote store backed by a directory, one file per key.
///
/// Useful as a stand-in for the cloud store when several processes on one
/// machine (or a synced folder) should see the same data.
#[derive(Debug, Clone)]
pub struct DirRemoteStore {
    root: PathBuf,
}

impl DirRemoteStore {
    /// Opens (and creates if needed) a directory-backed store.
    pub fn open(root: impl Into<PathBuf>) -> SyncResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the backing directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(escape_key(key))
    }
}

impl RemoteKeyValueStore for DirRemoteStore {
    fn set(&self, key: &str, value: Option<Vec<u8>>) -> SyncResult<()> {
        let path = self.path_for(key);
        match value {
            Some(bytes) => {
                let tmp = self.root.join(format!("~{}", escape_key(key)));
                std::fs::write(&tmp, bytes)
                    .and_then(|()| std::fs::rename(&tmp, &path))
                    .map_err(|e| SyncError::transport_retryable(e.to_string()))
            }
            None => match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(SyncError::transport_retryable(e.to_string())),
            },
        }
    }

    fn get(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::transport_retryable(e.to_string())),
        }
    }

    fn synchronize(&self) -> bool {
        self.root.is_dir()
    }

    fn keys(&self) -> SyncResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('~') {
                continue;
            }
            if let Some(key) = unescape_key(name) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Escapes a key into a portable file name (`%XX` for anything outside
/// `[A-Za-z0-9._-]`).
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
