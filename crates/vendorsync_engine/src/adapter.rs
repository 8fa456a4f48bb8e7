//! Typed access to records and the manifest in the remote store.

use crate::error::SyncResult;
use crate::remote::RemoteKeyValueStore;
use std::sync::Arc;
use tracing::{debug, warn};
use vendorsync_protocol::{record_key, Record, SyncManifest, MANIFEST_KEY};

/// Reads and writes [`Record`]s and the [`SyncManifest`] against a
/// [`RemoteKeyValueStore`].
///
/// Record reads never fail: a missing key, a transport error or a malformed
/// payload all come back as `None` (the latter two are logged).
/// [`RecordStore::fetch_manifest`] is the exception and reports transport
/// errors, so a pull can tell an empty remote from an unreachable one.
/// Writes propagate their errors so the controller can schedule a retry.
pub struct RecordStore<R: RemoteKeyValueStore> {
    remote: Arc<R>,
}

impl<R: RemoteKeyValueStore> RecordStore<R> {
    /// Creates an adapter over a remote store.
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// Writes a record under its key.
    pub fn put(&self, record: &Record) -> SyncResult<()> {
        let bytes = record.encode()?;
        self.remote.set(&record_key(record.id()), Some(bytes))
    }

    /// Reads the record stored for an id.
    pub fn get(&self, id: &str) -> Option<Record> {
        let key = record_key(id);
        let bytes = self.read(&key)?;
        match Record::decode(&bytes) {
            Ok(record) if record.id() == id => Some(record),
            Ok(record) => {
                warn!(key = %key, found = record.id(), "remote record id does not match its key");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "malformed remote record, treating as absent");
                None
            }
        }
    }

    /// Writes the manifest.
    pub fn put_manifest(&self, manifest: &SyncManifest) -> SyncResult<()> {
        let bytes = manifest.encode()?;
        self.remote.set(MANIFEST_KEY, Some(bytes))
    }

    /// Reads the manifest.
    pub fn get_manifest(&self) -> Option<SyncManifest> {
        self.fetch_manifest().unwrap_or_else(|e| {
            warn!(error = %e, "remote manifest read failed, treating as absent");
            None
        })
    }

    /// Reads the manifest, reporting transport failures.
    ///
    /// A missing key or a malformed payload is `Ok(None)`.
    pub fn fetch_manifest(&self) -> SyncResult<Option<SyncManifest>> {
        let Some(bytes) = self.remote.get(MANIFEST_KEY)? else {
            debug!("remote manifest absent");
            return Ok(None);
        };
        match SyncManifest::decode(&bytes) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) => {
                warn!(error = %e, "malformed remote manifest, treating as absent");
                Ok(None)
            }
        }
    }

    /// Asks the remote store to flush. A false return is logged and
    /// otherwise ignored; the written values stay in place.
    pub fn flush(&self) -> bool {
        let flushed = self.remote.synchronize();
        if !flushed {
            warn!("remote store could not schedule a flush");
        }
        flushed
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        match self.remote.get(key) {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                debug!(key, "remote key absent");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "remote read failed, treating as absent");
                None
            }
        }
    }
}
