//! Local configuration store.
//!
//! The configuration store owns the authoritative local copy of every
//! record, the current-selection pointer, favorite markers and the local
//! copy of the sync manifest. The sync engine only reads and writes record
//! copies through the [`ConfigStore`] trait.

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use vendorsync_protocol::{Record, SyncManifest};

/// Durable local storage of configuration records.
///
/// Called synchronously from the controller task, under the same blocking
/// rules as [`RemoteKeyValueStore`](crate::RemoteKeyValueStore).
pub trait ConfigStore: Send + Sync {
    /// Returns every record in display order.
    fn all_records(&self) -> StoreResult<Vec<Record>>;

    /// Returns one record.
    fn get_record(&self, id: &str) -> StoreResult<Option<Record>>;

    /// Adds a new record. Fails with `AlreadyExists` if the id is taken.
    fn add_record(&self, record: Record) -> StoreResult<()>;

    /// Replaces an existing record. Fails with `NotFound` if it is missing.
    fn update_record(&self, record: Record) -> StoreResult<()>;

    /// Deletes a record. Fails with `LastRecord` when it is the only one.
    fn delete_record(&self, id: &str) -> StoreResult<()>;

    /// Loads the local copy of the sync manifest.
    fn load_manifest(&self) -> StoreResult<SyncManifest>;

    /// Saves the local copy of the sync manifest.
    fn save_manifest(&self, manifest: &SyncManifest) -> StoreResult<()>;

    /// Updates the record if it exists, adds it otherwise.
    fn upsert_record(&self, record: Record) -> StoreResult<()> {
        match self.update_record(record.clone()) {
            Err(StoreError::NotFound(_)) => self.add_record(record),
            other => other,
        }
    }
}

/// The persisted local state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Records in display order.
    #[serde(default)]
    pub records: Vec<Record>,
    /// Id of the currently selected record.
    #[serde(default)]
    pub current: Option<String>,
    /// Ids marked as favorite.
    #[serde(default)]
    pub favorites: Vec<String>,
    /// Local copy of the sync manifest.
    #[serde(default)]
    pub manifest: SyncManifest,
}

impl ConfigDocument {
    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    fn get(&self, id: &str) -> Option<Record> {
        self.position(id).map(|i| self.records[i].clone())
    }

    fn add(&mut self, record: Record) -> StoreResult<()> {
        if self.position(record.id()).is_some() {
            return Err(StoreError::AlreadyExists(record.id().to_string()));
        }
        if self.current.is_none() {
            self.current = Some(record.id().to_string());
        }
        self.records.push(record);
        Ok(())
    }

    fn update(&mut self, record: Record) -> StoreResult<()> {
        let index = self
            .position(record.id())
            .ok_or_else(|| StoreError::NotFound(record.id().to_string()))?;
        self.records[index] = record;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> StoreResult<()> {
        let index = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if self.records.len() == 1 {
            return Err(StoreError::LastRecord(id.to_string()));
        }
        self.records.remove(index);
        self.favorites.retain(|f| f != id);
        if self.current.as_deref() == Some(id) {
            self.current = self.records.first().map(|r| r.id().to_string());
        }
        Ok(())
    }

    fn select(&mut self, id: &str) -> StoreResult<()> {
        if self.position(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.current = Some(id.to_string());
        Ok(())
    }

    fn set_favorite(&mut self, id: &str, favorite: bool) -> StoreResult<()> {
        if self.position(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.favorites.retain(|f| f != id);
        if favorite {
            self.favorites.push(id.to_string());
        }
        Ok(())
    }
}

/// An in-memory configuration store.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    document: RwLock<ConfigDocument>,
    fail_writes: AtomicBool,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given records.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> StoreResult<Self> {
        let store = Self::new();
        for record in records {
            store.add_record(record)?;
        }
        Ok(store)
    }

    /// Makes every subsequent write fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the currently selected record id.
    pub fn current_record_id(&self) -> Option<String> {
        self.document.read().current.clone()
    }

    /// Selects a record.
    pub fn select(&self, id: &str) -> StoreResult<()> {
        self.document.write().select(id)
    }

    /// Returns the favorite ids.
    pub fn favorites(&self) -> Vec<String> {
        self.document.read().favorites.clone()
    }

    /// Marks or unmarks a record as favorite.
    pub fn set_favorite(&self, id: &str, favorite: bool) -> StoreResult<()> {
        self.document.write().set_favorite(id, favorite)
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("store is read-only".into()));
        }
        Ok(())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn all_records(&self) -> StoreResult<Vec<Record>> {
        Ok(self.document.read().records.clone())
    }

    fn get_record(&self, id: &str) -> StoreResult<Option<Record>> {
        Ok(self.document.read().get(id))
    }

    fn add_record(&self, record: Record) -> StoreResult<()> {
        self.check_writable()?;
        self.document.write().add(record)
    }

    fn update_record(&self, record: Record) -> StoreResult<()> {
        self.check_writable()?;
        self.document.write().update(record)
    }

    fn delete_record(&self, id: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.document.write().delete(id)
    }

    fn load_manifest(&self) -> StoreResult<SyncManifest> {
        Ok(self.document.read().manifest.clone())
    }

    fn save_manifest(&self, manifest: &SyncManifest) -> StoreResult<()> {
        self.check_writable()?;
        self.document.write().manifest = manifest.clone();
        Ok(())
    }
}

/// A configuration store persisted as one JSON document.
///
/// Every mutation rewrites the file (write to a sibling temp file, then
/// rename), so a crash never leaves a half-written document behind.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    document: RwLock<ConfigDocument>,
}

impl FileConfigStore {
    /// Opens a store, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let document = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Storage(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigDocument::default(),
            Err(e) => return Err(StoreError::Storage(e.to_string())),
        };
        Ok(Self {
            path,
            document: RwLock::new(document),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the currently selected record id.
    pub fn current_record_id(&self) -> Option<String> {
        self.document.read().current.clone()
    }

    /// Selects a record.
    pub fn select(&self, id: &str) -> StoreResult<()> {
        self.mutate(|doc| doc.select(id))
    }

    /// Returns the favorite ids.
    pub fn favorites(&self) -> Vec<String> {
        self.document.read().favorites.clone()
    }

    /// Marks or unmarks a record as favorite.
    pub fn set_favorite(&self, id: &str, favorite: bool) -> StoreResult<()> {
        self.mutate(|doc| doc.set_favorite(id, favorite))
    }

    /// Applies a change to a copy of the document and persists it; the
    /// in-memory state only changes once the file is written.
    fn mutate<F>(&self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut ConfigDocument) -> StoreResult<()>,
    {
        let mut document = self.document.write();
        let mut next = document.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *document = next;
        Ok(())
    }

    fn persist(&self, document: &ConfigDocument) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| StoreError::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl ConfigStore for FileConfigStore {
    fn all_records(&self) -> StoreResult<Vec<Record>> {
        Ok(self.document.read().records.clone())
    }

    fn get_record(&self, id: &str) -> StoreResult<Option<Record>> {
        Ok(self.document.read().get(id))
    }

    fn add_record(&self, record: Record) -> StoreResult<()> {
        self.mutate(|doc| doc.add(record))
    }

    fn update_record(&self, record: Record) -> StoreResult<()> {
        self.mutate(|doc| doc.update(record))
    }

    fn delete_record(&self, id: &str) -> StoreResult<()> {
        self.mutate(|doc| doc.delete(id))
    }

    fn load_manifest(&self) -> StoreResult<SyncManifest> {
        Ok(self.document.read().manifest.clone())
    }

    fn save_manifest(&self, manifest: &SyncManifest) -> StoreResult<()> {
        self.mutate(|doc| {
            doc.manifest = manifest.clone();
            Ok(())
        })
    }
}
