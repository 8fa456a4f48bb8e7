//! The sync manifest.

use crate::codec::{from_cbor, to_cbor};
use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};

/// The set of record ids considered synced, plus the enabled flag.
///
/// The manifest is stored both locally and remotely under
/// [`MANIFEST_KEY`](crate::MANIFEST_KEY).
///
/// # Invariants
///
/// - `synced_record_ids` never contains duplicates
/// - Ids keep insertion order, but only membership is meaningful
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawManifest")]
pub struct SyncManifest {
    /// Whether sync is enabled.
    pub enabled: bool,
    synced_record_ids: Vec<String>,
}

/// Wire shape of a manifest before the id list is de-duplicated.
#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    synced_record_ids: Vec<String>,
}

impl From<RawManifest> for SyncManifest {
    fn from(raw: RawManifest) -> Self {
        Self::with_ids(raw.enabled, raw.synced_record_ids)
    }
}

impl SyncManifest {
    /// Creates an empty manifest.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            synced_record_ids: Vec::new(),
        }
    }

    /// Creates a manifest from a list of ids, dropping duplicates.
    pub fn with_ids<I, S>(enabled: bool, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut manifest = Self::new(enabled);
        manifest.set_ids(ids);
        manifest
    }

    /// Returns the synced ids in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.synced_record_ids
    }

    /// Replaces the id list, dropping duplicates.
    pub fn set_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synced_record_ids.clear();
        for id in ids {
            self.insert(id);
        }
    }

    /// Returns true if the id is synced.
    pub fn contains(&self, id: &str) -> bool {
        self.synced_record_ids.iter().any(|s| s == id)
    }

    /// Adds an id. Returns false if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.synced_record_ids.push(id);
        true
    }

    /// Removes an id. Returns false if it was not present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.synced_record_ids.len();
        self.synced_record_ids.retain(|s| s != id);
        self.synced_record_ids.len() != before
    }

    /// Returns the number of synced ids.
    pub fn len(&self) -> usize {
        self.synced_record_ids.len()
    }

    /// Returns true if no ids are synced.
    pub fn is_empty(&self) -> bool {
        self.synced_record_ids.is_empty()
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    ///
    /// Duplicate ids written by an older or misbehaving peer are collapsed.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }
}
