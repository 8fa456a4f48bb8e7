//! Conflict detection and resolution types.

use crate::record::Record;

/// A divergence between the local and remote version of one record.
///
/// A conflict only exists when both versions are present and structurally
/// unequal; use [`Conflict::between`] to enforce that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Id of the diverging record.
    pub record_id: String,
    /// The version held by the local configuration store.
    pub local: Record,
    /// The version held by the remote store.
    pub remote: Record,
}

impl Conflict {
    /// Creates a conflict if the two versions differ.
    ///
    /// Returns `None` when the versions are equal or do not share an id.
    pub fn between(local: Record, remote: Record) -> Option<Self> {
        if local == remote || local.id() != remote.id() {
            return None;
        }
        Some(Self {
            record_id: local.id().to_string(),
            local,
            remote,
        })
    }

    /// Returns the field keys that differ between the two versions.
    pub fn changed_fields(&self) -> Vec<String> {
        self.local.changed_fields(&self.remote)
    }

    /// Returns true if the display names differ.
    pub fn is_rename(&self) -> bool {
        self.local.name() != self.remote.name()
    }

    /// Returns the version that survives the given resolution.
    pub fn winner(&self, resolution: ConflictResolution) -> &Record {
        match resolution {
            ConflictResolution::KeepLocal => &self.local,
            ConflictResolution::AcceptRemote => &self.remote,
        }
    }
}

/// Resolution for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Keep the local version and overwrite the remote one.
    KeepLocal,
    /// Accept the remote version into the local store.
    AcceptRemote,
}

impl ConflictResolution {
    /// Maps the `keep_local` flag used by resolution APIs.
    pub fn from_keep_local(keep_local: bool) -> Self {
        if keep_local {
            ConflictResolution::KeepLocal
        } else {
            ConflictResolution::AcceptRemote
        }
    }

    /// Returns true for [`ConflictResolution::KeepLocal`].
    pub fn keeps_local(&self) -> bool {
        matches!(self, ConflictResolution::KeepLocal)
    }
}
