//! Remote key scheme.

/// Remote key holding the encoded [`SyncManifest`](crate::SyncManifest).
pub const MANIFEST_KEY: &str = "vendorsync.manifest";

/// Prefix of every remote record key.
pub const RECORD_KEY_PREFIX: &str = "vendorsync.record.";

/// Returns the remote key for a record id.
pub fn record_key(id: &str) -> String {
    format!("{RECORD_KEY_PREFIX}{id}")
}

/// Extracts the record id from a remote key, if it is a record key.
pub fn record_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(RECORD_KEY_PREFIX).filter(|id| !id.is_empty())
}
