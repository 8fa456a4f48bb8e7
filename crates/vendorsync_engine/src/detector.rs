//! Local/remote conflict detection.

use crate::adapter::RecordStore;
use crate::remote::RemoteKeyValueStore;
use std::collections::HashMap;
use vendorsync_protocol::{Conflict, Record};

/// Outcome of comparing local records against the remote store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// Records that diverge and need a user decision, in manifest order.
    pub conflicts: Vec<Conflict>,
    /// Remote records missing locally, to be added without a conflict.
    pub imports: Vec<Record>,
    /// Ids read remotely and found equal to the local record.
    pub settled: Vec<String>,
}

impl Detection {
    /// Returns true if nothing needs to be imported or resolved.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.imports.is_empty()
    }
}

/// Compares every synced id against the remote store.
///
/// For each id in `synced_ids` (one remote read per id):
/// - remote absent: skip, whether or not a local copy exists
/// - remote present, local absent: import
/// - both present and equal: skip, listed as settled
/// - both present and different: conflict
///
/// The caller must not run this concurrently with a push.
pub fn detect_conflicts<R: RemoteKeyValueStore>(
    local: &[Record],
    synced_ids: &[String],
    store: &RecordStore<R>,
) -> Detection {
    let by_id: HashMap<&str, &Record> = local.iter().map(|r| (r.id(), r)).collect();
    let mut detection = Detection::default();

    for id in synced_ids {
        let Some(remote) = store.get(id) else {
            continue;
        };
        match by_id.get(id.as_str()) {
            None => detection.imports.push(remote),
            Some(local) => match Conflict::between((*local).clone(), remote) {
                Some(conflict) => detection.conflicts.push(conflict),
                None => detection.settled.push(id.clone()),
            },
        }
    }

    detection
}
