//! Inspect command implementation.

use super::Stores;
use serde::Serialize;
use std::sync::Arc;
use vendorsync_engine::{detect_conflicts, ConfigStore, RecordStore, RemoteKeyValueStore};
use vendorsync_protocol::record_id_from_key;

/// Local and remote state side by side.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Local configuration path.
    pub local_path: String,
    /// Remote store path.
    pub remote_path: String,
    /// Enabled flag in the local manifest.
    pub local_enabled: bool,
    /// Local records.
    pub local_records: Vec<RecordSummary>,
    /// Remote manifest, if one has been pushed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_manifest: Option<ManifestSummary>,
    /// Ids of every record stored remotely.
    pub remote_record_ids: Vec<String>,
    /// Ids a pull would import.
    pub would_import: Vec<String>,
    /// Ids that differ on both sides.
    pub conflicts: Vec<ConflictSummary>,
    /// Local ids missing from the remote manifest.
    pub unsynced: Vec<String>,
}

/// Summary of one record.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    /// Record id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Number of fields.
    pub field_count: usize,
}

/// Summary of the remote manifest.
#[derive(Debug, Serialize)]
pub struct ManifestSummary {
    /// Enabled flag.
    pub enabled: bool,
    /// Synced ids.
    pub record_ids: Vec<String>,
}

/// Summary of one conflict.
#[derive(Debug, Serialize)]
pub struct ConflictSummary {
    /// Record id.
    pub id: String,
    /// Fields whose values differ.
    pub changed_fields: Vec<String>,
    /// Whether the names differ.
    pub renamed: bool,
}

/// Runs the inspect command.
pub fn run(stores: &Stores, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(stores)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

/// Gathers local and remote state without changing either side.
pub fn collect(stores: &Stores) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let records = stores.local.all_records()?;
    let local_manifest = stores.local.load_manifest()?;
    let store = RecordStore::new(Arc::clone(&stores.remote));
    let remote_manifest = store.get_manifest();

    let mut remote_record_ids: Vec<String> = stores
        .remote
        .keys()?
        .iter()
        .filter_map(|key| record_id_from_key(key).map(str::to_string))
        .collect();
    remote_record_ids.sort();

    let synced_ids = remote_manifest
        .as_ref()
        .map(|m| m.ids().to_vec())
        .unwrap_or_default();
    let detection = detect_conflicts(&records, &synced_ids, &store);

    let result = InspectResult {
        local_path: stores.local.path().display().to_string(),
        remote_path: stores.remote.root().display().to_string(),
        local_enabled: local_manifest.enabled,
        local_records: records
            .iter()
            .map(|r| RecordSummary {
                id: r.id().to_string(),
                name: r.name().to_string(),
                field_count: r.fields().len(),
            })
            .collect(),
        unsynced: records
            .iter()
            .filter(|r| !synced_ids.iter().any(|id| id == r.id()))
            .map(|r| r.id().to_string())
            .collect(),
        remote_manifest: remote_manifest.map(|m| ManifestSummary {
            enabled: m.enabled,
            record_ids: m.ids().to_vec(),
        }),
        remote_record_ids,
        would_import: detection
            .imports
            .iter()
            .map(|r| r.id().to_string())
            .collect(),
        conflicts: detection
            .conflicts
            .iter()
            .map(|c| ConflictSummary {
                id: c.record_id.clone(),
                changed_fields: c.changed_fields(),
                renamed: c.is_rename(),
            })
            .collect(),
    };
    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("VendorSync Inspection");
    println!("=====================");
    println!();
    println!("Local:  {}", result.local_path);
    println!("Remote: {}", result.remote_path);
    println!();
    println!(
        "Sync: {}",
        if result.local_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Local records ({}):", result.local_records.len());
    for record in &result.local_records {
        println!(
            "  {} - {} ({} fields)",
            record.id, record.name, record.field_count
        );
    }
    println!();
    match &result.remote_manifest {
        Some(manifest) => {
            println!(
                "Remote manifest: {} ids, {}",
                manifest.record_ids.len(),
                if manifest.enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            for id in &manifest.record_ids {
                println!("  {id}");
            }
        }
        None => println!("Remote manifest: none"),
    }
    println!("Remote records: {}", result.remote_record_ids.len());

    println!();
    println!("Differences:");
    print_ids("  Would import", &result.would_import);
    print_ids("  Not yet pushed", &result.unsynced);
    if result.conflicts.is_empty() {
        println!("  Conflicts: none");
    } else {
        println!("  Conflicts:");
        for conflict in &result.conflicts {
            let rename = if conflict.renamed { " [renamed]" } else { "" };
            println!(
                "    {}: {}{}",
                conflict.id,
                conflict.changed_fields.join(", "),
                rename
            );
        }
    }
}

fn print_ids(label: &str, ids: &[String]) {
    if ids.is_empty() {
        println!("{label}: none");
    } else {
        println!("{label}: {}", ids.join(", "));
    }
}
