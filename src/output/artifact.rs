//! Final artifact: the sorted list of discovered entries

use crate::storage::{write_atomic, StorageResult};
use std::collections::BTreeSet;
use std::path::Path;

/// Writes the entries as a sorted JSON array
///
/// The write goes through a temporary file and a rename, so an interrupted
/// write never leaves a truncated artifact behind.
///
/// # Arguments
///
/// * `path` - Destination file
/// * `entries` - The discovered entries (a set, so already unique and sorted)
pub fn write_artifact(path: &Path, entries: &BTreeSet<String>) -> StorageResult<()> {
    let sorted: Vec<&String> = entries.iter().collect();
    let bytes = serde_json::to_vec_pretty(&sorted)?;
    write_atomic(path, &bytes)?;
    tracing::info!("Saved {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Reads an artifact back into a sorted list
pub fn read_artifact(path: &Path) -> StorageResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        crate::storage::StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    })?;
    Ok(serde_json::from_str(&content)?)
}
