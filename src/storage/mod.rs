//! Storage module for persisting sweep progress
//!
//! This module handles checkpoint persistence, including:
//! - The `CheckpointStore` trait implemented by storage backends
//! - A JSON file backend with atomic (write-temp-then-rename) saves
//! - The atomic write helper shared with the final artifact writer

mod json;
mod traits;

pub use json::{write_atomic, JsonCheckpointStore};
pub use traits::{CheckpointStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the JSON checkpoint store at the given path
pub fn open_checkpoint_store(path: &Path) -> JsonCheckpointStore {
    JsonCheckpointStore::new(path)
}
