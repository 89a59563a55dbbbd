//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::CrawlState;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported checkpoint version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// `save` must be atomic: after a crash mid-save, `load` returns either the
/// previous checkpoint or the new one, never a torn mix.
pub trait CheckpointStore: Send + Sync {
    /// Loads the last saved state, or `None` if nothing was saved yet
    fn load(&self) -> StorageResult<Option<CrawlState>>;

    /// Persists the full state, replacing the previous checkpoint
    fn save(&self, state: &CrawlState) -> StorageResult<()>;

    /// Removes any saved state (used for fresh sweeps)
    fn clear(&self) -> StorageResult<()>;
}
