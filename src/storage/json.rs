//! JSON file checkpoint backend

use crate::state::{CrawlState, CHECKPOINT_VERSION};
use crate::storage::{CheckpointStore, StorageError, StorageResult};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Checkpoint store backed by a single JSON document
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> StorageResult<Option<CrawlState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&self.path, e)),
        };

        let state: CrawlState = serde_json::from_str(&content)?;
        if state.version != CHECKPOINT_VERSION {
            return Err(StorageError::VersionMismatch {
                found: state.version,
                expected: CHECKPOINT_VERSION,
            });
        }

        tracing::debug!(
            "Loaded checkpoint from {} ({} entries, {} cached prefixes)",
            self.path.display(),
            state.entries.len(),
            state.cache.len()
        );
        Ok(Some(state))
    }

    fn save(&self, state: &CrawlState) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &bytes)
    }

    fn clear(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.path, e)),
        }
    }
}

/// Writes `bytes` to `path` through a temporary sibling file and a rename
///
/// The temporary file is flushed to disk before the rename, so readers only
/// ever observe the old content or the complete new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_error(&tmp_path, e));
    }

    fs::rename(&tmp_path, path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
