//! Vocab-Sweep: a polite vocabulary sweeper for autocomplete endpoints
//!
//! This crate enumerates every entry an autocomplete service exposes when the
//! service caps each answer at K suggestions. Truncated answers are narrowed by
//! extending the prefix and re-querying, while an adaptive rate governor keeps
//! the crawl under the endpoint's rate limit and checkpoints make it resumable.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Vocab-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("No checkpoint found at {0}")]
    MissingCheckpoint(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid alphabet: {0}")]
    InvalidAlphabet(String),
}

/// Result type alias for Vocab-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::ResultCache;
pub use config::Config;
pub use crawler::{AutocompleteService, Coordinator, CrawlReport, ServiceResponse};
pub use state::{CrawlState, Prefix, QueryResult};
pub use storage::{CheckpointStore, JsonCheckpointStore};
