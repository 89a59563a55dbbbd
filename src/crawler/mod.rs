//! Crawler module for prefix-space sweeping
//!
//! This module contains the core sweeping logic, including:
//! - The autocomplete service abstraction and its HTTP client
//! - Adaptive rate governing (pacing plus a concurrency permit pool)
//! - Query execution with bounded retry and backoff
//! - The frontier of pending prefixes and its expansion policy
//! - Overall sweep coordination

mod coordinator;
mod executor;
mod fetcher;
mod frontier;
mod governor;

pub use coordinator::{Coordinator, CrawlReport};
pub use executor::{QueryExecutor, QueryOutcome, RetryAction, RetryPolicy, RetryState};
pub use fetcher::{build_http_client, AutocompleteService, HttpAutocompleteClient, ServiceResponse};
pub use frontier::{seed_prefixes, Expansion, Frontier};
pub use governor::{Clearance, RateGovernor};

use crate::config::Config;
use crate::storage::open_checkpoint_store;
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete sweep against the configured HTTP endpoint
///
/// This is the main entry point for starting a sweep. It will:
/// 1. Build the HTTP client for the configured service
/// 2. Open the JSON checkpoint store (cleared when `fresh`)
/// 3. Resume or seed the frontier
/// 4. Query prefixes until the frontier drains or `cancel` fires
/// 5. Write the final checkpoint and the sorted artifact
///
/// # Arguments
///
/// * `config` - The sweep configuration
/// * `config_hash` - Hash of the configuration file, recorded in checkpoints
/// * `fresh` - Whether to discard an existing checkpoint
/// * `cancel` - Token that triggers graceful shutdown
///
/// # Example
///
/// ```no_run
/// use vocab_sweep::config::load_config_with_hash;
/// use vocab_sweep::crawler::run_sweep;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let report = run_sweep(config, Some(hash), false, CancellationToken::new()).await?;
/// println!("{} entries", report.entries);
/// # Ok(())
/// # }
/// ```
pub async fn run_sweep(
    config: Config,
    config_hash: Option<String>,
    fresh: bool,
    cancel: CancellationToken,
) -> Result<CrawlReport> {
    let service = HttpAutocompleteClient::new(&config.service)?;
    let store = open_checkpoint_store(Path::new(&config.output.checkpoint_path));

    let mut coordinator = Coordinator::new(config, Arc::new(service), Arc::new(store), fresh)?
        .with_cancellation(cancel);
    if let Some(hash) = config_hash {
        coordinator = coordinator.with_config_hash(hash);
    }

    coordinator.run().await
}
