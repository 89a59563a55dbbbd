//! Vocab-Sweep main entry point
//!
//! This is the command-line interface for the Vocab-Sweep autocomplete sweeper.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vocab_sweep::config::{load_config_with_hash, Config};
use vocab_sweep::crawler::{run_sweep, seed_prefixes};
use vocab_sweep::output::{load_statistics, print_statistics, write_artifact};
use vocab_sweep::storage::{open_checkpoint_store, CheckpointStore};
use vocab_sweep::{CrawlState, SweepError};

/// Vocab-Sweep: a polite vocabulary sweeper for autocomplete endpoints
///
/// Vocab-Sweep enumerates every entry an autocomplete service exposes by
/// querying short prefixes and narrowing any answer that hits the result cap.
/// It paces itself against the endpoint's rate limit and checkpoints its
/// progress so an interrupted sweep can be resumed.
#[derive(Parser, Debug)]
#[command(name = "vocab-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A polite vocabulary sweeper for autocomplete endpoints", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume an interrupted sweep (default behavior)
    ///
    /// Resuming happens without this flag too; it exists so scripts can say so
    /// explicitly, and it cannot be combined with --fresh.
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh sweep, discarding the previous checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show the seed plan without querying
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Write the artifact from the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e)
                .with_context(|| format!("invalid configuration {}", cli.config.display()));
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export {
        handle_export(&config)?;
    } else {
        if cli.resume {
            tracing::debug!("--resume given; continuing from the checkpoint if one exists");
        }
        handle_sweep(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("vocab_sweep=info,warn"),
            1 => EnvFilter::new("vocab_sweep=debug,info"),
            2 => EnvFilter::new("vocab_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the seed plan
fn handle_dry_run(config: &Config) {
    println!("=== Vocab-Sweep Dry Run ===\n");

    println!("Service:");
    println!("  Endpoint: {}", config.service.base_url);
    println!("  Query parameter: {}", config.service.query_param);
    println!("  Max results per query (K): {}", config.service.max_results);
    println!("  Request timeout: {}ms", config.service.request_timeout);
    println!("  User agent: {}", config.service.user_agent);

    println!("\nCrawler Configuration:");
    println!("  Alphabet: {:?}", config.crawler.alphabet);
    println!("  Seed depth: {}", config.crawler.seed_depth);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Workers: {}", config.crawler.workers);
    println!("  Max in flight: {}", config.crawler.max_in_flight);
    println!(
        "  Retries: {} (plus {} for rate limits)",
        config.crawler.max_retries, config.crawler.max_throttle_retries
    );

    println!("\nRate Limit:");
    println!(
        "  Delay: {}ms - {}ms",
        config.rate_limit.min_delay, config.rate_limit.max_delay
    );
    println!("  Retry delay: {}ms", config.rate_limit.retry_delay);
    println!("  Cooldown: {}ms", config.rate_limit.cooldown);
    println!("  Jitter: {}", config.rate_limit.jitter);

    println!("\nOutput:");
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    println!("  Artifact: {}", config.output.artifact_path);
    println!("  Checkpoint interval: {}ms", config.output.checkpoint_interval);

    let seeds = seed_prefixes(&config.crawler.alphabet_chars(), config.crawler.seed_depth);
    let preview: Vec<String> = seeds.iter().take(10).map(|p| format!("{:?}", p.as_str())).collect();

    println!("\n✓ Configuration is valid");
    println!("✓ Would start with {} seed prefixes", seeds.len());
    if !preview.is_empty() {
        let more = if seeds.len() > preview.len() { ", ..." } else { "" };
        println!("  {}{}", preview.join(", "), more);
    }
}

/// Loads the checkpoint, failing if there is none
fn load_checkpoint(config: &Config) -> Result<CrawlState> {
    let path = Path::new(&config.output.checkpoint_path);
    let store = open_checkpoint_store(path);
    store
        .load()
        .with_context(|| format!("failed to read checkpoint {}", path.display()))?
        .ok_or_else(|| SweepError::MissingCheckpoint(path.display().to_string()).into())
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> Result<()> {
    println!("Checkpoint: {}\n", config.output.checkpoint_path);

    let state = load_checkpoint(config)?;
    let stats = load_statistics(&state);
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes the artifact from the checkpoint
fn handle_export(config: &Config) -> Result<()> {
    println!("=== Exporting Entries ===\n");
    println!("Checkpoint: {}", config.output.checkpoint_path);
    println!("Output: {}", config.output.artifact_path);
    println!();

    let state = load_checkpoint(config)?;
    write_artifact(Path::new(&config.output.artifact_path), &state.entries)
        .context("failed to write artifact")?;

    println!(
        "✓ {} entries exported to: {}",
        state.entries.len(),
        config.output.artifact_path
    );

    Ok(())
}

/// Handles the main sweep operation
async fn handle_sweep(config: Config, config_hash: String, fresh: bool) -> Result<()> {
    if fresh {
        tracing::info!("Starting fresh sweep (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting sweep (will resume from checkpoint if present)");
    }

    tracing::info!(
        "Endpoint: {}, alphabet: {} characters, K = {}",
        config.service.base_url,
        config.crawler.alphabet_chars().len(),
        config.service.max_results
    );

    // Ctrl-C stops dispatching; in-flight queries drain before the final save
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, finishing in-flight queries before saving");
            interrupt.cancel();
        }
    });

    match run_sweep(config, Some(config_hash), fresh, cancel).await {
        Ok(report) => {
            if report.cancelled {
                tracing::info!("Sweep stopped early; run again to resume");
            } else {
                tracing::info!("Sweep completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sweep failed: {}", e);
            Err(e.into())
        }
    }
}
