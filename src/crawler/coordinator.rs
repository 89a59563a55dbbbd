//! Sweep coordinator - main crawl orchestration logic
//!
//! This module contains the main sweep loop that coordinates all aspects of
//! the process, including:
//! - Loading a checkpoint or starting fresh
//! - Owning the frontier and dispatching prefixes to a bounded worker pool
//! - Merging completed results and expanding truncated prefixes
//! - Periodic checkpoints and graceful shutdown on cancellation
//! - Writing the final checkpoint and artifact

use crate::cache::ResultCache;
use crate::config::{validate, Config};
use crate::crawler::executor::{QueryExecutor, QueryOutcome, RetryPolicy};
use crate::crawler::fetcher::AutocompleteService;
use crate::crawler::frontier::{Expansion, Frontier};
use crate::crawler::governor::RateGovernor;
use crate::output::write_artifact;
use crate::state::{CounterSnapshot, CrawlCounters, CrawlState, Prefix};
use crate::storage::CheckpointStore;
use crate::Result;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Summary of one `run`
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// The run stopped because of cancellation, not because the frontier drained
    pub cancelled: bool,

    /// Distinct entries discovered, including those from earlier runs
    pub entries: usize,

    /// Prefixes resolved during this run
    pub queries_completed: u64,

    pub counters: CounterSnapshot,

    /// Prefixes given up after exhausting their retries
    pub failed: Vec<Prefix>,

    /// Prefixes left pending in the final checkpoint
    pub pending: usize,

    pub elapsed: Duration,
}

/// Main sweep coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    service: Arc<dyn AutocompleteService>,
    store: Arc<dyn CheckpointStore>,
    cache: Arc<ResultCache>,
    counters: Arc<CrawlCounters>,
    governor: Arc<RateGovernor>,
    frontier: Frontier,
    failed: BTreeSet<Prefix>,
    config_hash: Option<String>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The sweep configuration
    /// * `service` - The autocomplete endpoint to query
    /// * `store` - Where checkpoints are loaded from and saved to
    /// * `fresh` - Whether to start a fresh sweep (clears the existing checkpoint)
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SweepError)` - Invalid configuration or unreadable checkpoint
    pub fn new(
        config: Config,
        service: Arc<dyn AutocompleteService>,
        store: Arc<dyn CheckpointStore>,
        fresh: bool,
    ) -> Result<Self> {
        validate(&config)?;

        let loaded = if fresh {
            tracing::info!("Starting fresh sweep, clearing previous checkpoint");
            store.clear()?;
            None
        } else {
            store.load()?
        };

        let mut frontier = Frontier::from_config(&config.crawler);

        let (cache, counters, failed, config_hash) = match loaded {
            Some(state) => {
                tracing::info!(
                    "Resuming from checkpoint saved at {}: {} entries, {} cached queries, {} pending, {} failed",
                    state.saved_at,
                    state.entries.len(),
                    state.cache.len(),
                    state.pending.len(),
                    state.failed.len()
                );

                let cache = ResultCache::restore(state.cache, state.entries);
                let counters = CrawlCounters::from_snapshot(&state.counters);

                let seeded = frontier.seed(&cache);
                let restored = frontier.restore(&cache, state.pending.iter().chain(&state.failed));
                tracing::info!("Frontier rebuilt: {} seeds, {} carried over", seeded, restored);

                (cache, counters, state.failed, state.config_hash)
            }
            None => {
                let cache = ResultCache::new();
                let seeded = frontier.seed(&cache);
                tracing::info!("Seeded frontier with {} prefixes", seeded);

                (cache, CrawlCounters::new(), BTreeSet::new(), None)
            }
        };

        let governor = RateGovernor::new(config.rate_limit.clone(), config.crawler.max_in_flight);

        Ok(Self {
            config: Arc::new(config),
            service,
            store,
            cache: Arc::new(cache),
            counters: Arc::new(counters),
            governor: Arc::new(governor),
            frontier,
            failed,
            config_hash,
            cancel: CancellationToken::new(),
        })
    }

    /// Records the hash of the configuration file in every checkpoint
    ///
    /// A checkpoint produced under a different configuration is still resumed,
    /// but the mismatch is logged.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        let hash = hash.into();
        if let Some(previous) = &self.config_hash {
            if *previous != hash {
                tracing::warn!(
                    "Configuration changed since the checkpoint was written (was {}, now {})",
                    previous,
                    hash
                );
            }
        }
        self.config_hash = Some(hash);
        self
    }

    /// Uses an externally owned cancellation token (e.g. wired to Ctrl-C)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn counters(&self) -> &Arc<CrawlCounters> {
        &self.counters
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Number of prefixes waiting to be dispatched
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Runs the main sweep loop
    ///
    /// This is the core logic that:
    /// 1. Dispatches prefixes to at most `workers` concurrent tasks
    /// 2. Joins completions, merging entries and expanding truncated prefixes
    /// 3. Saves a checkpoint every `checkpoint_interval`
    /// 4. Stops dispatching on cancellation and drains in-flight tasks
    /// 5. Writes one final checkpoint and the artifact
    ///
    /// The loop ends when the frontier is empty and no task is in flight. Only
    /// this loop touches the frontier, so that check cannot race a worker.
    pub async fn run(&mut self) -> Result<CrawlReport> {
        let start = Instant::now();
        let workers = self.config.crawler.workers;
        let progress_interval = self.config.crawler.progress_interval.max(1);
        let checkpoint_interval = self.config.output.checkpoint_interval();

        let executor = Arc::new(QueryExecutor::new(
            Arc::clone(&self.service),
            Arc::clone(&self.governor),
            Arc::clone(&self.cache),
            Arc::clone(&self.counters),
            RetryPolicy::from_config(&self.config.crawler, &self.config.rate_limit),
            self.config.service.max_results,
            self.cancel.clone(),
        ));

        let cancel = self.cancel.clone();
        let mut ticker = tokio::time::interval_at(start + checkpoint_interval, checkpoint_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tasks: JoinSet<(Prefix, QueryOutcome)> = JoinSet::new();
        let mut dispatched: HashSet<Prefix> = HashSet::new();
        let mut stopping = cancel.is_cancelled();
        let mut completed: u64 = 0;

        tracing::info!(
            "Starting sweep: {} prefixes pending, {} workers",
            self.frontier.len(),
            workers
        );

        loop {
            if !stopping {
                while tasks.len() < workers {
                    let Some(prefix) = self.frontier.next() else {
                        break;
                    };
                    dispatched.insert(prefix.clone());
                    let executor = Arc::clone(&executor);
                    tasks.spawn(async move {
                        let outcome = executor.execute(&prefix).await;
                        (prefix, outcome)
                    });
                }
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((prefix, outcome))) => {
                        dispatched.remove(&prefix);
                        if self.handle_outcome(prefix, outcome) {
                            completed += 1;
                            if completed % progress_interval == 0 {
                                self.log_progress(completed, tasks.len(), start);
                            }
                        }
                    }
                    // The prefix stays in `dispatched`, so it is checkpointed as pending
                    Some(Err(e)) => tracing::error!("Worker task failed: {}", e),
                    None => {}
                },
                _ = ticker.tick() => self.checkpoint(&dispatched),
                _ = cancel.cancelled(), if !stopping => {
                    tracing::info!("Interrupt received, draining {} in-flight queries", tasks.len());
                    stopping = true;
                }
            }
        }

        let state = self.snapshot(&dispatched);
        match self.store.save(&state) {
            Ok(()) => tracing::info!(
                "Saved final checkpoint: {} entries, {} pending",
                state.entries.len(),
                state.pending.len()
            ),
            Err(e) => tracing::warn!("Failed to save final checkpoint: {}", e),
        }

        write_artifact(Path::new(&self.config.output.artifact_path), &state.entries)?;

        let report = CrawlReport {
            cancelled: stopping,
            entries: state.entries.len(),
            queries_completed: completed,
            counters: state.counters,
            failed: state.failed.iter().cloned().collect(),
            pending: state.pending.len(),
            elapsed: start.elapsed(),
        };

        if report.cancelled {
            tracing::info!(
                "Sweep interrupted: {} entries saved, {} prefixes left pending",
                report.entries,
                report.pending
            );
        } else {
            tracing::info!(
                "Sweep completed: {} entries saved, {} total requests in {:?}",
                report.entries,
                report.counters.requests_issued,
                report.elapsed
            );
        }
        if !report.failed.is_empty() {
            tracing::warn!(
                "{} prefixes failed and will be retried on resume",
                report.failed.len()
            );
        }

        Ok(report)
    }

    /// Applies one completed task to the sweep state
    ///
    /// # Returns
    ///
    /// `true` if the prefix was resolved
    fn handle_outcome(&mut self, prefix: Prefix, outcome: QueryOutcome) -> bool {
        match outcome {
            QueryOutcome::Cached(result) | QueryOutcome::Fetched(result) => {
                let added = self.cache.merge_entries(result.entries.iter().cloned());
                self.failed.remove(&prefix);

                match self.frontier.expand(&prefix, &result) {
                    Expansion::Complete => {}
                    Expansion::Children(count) => {
                        tracing::debug!("'{}' is truncated, enqueued {} children", prefix, count);
                    }
                    Expansion::DepthLimited => {
                        self.counters.record_depth_limited();
                        tracing::warn!(
                            "'{}' is still truncated at max depth {}, entries beyond it may be missed",
                            prefix,
                            self.frontier.max_depth()
                        );
                    }
                }

                tracing::trace!("'{}' added {} new entries", prefix, added);
                true
            }
            QueryOutcome::Failed { .. } => {
                self.failed.insert(prefix);
                false
            }
            QueryOutcome::Duplicate => false,
            QueryOutcome::Abandoned => {
                self.frontier.requeue(prefix);
                false
            }
        }
    }

    fn log_progress(&self, completed: u64, in_flight: usize, start: Instant) {
        let elapsed = start.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            completed as f64 / elapsed
        } else {
            0.0
        };

        tracing::info!(
            "Progress: {} queries completed, {} pending, {} in flight, {} entries, {} requests, {} throttled, {:.2} queries/sec",
            completed,
            self.frontier.len(),
            in_flight,
            self.cache.entry_count(),
            self.counters.requests_issued(),
            self.counters.rate_limit_hits(),
            rate
        );
    }

    /// Saves a periodic checkpoint; a failure is retried at the next interval
    fn checkpoint(&self, dispatched: &HashSet<Prefix>) {
        let state = self.snapshot(dispatched);
        match self.store.save(&state) {
            Ok(()) => tracing::debug!(
                "Checkpoint saved: {} entries, {} cached queries",
                state.entries.len(),
                state.cache.len()
            ),
            Err(e) => tracing::warn!("Failed to save checkpoint, will retry: {}", e),
        }
    }

    /// Captures everything needed to resume
    ///
    /// In-flight prefixes are recorded as pending ahead of the queued ones.
    fn snapshot(&self, dispatched: &HashSet<Prefix>) -> CrawlState {
        let mut in_flight: Vec<Prefix> = dispatched.iter().cloned().collect();
        in_flight.sort();

        let mut state = CrawlState::new(self.config_hash.clone());
        state.entries = self.cache.snapshot_entries();
        state.cache = self.cache.snapshot_results();
        state.pending = in_flight;
        state.pending.extend(self.frontier.pending());
        state.failed = self.failed.clone();
        state.counters = self.counters.snapshot();
        state
    }
}
