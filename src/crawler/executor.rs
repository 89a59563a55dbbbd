//! Query executor with bounded retry and backoff
//!
//! One logical query = cache lookup, then up to `max_retries` ordinary attempts
//! (plus a separate budget for rate-limited attempts), each cleared by the rate
//! governor. The retry decision is an explicit state machine (`RetryPolicy`,
//! `RetryState`, `RetryAction`) so it can be tested without a network.

use crate::cache::{Lookup, ResultCache};
use crate::config::{CrawlerConfig, RateLimitConfig};
use crate::crawler::fetcher::{AutocompleteService, ServiceResponse};
use crate::crawler::governor::RateGovernor;
use crate::state::{CrawlCounters, Prefix, QueryResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Final outcome of executing one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Answered from the result cache, no request issued
    Cached(QueryResult),

    /// Answered by the service and stored in the cache
    Fetched(QueryResult),

    /// Another worker is already querying this prefix
    Duplicate,

    /// Retries exhausted; the prefix yields an empty result
    Failed {
        /// Why the last attempt failed
        reason: String,
    },

    /// Cancellation arrived before the query completed
    Abandoned,
}

impl QueryOutcome {
    /// The result to merge and expand, if the prefix was resolved
    pub fn result(&self) -> Option<&QueryResult> {
        match self {
            Self::Cached(result) | Self::Fetched(result) => Some(result),
            _ => None,
        }
    }
}

/// Attempt counters for one logical query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Ordinary failures (bad status, timeout, transport error)
    pub failures: u32,

    /// Rate-limited attempts
    pub throttles: u32,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryAction {
    /// Sleep, then try again
    Retry { delay: Duration },

    /// Stop and report the prefix as failed
    GiveUp { reason: String },
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    max_throttle_retries: u32,
    retry_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        max_throttle_retries: u32,
        retry_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_retries,
            max_throttle_retries,
            retry_delay,
            max_delay,
        }
    }

    pub fn from_config(crawler: &CrawlerConfig, rate_limit: &RateLimitConfig) -> Self {
        Self::new(
            crawler.max_retries,
            crawler.max_throttle_retries,
            rate_limit.retry_delay(),
            rate_limit.max_delay(),
        )
    }

    /// Advances the state after an ordinary failure
    ///
    /// Rate-limited attempts never count toward this budget.
    pub fn on_failure(&self, state: &mut RetryState, error: &str) -> RetryAction {
        state.failures += 1;
        if state.failures >= self.max_retries {
            RetryAction::GiveUp {
                reason: format!("{} (after {} attempts)", error, state.failures),
            }
        } else {
            RetryAction::Retry {
                delay: self.failure_delay(state.failures),
            }
        }
    }

    /// Advances the state after a rate-limit signal
    ///
    /// `backoff` is the delay computed by the governor (and server hint).
    pub fn on_rate_limited(&self, state: &mut RetryState, backoff: Duration) -> RetryAction {
        state.throttles += 1;
        if state.throttles > self.max_throttle_retries {
            RetryAction::GiveUp {
                reason: format!("rate limited {} times", state.throttles),
            }
        } else {
            RetryAction::Retry {
                delay: backoff.min(self.max_delay),
            }
        }
    }

    /// `retry_delay * 2^(failures - 1)`, capped at `max_delay`
    pub fn failure_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.retry_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Issues queries through the governor and records them in the cache
pub struct QueryExecutor {
    service: Arc<dyn AutocompleteService>,
    governor: Arc<RateGovernor>,
    cache: Arc<ResultCache>,
    counters: Arc<CrawlCounters>,
    policy: RetryPolicy,
    max_results: usize,
    cancel: CancellationToken,
}

impl QueryExecutor {
    pub fn new(
        service: Arc<dyn AutocompleteService>,
        governor: Arc<RateGovernor>,
        cache: Arc<ResultCache>,
        counters: Arc<CrawlCounters>,
        policy: RetryPolicy,
        max_results: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            governor,
            cache,
            counters,
            policy,
            max_results,
            cancel,
        }
    }

    /// Executes one prefix
    ///
    /// A cache hit costs nothing; a prefix already being queried elsewhere is
    /// reported as a duplicate instead of issuing a second live request.
    pub async fn execute(&self, prefix: &Prefix) -> QueryOutcome {
        match self.cache.begin(prefix) {
            Lookup::Hit(result) => {
                self.counters.record_cache_hit();
                tracing::debug!("Cache hit for '{}'", prefix);
                return QueryOutcome::Cached(result);
            }
            Lookup::InFlight => {
                tracing::debug!("'{}' is already in flight", prefix);
                return QueryOutcome::Duplicate;
            }
            Lookup::Claimed => {}
        }

        let outcome = self.fetch(prefix).await;
        match &outcome {
            QueryOutcome::Fetched(result) => self.cache.put(prefix.clone(), result.clone()),
            _ => self.cache.release(prefix),
        }
        outcome
    }

    /// Runs the retry loop for a claimed prefix
    async fn fetch(&self, prefix: &Prefix) -> QueryOutcome {
        let mut state = RetryState::default();

        loop {
            let clearance = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return QueryOutcome::Abandoned,
                clearance = self.governor.throttle() => clearance,
            };
            let Some(clearance) = clearance else {
                return QueryOutcome::Abandoned;
            };

            self.counters.record_request();
            let response = self.service.query(prefix.as_str()).await;
            drop(clearance);

            let action = match response {
                ServiceResponse::Results(entries) => {
                    self.governor.record_success(Instant::now());
                    if entries.len() > self.max_results {
                        tracing::warn!(
                            "'{}' returned {} results, more than the configured cap of {}",
                            prefix,
                            entries.len(),
                            self.max_results
                        );
                    }
                    tracing::debug!("'{}' -> {} results", prefix, entries.len());
                    return QueryOutcome::Fetched(QueryResult::from_entries(
                        entries,
                        self.max_results,
                    ));
                }
                ServiceResponse::RateLimited { retry_after } => {
                    self.counters.record_rate_limit();
                    let backoff = self.governor.record_throttled(Instant::now());
                    let backoff = retry_after.map_or(backoff, |hint| backoff.max(hint));
                    tracing::warn!("Rate limited on '{}', backing off {:?}", prefix, backoff);
                    self.policy.on_rate_limited(&mut state, backoff)
                }
                ServiceResponse::HttpError { status_code } => {
                    let error = format!("HTTP {}", status_code);
                    tracing::warn!("{} on '{}' (attempt {})", error, prefix, state.failures + 1);
                    self.policy.on_failure(&mut state, &error)
                }
                ServiceResponse::NetworkError { error } => {
                    tracing::warn!(
                        "Request failed on '{}': {} (attempt {})",
                        prefix,
                        error,
                        state.failures + 1
                    );
                    self.policy.on_failure(&mut state, &error)
                }
            };

            match action {
                RetryAction::Retry { delay } => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return QueryOutcome::Abandoned,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryAction::GiveUp { reason } => {
                    self.counters.record_failure();
                    tracing::warn!("Giving up on '{}': {}", prefix, reason);
                    return QueryOutcome::Failed { reason };
                }
            }
        }
    }
}
