//! Crawl-wide counters and the checkpoint payload

use crate::state::{Prefix, QueryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Live counters shared by every worker
///
/// Each counter is independent, so relaxed atomics are enough.
#[derive(Debug, Default)]
pub struct CrawlCounters {
    requests_issued: AtomicU64,
    rate_limit_hits: AtomicU64,
    failed_queries: AtomicU64,
    cache_hits: AtomicU64,
    depth_limited: AtomicU64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates counters continuing from a checkpoint
    pub fn from_snapshot(snapshot: &CounterSnapshot) -> Self {
        Self {
            requests_issued: AtomicU64::new(snapshot.requests_issued),
            rate_limit_hits: AtomicU64::new(snapshot.rate_limit_hits),
            failed_queries: AtomicU64::new(snapshot.failed_queries),
            cache_hits: AtomicU64::new(snapshot.cache_hits),
            depth_limited: AtomicU64::new(snapshot.depth_limited),
        }
    }

    pub fn record_request(&self) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_depth_limited(&self) {
        self.depth_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued.load(Ordering::Relaxed)
    }

    pub fn rate_limit_hits(&self) -> u64 {
        self.rate_limit_hits.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requests_issued: self.requests_issued.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            depth_limited: self.depth_limited.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters, as stored in a checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Network requests sent, including retries
    pub requests_issued: u64,

    /// Rate-limit responses received
    pub rate_limit_hits: u64,

    /// Prefixes given up after exhausting their retries
    #[serde(default)]
    pub failed_queries: u64,

    /// Queries answered from the result cache
    #[serde(default)]
    pub cache_hits: u64,

    /// Truncated results that could not be expanded because of the depth ceiling
    #[serde(default)]
    pub depth_limited: u64,
}

/// Everything needed to resume a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    pub version: u32,

    /// Hash of the configuration the state was produced under
    #[serde(default)]
    pub config_hash: Option<String>,

    pub saved_at: DateTime<Utc>,

    /// Discovered entries, serialized as a sorted list
    pub entries: BTreeSet<String>,

    /// Completed queries
    pub cache: BTreeMap<Prefix, QueryResult>,

    /// Prefixes queued or in flight when the state was captured
    #[serde(default)]
    pub pending: Vec<Prefix>,

    /// Prefixes whose retries were exhausted; retried on resume
    #[serde(default)]
    pub failed: BTreeSet<Prefix>,

    pub counters: CounterSnapshot,
}

impl CrawlState {
    /// An empty state, as at the start of a fresh sweep
    pub fn new(config_hash: Option<String>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            config_hash,
            saved_at: Utc::now(),
            entries: BTreeSet::new(),
            cache: BTreeMap::new(),
            pending: Vec::new(),
            failed: BTreeSet::new(),
            counters: CounterSnapshot::default(),
        }
    }

    /// Number of completed queries that hit the per-query cap
    pub fn truncated_count(&self) -> usize {
        self.cache.values().filter(|r| r.truncated).count()
    }
}
