//! Statistics generation from a checkpoint
//!
//! This module provides functionality for extracting and displaying
//! sweep statistics from a saved crawl state.

use crate::state::{CounterSnapshot, CrawlState};
use std::collections::BTreeMap;

/// Sweep statistics summary
#[derive(Debug, Clone)]
pub struct SweepStatistics {
    /// Distinct entries discovered
    pub total_entries: usize,

    /// Prefixes answered
    pub completed_queries: usize,

    /// Answered prefixes whose results hit the per-query cap
    pub truncated_queries: usize,

    /// Completed queries per prefix length
    pub queries_by_depth: BTreeMap<usize, usize>,

    /// Prefixes still pending
    pub pending: usize,

    /// Prefixes given up after exhausting retries
    pub failed: usize,

    /// Request, throttle and failure counters
    pub counters: CounterSnapshot,

    /// When the state was captured (RFC 3339)
    pub saved_at: String,
}

/// Loads statistics from a crawl state
pub fn load_statistics(state: &CrawlState) -> SweepStatistics {
    let mut queries_by_depth = BTreeMap::new();
    for prefix in state.cache.keys() {
        *queries_by_depth.entry(prefix.depth()).or_insert(0) += 1;
    }

    SweepStatistics {
        total_entries: state.entries.len(),
        completed_queries: state.cache.len(),
        truncated_queries: state.truncated_count(),
        queries_by_depth,
        pending: state.pending.len(),
        failed: state.failed.len(),
        counters: state.counters,
        saved_at: state.saved_at.to_rfc3339(),
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SweepStatistics) {
    println!("=== Sweep Statistics ===\n");

    println!("Overview:");
    println!("  Checkpoint saved at: {}", stats.saved_at);
    println!("  Entries discovered: {}", stats.total_entries);
    println!("  Prefixes answered: {}", stats.completed_queries);
    println!("  Truncated answers: {}", stats.truncated_queries);
    println!("  Pending prefixes: {}", stats.pending);
    println!("  Failed prefixes: {}", stats.failed);
    println!();

    println!("Answers by Prefix Length:");
    for (depth, count) in &stats.queries_by_depth {
        println!("  {}: {}", depth, count);
    }
    println!();

    println!("Requests:");
    println!("  Issued: {}", stats.counters.requests_issued);
    println!("  Rate limited: {}", stats.counters.rate_limit_hits);
    println!("  Served from cache: {}", stats.counters.cache_hits);
    println!("  Truncated at depth ceiling: {}", stats.counters.depth_limited);
    println!();

    let throttle_rate = if stats.counters.requests_issued > 0 {
        (stats.counters.rate_limit_hits as f64 / stats.counters.requests_issued as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Throttle Rate: {:.1}% ({} / {} requests rate limited)",
        throttle_rate, stats.counters.rate_limit_hits, stats.counters.requests_issued
    );
}
