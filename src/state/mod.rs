//! State module for tracking sweep progress
//!
//! # Components
//!
//! - `Prefix`: a candidate partial query string
//! - `QueryResult`: the entries returned for one prefix and whether they were truncated
//! - `CrawlCounters`: live request/throttle/failure counters shared by workers
//! - `CrawlState`: the checkpoint payload used to resume an interrupted sweep

mod crawl_state;
mod prefix;

// Re-export main types
pub use crawl_state::{CounterSnapshot, CrawlCounters, CrawlState, CHECKPOINT_VERSION};
pub use prefix::{Prefix, QueryResult};
