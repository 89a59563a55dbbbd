//! Result cache module
//!
//! Deduplicates queries (prefix → result) and discovered entries so that no
//! prefix is queried twice and no entry is counted twice.

mod result_cache;

pub use result_cache::{Lookup, ResultCache};
