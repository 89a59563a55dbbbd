//! Deduplicating result cache
//!
//! Holds the completed queries (prefix → result), the set of discovered
//! entries, and the prefixes currently being queried. Each container has its
//! own mutex and every critical section is a single map/set operation; no lock
//! is ever held across an await point.

use crate::state::{Prefix, QueryResult};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome of claiming a prefix before querying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The prefix was already answered
    Hit(QueryResult),

    /// The caller now owns the query and must `put` or `release` it
    Claimed,

    /// Another worker is querying this prefix right now
    InFlight,
}

/// Thread-safe cache shared by all workers
#[derive(Debug, Default)]
pub struct ResultCache {
    results: Mutex<HashMap<Prefix, QueryResult>>,
    entries: Mutex<BTreeSet<String>>,
    in_flight: Mutex<HashSet<Prefix>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache pre-populated from a checkpoint
    ///
    /// Entries of every cached result are folded into the entry set, so a
    /// checkpoint captured between a `put` and the matching merge loses nothing.
    pub fn restore(results: BTreeMap<Prefix, QueryResult>, mut entries: BTreeSet<String>) -> Self {
        for result in results.values() {
            entries.extend(result.entries.iter().cloned());
        }
        Self {
            results: Mutex::new(results.into_iter().collect()),
            entries: Mutex::new(entries),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the cached result for a prefix
    pub fn get(&self, prefix: &Prefix) -> Option<QueryResult> {
        lock(&self.results).get(prefix).cloned()
    }

    pub fn contains(&self, prefix: &Prefix) -> bool {
        lock(&self.results).contains_key(prefix)
    }

    /// Claims a prefix for querying
    ///
    /// At most one caller holds the claim for a prefix at a time, and a prefix
    /// with a stored result is never claimed again, so a prefix costs at most one
    /// live query per run.
    pub fn begin(&self, prefix: &Prefix) -> Lookup {
        // Lock order: in_flight, then results. `put` stores the result before
        // clearing the claim, so a concurrent completion is always observed.
        let mut in_flight = lock(&self.in_flight);
        if let Some(result) = lock(&self.results).get(prefix) {
            return Lookup::Hit(result.clone());
        }
        if in_flight.insert(prefix.clone()) {
            Lookup::Claimed
        } else {
            Lookup::InFlight
        }
    }

    /// Stores a completed result and clears the claim
    pub fn put(&self, prefix: Prefix, result: QueryResult) {
        lock(&self.results).insert(prefix.clone(), result);
        lock(&self.in_flight).remove(&prefix);
    }

    /// Clears a claim without storing a result
    pub fn release(&self, prefix: &Prefix) {
        lock(&self.in_flight).remove(prefix);
    }

    /// Adds entries to the discovered set, returning how many were new
    pub fn merge_entries<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut set = lock(&self.entries);
        entries
            .into_iter()
            .filter(|entry| set.insert(entry.clone()))
            .count()
    }

    /// Number of completed queries
    pub fn len(&self) -> usize {
        lock(&self.results).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.results).is_empty()
    }

    /// Number of distinct entries discovered
    pub fn entry_count(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Prefixes currently claimed by a worker
    pub fn in_flight(&self) -> Vec<Prefix> {
        lock(&self.in_flight).iter().cloned().collect()
    }

    /// Copies the completed queries, ordered by prefix
    pub fn snapshot_results(&self) -> BTreeMap<Prefix, QueryResult> {
        lock(&self.results)
            .iter()
            .map(|(prefix, result)| (prefix.clone(), result.clone()))
            .collect()
    }

    /// Copies the discovered entries in sorted order
    pub fn snapshot_entries(&self) -> BTreeSet<String> {
        lock(&self.entries).clone()
    }
}
