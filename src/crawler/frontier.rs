//! Frontier of prefixes still to be queried
//!
//! This module handles:
//! - Seeding every prefix of length 1..=seed_depth over the alphabet
//! - FIFO dispensing of pending prefixes
//! - The expansion policy: children are enqueued only for truncated results
//! - Rebuilding the pending set from a checkpoint on resume
//!
//! The frontier is owned by the coordinator; workers never touch it.

use crate::cache::ResultCache;
use crate::config::CrawlerConfig;
use crate::state::{Prefix, QueryResult};
use std::collections::{HashSet, VecDeque};

/// What `expand` did with a completed result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// The result was complete; no child can reveal anything new
    Complete,

    /// The result was truncated; this many new children were enqueued
    Children(usize),

    /// The result was truncated but the prefix is already at `max_depth`
    DepthLimited,
}

/// Work queue of pending prefixes
#[derive(Debug)]
pub struct Frontier {
    alphabet: Vec<char>,
    seed_depth: usize,
    max_depth: usize,

    /// Pending prefixes in dispatch order
    queue: VecDeque<Prefix>,

    /// Every prefix enqueued during this run; a prefix is enqueued at most once
    known: HashSet<Prefix>,
}

impl Frontier {
    pub fn new(alphabet: Vec<char>, seed_depth: usize, max_depth: usize) -> Self {
        Self {
            alphabet,
            seed_depth,
            max_depth,
            queue: VecDeque::new(),
            known: HashSet::new(),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.alphabet_chars(), config.seed_depth, config.max_depth)
    }

    /// Enqueues the seed prefixes, skipping those already answered
    ///
    /// Seeds are generated shortest first and in alphabet order, so the same
    /// configuration always produces the same sequence.
    ///
    /// # Returns
    ///
    /// The number of seeds enqueued
    pub fn seed(&mut self, cache: &ResultCache) -> usize {
        seed_prefixes(&self.alphabet, self.seed_depth)
            .into_iter()
            .filter(|prefix| !cache.contains(prefix))
            .filter(|prefix| self.push(prefix.clone()))
            .count()
    }

    /// Rebuilds pending work after a checkpoint was loaded
    ///
    /// Enqueues the uncached children of every cached truncated prefix (which
    /// covers any child whose query was lost), then the checkpoint's own pending
    /// and failed prefixes.
    ///
    /// # Returns
    ///
    /// The number of prefixes enqueued
    pub fn restore<'a, I>(&mut self, cache: &ResultCache, carried: I) -> usize
    where
        I: IntoIterator<Item = &'a Prefix>,
    {
        let mut restored = 0;

        for (prefix, result) in cache.snapshot_results() {
            if !result.truncated || prefix.depth() >= self.max_depth {
                continue;
            }
            let children: Vec<Prefix> = prefix.children(&self.alphabet).collect();
            for child in children {
                if !cache.contains(&child) && self.push(child) {
                    restored += 1;
                }
            }
        }

        for prefix in carried {
            if prefix.depth() <= self.max_depth
                && !cache.contains(prefix)
                && self.push(prefix.clone())
            {
                restored += 1;
            }
        }

        restored
    }

    /// Pops the next pending prefix
    pub fn next(&mut self) -> Option<Prefix> {
        self.queue.pop_front()
    }

    /// Enqueues a prefix unless it was already enqueued during this run
    pub fn push(&mut self, prefix: Prefix) -> bool {
        if self.known.insert(prefix.clone()) {
            self.queue.push_back(prefix);
            true
        } else {
            false
        }
    }

    /// Puts back a prefix whose query was abandoned, so it stays pending
    pub fn requeue(&mut self, prefix: Prefix) {
        self.known.insert(prefix.clone());
        self.queue.push_front(prefix);
    }

    /// Applies the expansion policy to a completed query
    ///
    /// Children `prefix + c` are enqueued for every alphabet character `c` iff
    /// the result is truncated and the prefix is shorter than `max_depth`.
    pub fn expand(&mut self, prefix: &Prefix, result: &QueryResult) -> Expansion {
        if !result.truncated {
            return Expansion::Complete;
        }
        if prefix.depth() >= self.max_depth {
            return Expansion::DepthLimited;
        }

        let children: Vec<Prefix> = prefix.children(&self.alphabet).collect();
        let added = children
            .into_iter()
            .filter(|child| self.push(child.clone()))
            .count();
        Expansion::Children(added)
    }

    /// Number of pending prefixes
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Copies the pending prefixes in dispatch order
    pub fn pending(&self) -> Vec<Prefix> {
        self.queue.iter().cloned().collect()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Every prefix of length 1..=depth over the alphabet, shortest first
pub fn seed_prefixes(alphabet: &[char], depth: usize) -> Vec<Prefix> {
    let mut all = Vec::new();
    let mut level = vec![Prefix::new("")];

    for _ in 0..depth {
        level = level
            .iter()
            .flat_map(|parent| parent.children(alphabet).collect::<Vec<_>>())
            .collect();
        all.extend(level.iter().cloned());
    }

    all
}
