//! Prefix and query result definitions
//!
//! A prefix is the unit of work of the sweep; a query result is what the
//! endpoint answered for it.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A candidate partial query string
///
/// Identity is the string value. Depth is the number of characters, not bytes,
/// so alphabets with multi-byte characters expand correctly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prefix(String);

impl Prefix {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the prefix
    pub fn depth(&self) -> usize {
        self.0.chars().count()
    }

    /// Returns this prefix extended by one character
    pub fn child(&self, c: char) -> Self {
        let mut value = String::with_capacity(self.0.len() + c.len_utf8());
        value.push_str(&self.0);
        value.push(c);
        Self(value)
    }

    /// Returns every one-character extension over the alphabet, in alphabet order
    pub fn children<'a>(&'a self, alphabet: &'a [char]) -> impl Iterator<Item = Prefix> + 'a {
        alphabet.iter().map(move |&c| self.child(c))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Prefix {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Prefix {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for Prefix {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The entries returned for one prefix
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Entries in the order the endpoint returned them
    pub entries: Vec<String>,

    /// True when the endpoint returned exactly its per-query cap
    pub truncated: bool,
}

impl QueryResult {
    /// Builds a result, marking it truncated when `entries.len() == max_results`
    pub fn from_entries(entries: Vec<String>, max_results: usize) -> Self {
        let truncated = entries.len() == max_results;
        Self { entries, truncated }
    }

    /// The result recorded for a prefix whose query could not be completed
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
