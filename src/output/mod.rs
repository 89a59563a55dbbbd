//! Output module for sweep results
//!
//! This module handles:
//! - Writing the final artifact (sorted JSON array of entries)
//! - Extracting and printing statistics from a checkpoint

mod artifact;
pub mod stats;

pub use artifact::{read_artifact, write_artifact};
pub use stats::{load_statistics, print_statistics, SweepStatistics};
