//! Output module for displaying harvest results
//!
//! This module handles:
//! - Printing the record listing with reservation marks
//! - Computing and printing snapshot statistics

mod listing;
pub mod stats;

pub use listing::{format_row, print_listing};
pub use stats::{load_statistics, print_statistics, SnapshotStatistics};
