//! Statistics generation from a stored snapshot
//!
//! This module provides functionality for extracting and displaying
//! snapshot statistics from the storage layer.

use crate::record::Record;
use crate::state::Period;
use crate::storage::{load_snapshot, SnapshotStore};
use crate::HarvestError;
use std::collections::BTreeMap;

/// Snapshot statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStatistics {
    pub period: Period,

    /// Total number of records
    pub total_records: usize,

    /// Records marked as reserved
    pub reserved: usize,

    /// Records holding a cover image
    pub with_cover: usize,

    /// Records holding a cache validator for their cover
    pub with_validator: usize,

    /// Count of records per release date, in date order
    pub by_release_date: BTreeMap<String, usize>,
}

impl SnapshotStatistics {
    /// Computes statistics over a record set
    pub fn from_records(period: Period, records: &[Record]) -> Self {
        let mut by_release_date = BTreeMap::new();
        for record in records {
            *by_release_date
                .entry(record.release_date.clone())
                .or_insert(0) += 1;
        }

        Self {
            period,
            total_records: records.len(),
            reserved: records.iter().filter(|r| r.reserved).count(),
            with_cover: records.iter().filter(|r| r.cover.is_some()).count(),
            with_validator: records
                .iter()
                .filter(|r| !r.image_validator.is_empty())
                .count(),
            by_release_date,
        }
    }
}

/// Loads statistics of the snapshot of `period`
///
/// # Returns
///
/// * `Ok(Some(SnapshotStatistics))` - Snapshot found
/// * `Ok(None)` - No snapshot for this period
/// * `Err(HarvestError)` - Failed to read the snapshot
pub fn load_statistics<S: SnapshotStore + ?Sized>(
    store: &S,
    period: Period,
) -> Result<Option<SnapshotStatistics>, HarvestError> {
    let records = load_snapshot(store, period)?;
    Ok(records.map(|records| SnapshotStatistics::from_records(period, &records)))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SnapshotStatistics) {
    println!("=== Snapshot Statistics ({}) ===\n", stats.period);

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!("  Reserved: {}", stats.reserved);
    println!(
        "  With cover: {} ({:.1}%)",
        stats.with_cover,
        percentage(stats.with_cover, stats.total_records)
    );
    println!("  With cache validator: {}", stats.with_validator);
    println!();

    if !stats.by_release_date.is_empty() {
        println!("Records by Release Date:");
        for (date, count) in &stats.by_release_date {
            let date = if date.is_empty() { "(none)" } else { date };
            println!("  {}: {}", date, count);
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
