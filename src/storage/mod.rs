//! Storage module for persisting monthly snapshots
//!
//! This module handles:
//! - Saving the record set and its reservation projection per period
//! - Loading a snapshot and reconciling reservations onto it

mod json;
mod traits;

pub use json::JsonSnapshotStore;
pub use traits::{SnapshotStore, StorageError, StorageResult};

use crate::record::{Record, ReservationEntry};
use crate::state::Period;
use std::collections::HashSet;

/// Reservation projection of a record set, in record order
pub fn reservation_projection(records: &[Record]) -> Vec<ReservationEntry> {
    records
        .iter()
        .filter(|r| r.reserved)
        .map(Record::reservation_entry)
        .collect()
}

/// Marks every record whose `(title, releaseDate)` exactly equals an entry
///
/// Additive: records that are already reserved stay reserved.
///
/// # Returns
///
/// The number of records newly marked.
pub fn apply_reservations<'a, I>(records: I, entries: &[ReservationEntry]) -> usize
where
    I: IntoIterator<Item = &'a mut Record>,
{
    if entries.is_empty() {
        return 0;
    }

    let lookup: HashSet<(&str, &str)> = entries
        .iter()
        .map(|e| (e.title.as_str(), e.release_date.as_str()))
        .collect();

    let mut marked = 0;
    for record in records {
        if !record.reserved && lookup.contains(&record.natural_key()) {
            record.reserved = true;
            marked += 1;
        }
    }
    marked
}

/// Saves the record set, then its reservation projection
pub fn save_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    period: Period,
    records: &[Record],
) -> StorageResult<()> {
    store.save_records(period, records)?;
    let entries = reservation_projection(records);
    store.save_reservations(period, &entries)?;
    tracing::info!(
        "Saved {} records ({} reserved) for {}",
        records.len(),
        entries.len(),
        period
    );
    Ok(())
}

/// Loads the snapshot of `period` with reservations applied
///
/// # Returns
///
/// * `Ok(Some(records))` - Snapshot found, with at least one record
/// * `Ok(None)` - No snapshot for this period, or an empty one
/// * `Err(StorageError)` - A snapshot file could not be read
pub fn load_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    period: Period,
) -> StorageResult<Option<Vec<Record>>> {
    let mut records = match store.load_records(period)? {
        Some(records) if !records.is_empty() => records,
        Some(_) => {
            tracing::info!("Snapshot for {} is empty", period);
            return Ok(None);
        }
        None => {
            tracing::info!("No snapshot for {}", period);
            return Ok(None);
        }
    };

    if let Some(entries) = store.load_reservations(period)? {
        let marked = apply_reservations(records.iter_mut(), &entries);
        tracing::debug!("Applied {} of {} reservations", marked, entries.len());
    }

    tracing::info!("Loaded {} records for {}", records.len(), period);
    Ok(Some(records))
}
