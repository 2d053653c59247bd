//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot backends and
//! associated error types.

use crate::record::{Record, ReservationEntry};
use crate::state::Period;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for snapshot backend implementations
///
/// A snapshot is keyed by its [`Period`] and consists of two documents: the
/// full record set and the reservation projection. Absence of a document is
/// reported as `Ok(None)`, never as an error.
pub trait SnapshotStore {
    /// Replaces the record set of `period`
    fn save_records(&self, period: Period, records: &[Record]) -> StorageResult<()>;

    /// Loads the record set of `period`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(records))` - A snapshot exists
    /// * `Ok(None)` - No snapshot for this period
    /// * `Err(StorageError)` - The snapshot exists but could not be read
    fn load_records(&self, period: Period) -> StorageResult<Option<Vec<Record>>>;

    /// Replaces the reservation projection of `period`
    fn save_reservations(&self, period: Period, entries: &[ReservationEntry])
        -> StorageResult<()>;

    /// Loads the reservation projection of `period`
    fn load_reservations(&self, period: Period) -> StorageResult<Option<Vec<ReservationEntry>>>;
}
