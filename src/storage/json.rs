//! JSON file snapshot backend
//!
//! One pretty-printed document per period and kind, stored under the data
//! directory as `<YYYY-MM>.json` and `<YYYY-MM>_reservations.json`.

use crate::record::{Record, ReservationEntry};
use crate::state::Period;
use crate::storage::{SnapshotStore, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// JSON-backed snapshot store rooted at a data directory
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    data_dir: PathBuf,
}

impl JsonSnapshotStore {
    /// Creates a store; the directory is created on the first save
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the record set of `period`
    pub fn records_path(&self, period: Period) -> PathBuf {
        self.data_dir.join(format!("{}.json", period))
    }

    /// Path of the reservation projection of `period`
    pub fn reservations_path(&self, period: Period) -> PathBuf {
        self.data_dir.join(format!("{}_reservations.json", period))
    }

    /// Serializes `value` and atomically replaces `path`
    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> StorageResult<()> {
        fs::create_dir_all(&self.data_dir)?;

        let json = serde_json::to_vec_pretty(value)?;
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        tracing::debug!("Wrote {} bytes to {}", json.len(), path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> StorageResult<Option<T>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save_records(&self, period: Period, records: &[Record]) -> StorageResult<()> {
        self.write_json(&self.records_path(period), records)
    }

    fn load_records(&self, period: Period) -> StorageResult<Option<Vec<Record>>> {
        self.read_json(&self.records_path(period))
    }

    fn save_reservations(
        &self,
        period: Period,
        entries: &[ReservationEntry],
    ) -> StorageResult<()> {
        self.write_json(&self.reservations_path(period), entries)
    }

    fn load_reservations(&self, period: Period) -> StorageResult<Option<Vec<ReservationEntry>>> {
        self.read_json(&self.reservations_path(period))
    }
}
