//! Catalog records and their reservation projection
//!
//! A [`Record`] is one item of the monthly listing. The persisted JSON field
//! names are part of the snapshot format and must not change.

use crate::images::CoverImage;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cache-validation tokens of the last downloaded cover
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageValidator {
    /// `ETag` response header
    #[serde(default)]
    pub etag: Option<String>,

    /// `Last-Modified` response header
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl ImageValidator {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// One catalog item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Release date as published, e.g. `2025/07/15`
    #[serde(default)]
    pub release_date: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub author: String,

    /// Price in source notation, e.g. `660円`
    #[serde(default)]
    pub price: String,

    /// Item detail page
    #[serde(default)]
    pub source_link: String,

    /// Cover URL without query string
    #[serde(default)]
    pub image_link: String,

    /// Cover in decoded and/or portable form; persisted as its portable form
    #[serde(rename = "imageEncoded", default, with = "cover_serde")]
    pub cover: Option<CoverImage>,

    #[serde(default)]
    pub image_validator: ImageValidator,

    /// Set by the user
    #[serde(default)]
    pub reserved: bool,
}

impl Record {
    /// `(title, releaseDate)`, the key used to match records across runs
    pub fn natural_key(&self) -> (&str, &str) {
        (&self.title, &self.release_date)
    }

    /// Reservation projection of this record
    pub fn reservation_entry(&self) -> ReservationEntry {
        ReservationEntry {
            release_date: self.release_date.clone(),
            title: self.title.clone(),
        }
    }

    /// Exact match on `(title, releaseDate)`
    pub fn matches(&self, entry: &ReservationEntry) -> bool {
        self.title == entry.title && self.release_date == entry.release_date
    }
}

/// A reserved record reduced to its natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationEntry {
    #[serde(default)]
    pub release_date: String,

    #[serde(default)]
    pub title: String,
}

/// Shared, lockable record
///
/// The harvester hands clones of these handles to the image acquirer, which
/// writes a record's cover fields in a single critical section.
#[derive(Debug, Clone)]
pub struct RecordHandle(Arc<Mutex<Record>>);

impl RecordHandle {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(Mutex::new(record)))
    }

    /// Locks the record; a poisoned lock is recovered since records hold plain data
    pub fn lock(&self) -> MutexGuard<'_, Record> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clones the current state of the record
    pub fn snapshot(&self) -> Record {
        self.lock().clone()
    }

    pub fn is_reserved(&self) -> bool {
        self.lock().reserved
    }

    pub fn set_reserved(&self, reserved: bool) {
        self.lock().reserved = reserved;
    }

    /// Flips the reservation mark and returns the new value
    pub fn toggle_reserved(&self) -> bool {
        let mut record = self.lock();
        record.reserved = !record.reserved;
        record.reserved
    }

    /// True when both handles refer to the same record
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Record> for RecordHandle {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}

mod cover_serde {
    use crate::images::CoverImage;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(cover: &Option<CoverImage>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match cover {
            Some(cover) => {
                let encoded = cover.to_encoded().map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&*encoded)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<CoverImage>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        Ok(encoded
            .filter(|e| !e.is_empty())
            .map(CoverImage::from_encoded))
    }
}
