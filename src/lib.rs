//! Kobo-Harvest: a monthly new-release catalog harvester
//!
//! This crate crawls the paginated monthly release calendar of a single
//! e-book storefront, filters out per-chapter and split-volume variants,
//! caches a resized cover image per title, and persists the result per month
//! together with the user's reservation marks.

pub mod classifier;
pub mod config;
pub mod crawler;
pub mod harvester;
pub mod images;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Kobo-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid period '{0}', expected YYYY-MM")]
    InvalidPeriod(String),

    #[error("Image error: {0}")]
    Image(#[from] images::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid classifier pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Kobo-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use classifier::Classifier;
pub use config::Config;
pub use harvester::Harvester;
pub use images::CoverImage;
pub use record::{ImageValidator, Record, RecordHandle, ReservationEntry};
pub use state::{CrawlSession, Period};
