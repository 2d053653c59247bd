//! Crawler module for the monthly release listing
//!
//! This module contains:
//! - HTTP fetching with browser-like header profiles and conditional requests
//! - Listing page parsing
//! - The page worker pool with stop detection and retry/backoff

mod coordinator;
mod fetcher;
mod parser;

pub use coordinator::{listing_url, Coordinator, CrawlOutcome, CrawlSummary};
pub use fetcher::{
    build_http_client, image_headers, page_headers, validator_from_headers, FetchResult, Fetcher,
};
pub use parser::{parse_listing, RawItem};
