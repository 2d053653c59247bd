//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Period`: The year+month key of one crawl and one snapshot
//! - `CrawlSession`: Page cursor, stop flag, cancellation and counters shared by the page workers

mod period;
mod session;

// Re-export main types
pub use period::Period;
pub use session::CrawlSession;
