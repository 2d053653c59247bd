use crate::state::Period;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Ephemeral state of one crawl invocation
///
/// Shared by every page worker of the crawl. The page cursor is the only
/// field behind a lock; counters and the stop flag are atomics.
#[derive(Debug)]
pub struct CrawlSession {
    period: Period,

    /// Next page index to hand out
    cursor: Mutex<u32>,

    /// Highest page index handed out
    max_pages: u32,

    /// Set once a page comes back without listing items
    stop: AtomicBool,

    cancel: CancellationToken,

    loaded: AtomicUsize,
    skipped: AtomicUsize,
    pages_fetched: AtomicUsize,

    /// Pages in a row that exhausted their retries
    consecutive_failures: AtomicUsize,
}

impl CrawlSession {
    /// Creates a session whose cursor starts at page 1
    pub fn new(period: Period, max_pages: u32, cancel: CancellationToken) -> Self {
        Self {
            period,
            cursor: Mutex::new(1),
            max_pages,
            stop: AtomicBool::new(false),
            cancel,
            loaded: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            pages_fetched: AtomicUsize::new(0),
            consecutive_failures: AtomicUsize::new(0),
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Claims the next page index
    ///
    /// Returns `None` once the stop flag is set, the session is cancelled or
    /// the page ceiling is reached.
    pub fn claim_page(&self) -> Option<u32> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_stopped() || self.cancel.is_cancelled() || *cursor > self.max_pages {
            return None;
        }
        let page = *cursor;
        *cursor += 1;
        Some(page)
    }

    /// Marks the end of the catalog
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn record_loaded(&self) {
        self.loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Counts a page that exhausted its retries
    ///
    /// Returns the number of failed pages since the last fetched one.
    pub fn record_page_failed(&self) -> usize {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Items extracted from listings, before classification
    pub fn loaded(&self) -> usize {
        self.loaded.load(Ordering::Relaxed)
    }

    /// Items rejected by the classifier
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::Relaxed)
    }
}
