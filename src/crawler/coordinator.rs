//! Page crawler - drives the worker pool over the monthly listing
//!
//! Workers claim increasing page indices from a shared [`CrawlSession`],
//! fetch and parse each page, and append the records that survive the
//! classifier to a shared accumulator. The first page that parses to an
//! empty listing marks the end of the catalog and stops every worker.

use crate::classifier::Classifier;
use crate::config::CrawlerConfig;
use crate::crawler::parser::parse_listing;
use crate::crawler::{FetchResult, Fetcher};
use crate::record::Record;
use crate::state::{CrawlSession, Period};
use crate::HarvestError;
use futures::future::join_all;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Listing sort order: by release date
const SORT_BY_RELEASE_DATE: &str = "14";

/// Consecutive failed pages after which an unreachable listing is reported
const UNREACHABLE_WARNING_PAGES: usize = 10;

/// Builds the URL of one listing page
///
/// ```
/// use kobo_harvest::crawler::listing_url;
/// use kobo_harvest::Period;
/// use url::Url;
///
/// let base = Url::parse("https://books.example.com/calendar/101904/monthly/").unwrap();
/// let url = listing_url(&base, Period::new(2025, 7).unwrap(), 3);
/// assert_eq!(
///     url.as_str(),
///     "https://books.example.com/calendar/101904/monthly/?tid=2025-07-01&s=14&p=3#rclist"
/// );
/// ```
pub fn listing_url(base: &Url, period: Period, page: u32) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("tid", &period.listing_date())
        .append_pair("s", SORT_BY_RELEASE_DATE)
        .append_pair("p", &page.to_string());
    url.set_fragment(Some("rclist"));
    url
}

/// Counters of a finished crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub period: Period,

    /// Items extracted from the listing, before classification
    pub loaded: usize,

    /// Items rejected by the classifier
    pub skipped: usize,

    /// Records kept after classification and deduplication
    pub kept: usize,

    pub pages_fetched: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} loaded, {} skipped, {} kept from {} pages in {:.1}s",
            self.period,
            self.loaded,
            self.skipped,
            self.kept,
            self.pages_fetched,
            self.elapsed.as_secs_f64()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

impl CrawlSummary {
    /// True when at least one page was read and the crawl was not cancelled
    ///
    /// Only such a crawl may replace a stored snapshot.
    pub fn reached_catalog(&self) -> bool {
        !self.cancelled && self.pages_fetched > 0
    }
}

/// Result of [`Coordinator::crawl`]
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Accepted records, in no particular order
    pub records: Vec<Record>,
    pub summary: CrawlSummary,
}

/// Records accepted so far, deduplicated on `(title, releaseDate, sourceLink)`
#[derive(Default)]
struct Accumulator {
    inner: Mutex<AccumulatorInner>,
}

#[derive(Default)]
struct AccumulatorInner {
    records: Vec<Record>,
    seen: HashSet<(String, String, String)>,
}

impl Accumulator {
    /// Appends the record unless an identical item was already accepted
    fn push(&self, record: Record) -> bool {
        let key = (
            record.title.clone(),
            record.release_date.clone(),
            record.source_link.clone(),
        );
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !inner.seen.insert(key) {
            return false;
        }
        inner.records.push(record);
        true
    }

    fn into_records(self) -> Vec<Record> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .records
    }
}

/// Crawls the monthly listing with a fixed pool of page workers
#[derive(Debug, Clone)]
pub struct Coordinator {
    fetcher: Fetcher,
    classifier: Arc<Classifier>,
    config: Arc<CrawlerConfig>,
    base_url: Url,
}

impl Coordinator {
    /// Creates a coordinator
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to crawl
    /// * `Err(HarvestError::UrlParse)` - The configured listing URL is invalid
    pub fn new(
        fetcher: Fetcher,
        classifier: Arc<Classifier>,
        config: CrawlerConfig,
    ) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.listing_url)?;
        Ok(Self {
            fetcher,
            classifier,
            config: Arc::new(config),
            base_url,
        })
    }

    /// URL of the first listing page of `period`
    pub fn first_page_url(&self, period: Period) -> Url {
        listing_url(&self.base_url, period, 1)
    }

    /// Crawls every listing page of `period`
    ///
    /// Never fails: pages that exhaust their retries contribute no records.
    /// Cancelling `cancel` stops workers from claiming further pages; pages
    /// already being fetched are finished.
    pub async fn crawl(&self, period: Period, cancel: CancellationToken) -> CrawlOutcome {
        let started = Instant::now();
        let session = Arc::new(CrawlSession::new(
            period,
            self.config.max_pages,
            cancel.clone(),
        ));
        let accumulator = Arc::new(Accumulator::default());

        tracing::info!(
            "Crawling {} with {} workers",
            period,
            self.config.max_concurrency
        );

        let workers = (0..self.config.max_concurrency).map(|worker| {
            let coordinator = self.clone();
            let session = Arc::clone(&session);
            let accumulator = Arc::clone(&accumulator);
            tokio::spawn(async move {
                coordinator.run_worker(worker, &session, &accumulator).await;
            })
        });

        for result in join_all(workers).await {
            if let Err(e) = result {
                tracing::error!("Page worker failed: {}", e);
            }
        }

        let records = match Arc::try_unwrap(accumulator) {
            Ok(accumulator) => accumulator.into_records(),
            Err(shared) => {
                // only reachable if a worker task leaked its handle
                let inner = shared.inner.lock().unwrap_or_else(PoisonError::into_inner);
                inner.records.clone()
            }
        };

        let summary = CrawlSummary {
            period,
            loaded: session.loaded(),
            skipped: session.skipped(),
            kept: records.len(),
            pages_fetched: session.pages_fetched(),
            elapsed: started.elapsed(),
            cancelled: cancel.is_cancelled(),
        };
        tracing::info!("Crawl completed: {}", summary);

        CrawlOutcome { records, summary }
    }

    async fn run_worker(&self, worker: u32, session: &CrawlSession, accumulator: &Accumulator) {
        while let Some(page) = session.claim_page() {
            let url = listing_url(&self.base_url, session.period(), page);

            let Some(body) = self.fetch_listing(page, &url, session.cancel_token()).await else {
                if !session.cancel_token().is_cancelled() {
                    let failed = session.record_page_failed();
                    tracing::debug!(
                        "[worker {}] Page {} failed, {} consecutive pages failed",
                        worker,
                        page,
                        failed
                    );
                    if failed == UNREACHABLE_WARNING_PAGES {
                        tracing::warn!(
                            "{} pages in a row failed for {}, the listing may be unreachable",
                            failed,
                            session.period()
                        );
                    }
                }
                continue;
            };
            session.record_page_fetched();

            let items = parse_listing(&body);
            if items.is_empty() {
                tracing::info!("[worker {}] Page {} has no items, stopping", worker, page);
                session.stop();
                break;
            }

            let mut kept = 0;
            for item in items {
                session.record_loaded();
                let record = item.into_record(&url);
                if self.classifier.is_excluded_variant(&record) {
                    tracing::debug!("[worker {}] Skipped variant: {}", worker, record.title);
                    session.record_skipped();
                    continue;
                }
                if accumulator.push(record) {
                    kept += 1;
                }
            }
            tracing::debug!("[worker {}] Page {}: {} records kept", worker, page, kept);
        }
    }

    /// Fetches a listing page with linear backoff
    ///
    /// Returns `None` once every attempt failed or a backoff was interrupted
    /// by cancellation.
    async fn fetch_listing(
        &self,
        page: u32,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let max_attempts = self.config.page_retries();
        for attempt in 1..=max_attempts {
            match self.fetcher.fetch_page(url.as_str()).await {
                FetchResult::Ok { body, .. } => {
                    return Some(String::from_utf8_lossy(&body).into_owned());
                }
                failure => {
                    tracing::debug!(
                        "Page {} attempt {}/{} failed: {}",
                        page,
                        attempt,
                        max_attempts,
                        failure.describe()
                    );
                }
            }

            if attempt < max_attempts {
                let delay =
                    Duration::from_millis(self.config.retry_base_delay_ms * u64::from(attempt));
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        tracing::debug!("Page {} abandoned on cancellation", page);
                        return None;
                    }
                }
            }
        }

        tracing::warn!("Max retries reached for page {} ({})", page, url);
        None
    }
}
