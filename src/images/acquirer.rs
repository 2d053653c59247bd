//! Background cover acquisition
//!
//! Covers are fetched by a fixed pool of workers that pull record indices
//! from a shared cursor. Each record is requested conditionally on its
//! previous validator, so unchanged covers cost a single 304 round trip.
//!
//! The pool is independent of the page crawler's: a crawl and an image
//! session never share a concurrency budget.

use crate::config::ImageConfig;
use crate::crawler::{validator_from_headers, FetchResult, Fetcher};
use crate::images::CoverImage;
use crate::record::{ImageValidator, RecordHandle};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Point-in-time view of an image session, polled by the display layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProgress {
    /// Records finished, with or without a new cover
    pub completed: usize,

    /// Records handed to the session
    pub total: usize,

    /// `min(100, ceil(completed / total * 100))`
    pub percent: u8,

    /// Whether the session is still running
    pub in_progress: bool,

    /// Records that received a freshly downloaded cover
    pub images_loaded: usize,
}

/// Percentage of completed records, rounded up and capped at 100
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (completed * 100).div_ceil(total);
    percent.min(100) as u8
}

/// Shared counters of an image session
#[derive(Debug, Default)]
pub struct ProgressCounters {
    completed: AtomicUsize,
    total: AtomicUsize,
    images_loaded: AtomicUsize,
    running: AtomicBool,
}

impl ProgressCounters {
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> ImageProgress {
        let completed = self.completed.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        ImageProgress {
            completed,
            total,
            percent: progress_percent(completed, total),
            in_progress: self.running.load(Ordering::SeqCst),
            images_loaded: self.images_loaded.load(Ordering::SeqCst),
        }
    }

    fn complete(&self, outcome: Outcome) {
        if outcome == Outcome::Loaded {
            self.images_loaded.fetch_add(1, Ordering::SeqCst);
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Clears the running flag however the session ends
struct RunningGuard(Arc<ProgressCounters>);

impl RunningGuard {
    fn new(counters: Arc<ProgressCounters>) -> Self {
        counters.running.store(true, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// How a single record finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Loaded,
    NotModified,
    NoImageLink,
    DecodeFailed,
    Exhausted,
    Cancelled,
}

/// Downloads, resizes and encodes covers for a list of records
#[derive(Debug, Clone)]
pub struct ImageAcquirer {
    fetcher: Fetcher,
    config: Arc<ImageConfig>,
}

impl ImageAcquirer {
    pub fn new(fetcher: Fetcher, config: ImageConfig) -> Self {
        Self {
            fetcher,
            config: Arc::new(config),
        }
    }

    /// Starts a detached session over `records`
    ///
    /// The returned handle is the only way to observe or stop the session.
    pub fn start(&self, records: Vec<RecordHandle>) -> ImageSession {
        self.start_with_cancel(records, CancellationToken::new())
    }

    /// Starts a detached session stopped by `cancel` or by the handle
    pub fn start_with_cancel(
        &self,
        records: Vec<RecordHandle>,
        cancel: CancellationToken,
    ) -> ImageSession {
        let counters = Arc::new(ProgressCounters::new(records.len()));
        let guard = RunningGuard::new(Arc::clone(&counters));

        let acquirer = self.clone();
        let token = cancel.clone();
        let task_counters = Arc::clone(&counters);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            acquirer.acquire_images(records, token, task_counters).await;
        });

        ImageSession {
            cancel,
            counters,
            handle: Some(handle),
        }
    }

    /// Acquires covers for every record until the list drains or `cancel` fires
    ///
    /// Workers check `cancel` before claiming each record; a record already
    /// claimed is finished, except that a pending retry backoff is abandoned.
    pub async fn acquire_images(
        &self,
        records: Vec<RecordHandle>,
        cancel: CancellationToken,
        counters: Arc<ProgressCounters>,
    ) {
        let started = Instant::now();
        let records = Arc::new(records);
        let cursor = Arc::new(AtomicUsize::new(0));

        tracing::info!("Acquiring covers for {} records", records.len());

        let workers = (0..self.config.max_concurrency).map(|worker| {
            let acquirer = self.clone();
            let records = Arc::clone(&records);
            let cursor = Arc::clone(&cursor);
            let cancel = cancel.clone();
            let counters = Arc::clone(&counters);
            tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        tracing::debug!("[img worker {}] cancelled", worker);
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(record) = records.get(index) else {
                        break;
                    };
                    let outcome = acquirer.acquire_one(index, record, &cancel).await;
                    counters.complete(outcome);
                }
            })
        });

        for result in join_all(workers).await {
            if let Err(e) = result {
                tracing::error!("Image worker failed: {}", e);
            }
        }

        let progress = counters.snapshot();
        if cancel.is_cancelled() {
            tracing::info!(
                "Cover acquisition cancelled after {}/{} records",
                progress.completed,
                progress.total
            );
        } else {
            tracing::info!(
                "All covers processed in {:?} ({} downloaded)",
                started.elapsed(),
                progress.images_loaded
            );
        }
    }

    /// Runs the retry loop for one record and writes the result back
    async fn acquire_one(
        &self,
        index: usize,
        record: &RecordHandle,
        cancel: &CancellationToken,
    ) -> Outcome {
        let (url, validator) = {
            let record = record.lock();
            // Without a cached cover a 304 would leave the record empty
            let validator = if record.cover.is_some() {
                record.image_validator.clone()
            } else {
                ImageValidator::default()
            };
            (record.image_link.clone(), validator)
        };

        if url.is_empty() {
            tracing::debug!("[{}] No cover link", index);
            return Outcome::NoImageLink;
        }

        let max_retries = self.config.max_retries;
        for attempt in 1..=max_retries {
            let started = Instant::now();
            let result = self.fetcher.fetch_image(&url, &validator).await;
            tracing::debug!(
                "[{}] fetch {}: {} in {:?}",
                index,
                url,
                result.describe(),
                started.elapsed()
            );

            match result {
                FetchResult::Ok { headers, body, .. } => {
                    let factor = self.config.resize_factor;
                    let quality = self.config.jpeg_quality;
                    let converted = tokio::task::spawn_blocking(move || {
                        CoverImage::from_download(&body, factor, quality)
                    })
                    .await;

                    return match converted {
                        Ok(Ok(cover)) => {
                            let validator = validator_from_headers(&headers);
                            let mut record = record.lock();
                            record.cover = Some(cover);
                            record.image_validator = validator;
                            tracing::info!("[{}] Image loaded", index);
                            Outcome::Loaded
                        }
                        Ok(Err(e)) => {
                            tracing::warn!("[{}] Discarding cover {}: {}", index, url, e);
                            Outcome::DecodeFailed
                        }
                        Err(e) => {
                            tracing::error!("[{}] Cover conversion failed: {}", index, e);
                            Outcome::DecodeFailed
                        }
                    };
                }
                FetchResult::NotModified { .. } => {
                    tracing::info!("[{}] Image load skipped (not modified)", index);
                    return Outcome::NotModified;
                }
                failure => {
                    tracing::warn!(
                        "[{}] Image load failed ({}), attempt {}/{}",
                        index,
                        failure.describe(),
                        attempt,
                        max_retries
                    );
                    if attempt < max_retries {
                        let delay = Duration::from_millis(
                            self.config.retry_base_delay_ms * u64::from(attempt),
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.cancelled() => return Outcome::Cancelled,
                        }
                    }
                }
            }
        }

        tracing::error!("[{}] Max retries reached, skipping cover {}", index, url);
        Outcome::Exhausted
    }
}

/// Handle to a running image session
///
/// Dropping the handle detaches the session; use [`ImageSession::cancel`] to
/// stop it.
#[derive(Debug)]
pub struct ImageSession {
    cancel: CancellationToken,
    counters: Arc<ProgressCounters>,
    handle: Option<JoinHandle<()>>,
}

impl ImageSession {
    /// Asks the workers to stop claiming records
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_running(&self) -> bool {
        self.counters.snapshot().in_progress
    }

    pub fn progress(&self) -> ImageProgress {
        self.counters.snapshot()
    }

    /// Waits for the session to finish
    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Image session failed: {}", e);
            }
        }
    }

    /// Cancels the session and waits for in-flight records to finish
    pub async fn cancel_and_wait(&mut self) {
        self.cancel();
        self.wait().await;
    }
}
