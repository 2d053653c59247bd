//! Harvest orchestration
//!
//! The [`Harvester`] owns the current record list and ties the page crawler,
//! the image acquirer and the snapshot store together:
//!
//! - `load` replaces the list with a stored snapshot
//! - `crawl` replaces the list with a fresh crawl, carrying reservations and
//!   cached covers over from the previous list, then starts cover acquisition
//!   and saves
//!
//! At most one image session is alive at a time; every operation that
//! replaces the record list cancels it and waits for it first.

use crate::classifier::Classifier;
use crate::config::{validate, Config};
use crate::crawler::{Coordinator, CrawlSummary, Fetcher};
use crate::images::{CoverImage, ImageAcquirer, ImageProgress, ImageSession};
use crate::record::{ImageValidator, Record, RecordHandle};
use crate::state::Period;
use crate::storage::{
    apply_reservations, load_snapshot, reservation_projection, save_snapshot, JsonSnapshotStore,
    SnapshotStore,
};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Where the current record list came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Read from a stored snapshot
    Loaded,
    /// Produced by a fresh crawl
    Crawled(CrawlSummary),
}

/// Copies cached covers onto fresh records with the same image link
///
/// The carried validator turns the next image acquisition for these records
/// into a conditional request.
///
/// # Returns
///
/// The number of records that received a cover.
pub fn carry_over_covers(fresh: &mut [Record], prior: &[Record]) -> usize {
    let cached: HashMap<&str, (&CoverImage, &ImageValidator)> = prior
        .iter()
        .filter(|r| !r.image_link.is_empty())
        .filter_map(|r| {
            r.cover
                .as_ref()
                .map(|cover| (r.image_link.as_str(), (cover, &r.image_validator)))
        })
        .collect();

    let mut carried = 0;
    for record in fresh.iter_mut().filter(|r| r.cover.is_none()) {
        if let Some((cover, validator)) = cached.get(record.image_link.as_str()) {
            record.cover = Some((*cover).clone());
            record.image_validator = (*validator).clone();
            carried += 1;
        }
    }
    carried
}

/// Owns the record list of one period and its background cover session
pub struct Harvester {
    coordinator: Coordinator,
    acquirer: ImageAcquirer,
    store: Arc<dyn SnapshotStore + Send + Sync>,
    period: Option<Period>,
    records: Vec<RecordHandle>,
    image_session: Option<ImageSession>,
    shutdown: CancellationToken,
}

impl Harvester {
    /// Builds a harvester storing snapshots under `output.data-dir`
    pub fn new(config: Config) -> Result<Self> {
        let store = JsonSnapshotStore::new(&config.output.data_dir);
        Self::with_store(config, Arc::new(store))
    }

    /// Builds a harvester on a custom snapshot backend
    ///
    /// The configuration is validated first.
    pub fn with_store(config: Config, store: Arc<dyn SnapshotStore + Send + Sync>) -> Result<Self> {
        validate(&config)?;
        let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
        let fetcher = Fetcher::new(&config.user_agent, timeout)?;
        let classifier = Arc::new(Classifier::new(&config.classifier)?);
        let coordinator = Coordinator::new(fetcher.clone(), classifier, config.crawler)?;
        let acquirer = ImageAcquirer::new(fetcher, config.images);

        Ok(Self {
            coordinator,
            acquirer,
            store,
            period: None,
            records: Vec::new(),
            image_session: None,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops the running crawl and image session when cancelled
    ///
    /// Once cancelled, later crawls stop before their first page.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Period of the current record list
    pub fn period(&self) -> Option<Period> {
        self.period
    }

    pub fn records(&self) -> &[RecordHandle] {
        &self.records
    }

    /// Current state of every record
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.iter().map(RecordHandle::snapshot).collect()
    }

    /// Handles ordered by release date, then title
    pub fn records_by_release_date(&self) -> Vec<RecordHandle> {
        let mut keyed: Vec<(String, String, RecordHandle)> = self
            .records
            .iter()
            .map(|h| {
                let r = h.lock();
                (r.release_date.clone(), r.title.clone(), h.clone())
            })
            .collect();
        keyed.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        keyed.into_iter().map(|(_, _, h)| h).collect()
    }

    /// URL of the first listing page of `period`
    pub fn first_page_url(&self, period: Period) -> Url {
        self.coordinator.first_page_url(period)
    }

    /// Replaces the record list with the stored snapshot of `period`
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Snapshot loaded
    /// * `Ok(false)` - No snapshot, or an empty one; the current list is left as is
    /// * `Err(HarvestError::Storage)` - The snapshot could not be read
    pub async fn load(&mut self, period: Period) -> Result<bool> {
        self.cancel_images().await;

        let Some(records) = load_snapshot(self.store.as_ref(), period)? else {
            return Ok(false);
        };
        self.replace_records(period, records);
        Ok(true)
    }

    /// Replaces the record list with a fresh crawl of `period`
    ///
    /// Reservations and cached covers of the previous list (or, for another
    /// period, of its stored snapshot) are carried over. Cover acquisition
    /// starts in the background and the result is saved before returning.
    ///
    /// A crawl that was cancelled or could not read a single page leaves the
    /// record list and the stored snapshot untouched.
    pub async fn crawl(&mut self, period: Period) -> Result<CrawlSummary> {
        self.cancel_images().await;

        let prior = self.prior_records(period);
        let outcome = self
            .coordinator
            .crawl(period, self.shutdown.child_token())
            .await;

        if outcome.summary.cancelled {
            tracing::warn!("Crawl of {} cancelled, keeping the previous records", period);
            return Ok(outcome.summary);
        }
        if outcome.summary.pages_fetched == 0 {
            tracing::warn!(
                "No listing page of {} could be fetched, keeping the previous records",
                period
            );
            return Ok(outcome.summary);
        }

        let mut records = outcome.records;
        if !prior.is_empty() {
            let carried = carry_over_covers(&mut records, &prior);
            let reserved = apply_reservations(records.iter_mut(), &reservation_projection(&prior));
            tracing::info!(
                "Carried over {} covers and {} reservations",
                carried,
                reserved
            );
        }

        self.replace_records(period, records);
        self.start_images().await;
        self.save()?;

        Ok(outcome.summary)
    }

    /// Loads the snapshot of `period`, crawling when there is none
    ///
    /// A snapshot that cannot be read is logged and treated as absent. When
    /// a `refresh` crawl does not reach the catalog, the stored snapshot is
    /// loaded instead.
    pub async fn load_or_crawl(&mut self, period: Period, refresh: bool) -> Result<SnapshotSource> {
        if !refresh && self.try_load(period).await {
            return Ok(SnapshotSource::Loaded);
        }

        let summary = self.crawl(period).await?;
        if refresh
            && !summary.reached_catalog()
            && self.period != Some(period)
            && self.try_load(period).await
        {
            tracing::info!("Falling back to the stored snapshot of {}", period);
            return Ok(SnapshotSource::Loaded);
        }
        Ok(SnapshotSource::Crawled(summary))
    }

    /// `load` with read failures logged and reported as absent
    async fn try_load(&mut self, period: Period) -> bool {
        match self.load(period).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Ignoring unreadable snapshot for {}: {}", period, e);
                false
            }
        }
    }

    /// Saves the current record list and its reservation projection
    pub fn save(&self) -> Result<()> {
        let Some(period) = self.period else {
            tracing::debug!("Nothing to save");
            return Ok(());
        };
        save_snapshot(self.store.as_ref(), period, &self.snapshot())?;
        Ok(())
    }

    /// Flips the reservation mark of the record at `index`
    pub fn toggle_reserved(&self, index: usize) -> Option<bool> {
        self.records.get(index).map(RecordHandle::toggle_reserved)
    }

    /// Sets the reservation mark of the record at `index`
    pub fn set_reserved(&self, index: usize, reserved: bool) -> bool {
        match self.records.get(index) {
            Some(handle) => {
                handle.set_reserved(reserved);
                true
            }
            None => false,
        }
    }

    /// Starts (or restarts) cover acquisition for the current list
    pub async fn start_images(&mut self) {
        self.cancel_images().await;
        if self.records.is_empty() {
            return;
        }
        self.image_session = Some(
            self.acquirer
                .start_with_cancel(self.records.clone(), self.shutdown.child_token()),
        );
    }

    /// Progress of the current image session, if one was started
    pub fn image_progress(&self) -> Option<ImageProgress> {
        self.image_session.as_ref().map(ImageSession::progress)
    }

    /// Cancels the image session and waits for in-flight records
    pub async fn cancel_images(&mut self) {
        if let Some(mut session) = self.image_session.take() {
            if session.is_running() {
                tracing::info!("Cancelling image acquisition");
            }
            session.cancel_and_wait().await;
        }
    }

    /// Waits for the image session to drain
    pub async fn wait_for_images(&mut self) {
        if let Some(session) = self.image_session.as_mut() {
            session.wait().await;
        }
    }

    fn replace_records(&mut self, period: Period, records: Vec<Record>) {
        self.records = records.into_iter().map(RecordHandle::new).collect();
        self.period = Some(period);
    }

    /// Records to carry reservations and covers from
    fn prior_records(&self, period: Period) -> Vec<Record> {
        if self.period == Some(period) {
            return self.snapshot();
        }
        match load_snapshot(self.store.as_ref(), period) {
            Ok(records) => records.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable snapshot for {}: {}", period, e);
                Vec::new()
            }
        }
    }
}
