//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Claiming due manifests batch by batch
//! - Draining each batch with a bounded worker pool
//! - Fetching, parsing, and validating each manifest
//! - Persisting results and lifecycle transitions
//! - Handing stored manifests to the search index

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::scheduler::{JobQueue, Scheduler};
use crate::crawler::signal::StopSignal;
use crate::output::SearchIndex;
use crate::schema::{LookupTables, Manifest, Schema, MAX_URL_LEN};
use crate::state::{LifecyclePolicy, ManifestStatus};
use crate::storage::{CrawlFailure, ManifestJob, ManifestRecord, SqliteStorage, Storage};
use crate::url::parse_http_url;
use crate::FundwatchError;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// How a single crawl job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Stored and submitted with the given status
    Succeeded(ManifestStatus),
    /// The fetch failed; the failure was recorded
    FetchFailed(CrawlFailure),
    /// The body did not parse or validate; the failure was recorded
    Invalid(CrawlFailure),
    /// The result could not be persisted
    StorageFailed,
    /// Abandoned because a stop was requested
    Cancelled,
}

/// Tally of one crawl cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub claimed: usize,
    pub succeeded: usize,
    pub fetch_failed: usize,
    pub invalid: usize,
    pub storage_failed: usize,
    pub cancelled: usize,
    /// Manifests that moved to `expiring` this cycle
    pub newly_expiring: usize,
    /// Manifests that moved to `disabled` this cycle
    pub newly_disabled: usize,
}

impl CrawlStats {
    pub fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Succeeded(_) => self.succeeded += 1,
            JobOutcome::FetchFailed(failure) => {
                self.fetch_failed += 1;
                self.record_transition(failure);
            }
            JobOutcome::Invalid(failure) => {
                self.invalid += 1;
                self.record_transition(failure);
            }
            JobOutcome::StorageFailed => self.storage_failed += 1,
            JobOutcome::Cancelled => self.cancelled += 1,
        }
    }

    fn record_transition(&mut self, failure: &CrawlFailure) {
        if !failure.changed() {
            return;
        }
        match failure.status {
            ManifestStatus::Expiring => self.newly_expiring += 1,
            ManifestStatus::Disabled => self.newly_disabled += 1,
            _ => {}
        }
    }

    pub fn merge(&mut self, other: &CrawlStats) {
        self.claimed += other.claimed;
        self.succeeded += other.succeeded;
        self.fetch_failed += other.fetch_failed;
        self.invalid += other.invalid;
        self.storage_failed += other.storage_failed;
        self.cancelled += other.cancelled;
        self.newly_expiring += other.newly_expiring;
        self.newly_disabled += other.newly_disabled;
    }

    /// Jobs that reached an outcome
    pub fn processed(&self) -> usize {
        self.succeeded + self.fetch_failed + self.invalid + self.storage_failed + self.cancelled
    }
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} claimed, {} ok, {} fetch errors, {} invalid, {} storage errors, {} cancelled, \
             {} now expiring, {} now disabled",
            self.claimed,
            self.succeeded,
            self.fetch_failed,
            self.invalid,
            self.storage_failed,
            self.cancelled,
            self.newly_expiring,
            self.newly_disabled
        )
    }
}

/// Everything a worker needs to process a job
struct Pipeline {
    storage: Arc<Mutex<SqliteStorage>>,
    fetcher: Arc<Fetcher>,
    schema: Schema,
    index: Arc<dyn SearchIndex>,
    policy: LifecyclePolicy,
    stop: StopSignal,
}

enum Stage {
    Fetch,
    Validate,
}

impl Pipeline {
    fn lock_storage(&self) -> Result<MutexGuard<'_, SqliteStorage>, FundwatchError> {
        self.storage
            .lock()
            .map_err(|_| FundwatchError::Storage("storage lock poisoned".to_string()))
    }

    /// Processes one claimed job and settles its claim
    ///
    /// Jobs that end without a recorded outcome give their claim back, so
    /// the next cycle picks them up again.
    async fn run_job(&self, job: ManifestJob) -> JobOutcome {
        let id = job.id;
        let url = job.url.clone();

        let outcome = if self.stop.is_stopped() {
            JobOutcome::Cancelled
        } else {
            self.process_job(job).await
        };

        if matches!(outcome, JobOutcome::Cancelled | JobOutcome::StorageFailed) {
            let released = self.lock_storage().and_then(|mut storage| {
                storage.release_claim(id).map_err(FundwatchError::from)
            });
            if let Err(e) = released {
                tracing::error!("Failed to release claim on {}: {}", url, e);
            }
        }

        outcome
    }

    /// Fetches, validates, and stores one manifest
    async fn process_job(&self, job: ManifestJob) -> JobOutcome {
        let Some(url) = job.parsed_url.clone() else {
            let message = format!("stored URL '{}' does not parse", job.url);
            return self.record_failure(&job, Stage::Validate, message);
        };

        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(FetchError::Cancelled) => return JobOutcome::Cancelled,
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", job.url, e);
                return self.record_failure(&job, Stage::Fetch, format!("fetch failed: {}", e));
            }
        };

        let validated = match Manifest::parse(&job.url, &body) {
            Ok(manifest) => self.schema.validate(manifest).await,
            Err(e) => Err(e),
        };

        let manifest = match validated {
            Ok(manifest) => manifest,
            // Ownership fetches abort on stop and would be misreported as invalid
            Err(_) if self.stop.is_stopped() => return JobOutcome::Cancelled,
            Err(e) => {
                tracing::info!("Manifest {} is invalid: {}", job.url, e);
                return self.record_failure(
                    &job,
                    Stage::Validate,
                    format!("invalid manifest: {}", e),
                );
            }
        };

        let stored = self.lock_storage().and_then(|mut storage| {
            storage
                .record_crawl_success(job.id, &manifest, &self.policy)
                .map_err(FundwatchError::from)
        });

        let success = match stored {
            Ok(success) => success,
            Err(e) => {
                tracing::error!("Failed to store manifest {}: {}", job.url, e);
                return JobOutcome::StorageFailed;
            }
        };

        let status = success.record.status;
        if success.changed() {
            tracing::info!(
                "Manifest {} is now {} (was {})",
                job.url,
                status,
                success.previous
            );
        }

        if status == ManifestStatus::Disabled {
            tracing::info!("Manifest {} was disabled during its crawl, not indexing", job.url);
        } else if let Err(e) = self.index.submit(&success.record) {
            tracing::warn!("Failed to index manifest {}: {}", success.record.url, e);
        }

        JobOutcome::Succeeded(status)
    }

    fn record_failure(&self, job: &ManifestJob, stage: Stage, message: String) -> JobOutcome {
        let recorded = self.lock_storage().and_then(|mut storage| {
            storage
                .record_crawl_failure(job.id, &message, &self.policy)
                .map_err(FundwatchError::from)
        });

        let failure = match recorded {
            Ok(failure) => failure,
            Err(e) => {
                tracing::error!("Failed to record crawl failure for {}: {}", job.url, e);
                return JobOutcome::StorageFailed;
            }
        };

        if failure.changed() {
            tracing::info!(
                "Manifest {} moved from {} to {} after {} consecutive errors",
                job.url,
                failure.previous,
                failure.status,
                failure.crawl_errors
            );
        }

        match stage {
            Stage::Fetch => JobOutcome::FetchFailed(failure),
            Stage::Validate => JobOutcome::Invalid(failure),
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    pipeline: Arc<Pipeline>,
    workers: usize,
    batch_size: usize,
    recrawl_age: Duration,
    stop: StopSignal,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `storage` - The opened manifest store
    /// * `tables` - Lookup tables for validation
    /// * `index` - Receives every successfully stored manifest
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(FundwatchError)` - The HTTP client could not be built
    pub fn new(
        config: &Config,
        storage: SqliteStorage,
        tables: LookupTables,
        index: Arc<dyn SearchIndex>,
    ) -> Result<Self, FundwatchError> {
        let stop = StopSignal::new();
        let fetcher = Arc::new(Fetcher::from_config(config, stop.clone())?);
        let schema = Schema::new(tables, fetcher.clone(), config.schema.well_known_path.clone());

        let pipeline = Pipeline {
            storage: Arc::new(Mutex::new(
                storage.with_claim_lease(config.crawl.claim_lease()),
            )),
            fetcher,
            schema,
            index,
            policy: config.lifecycle.policy(),
            stop: stop.clone(),
        };

        Ok(Self {
            pipeline: Arc::new(pipeline),
            workers: config.crawl.workers.max(1) as usize,
            batch_size: config.crawl.batch_size.max(1) as usize,
            recrawl_age: config.crawl.recrawl_age(),
            stop,
        })
    }

    /// The signal that stops this coordinator
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Shared handle to the manifest store
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        self.pipeline.storage.clone()
    }

    pub fn fetcher(&self) -> Arc<Fetcher> {
        self.pipeline.fetcher.clone()
    }

    /// Runs crawl cycles every `interval` until stopped
    ///
    /// A failed cycle is logged and retried on the next tick.
    pub async fn run(&self, interval: Duration) {
        loop {
            if let Err(e) = self.run_cycle().await {
                tracing::error!("Crawl cycle failed: {}", e);
            }

            if !self.stop.sleep(interval).await {
                tracing::info!("Stop requested, crawler exiting");
                return;
            }
        }
    }

    /// Crawls every due manifest once
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStats)` - Outcomes of this cycle
    /// * `Err(FundwatchError)` - A batch could not be claimed
    pub async fn run_cycle(&self) -> Result<CrawlStats, FundwatchError> {
        let started = Instant::now();
        let mut scheduler = Scheduler::new(self.recrawl_age, self.batch_size);
        let mut stats = CrawlStats::default();

        while !self.stop.is_stopped() {
            let jobs = {
                let mut storage = self.pipeline.lock_storage()?;
                scheduler.next_batch(&mut *storage)?
            };

            if jobs.is_empty() {
                break;
            }

            stats.claimed += jobs.len();
            let batch = self.process_batch(jobs).await;
            stats.merge(&batch);

            tracing::info!(
                "Progress: {} manifests processed, cursor at {}",
                stats.processed(),
                scheduler.cursor()
            );
        }

        tracing::info!("Crawl cycle finished in {:?}: {}", started.elapsed(), stats);
        Ok(stats)
    }

    async fn process_batch(&self, jobs: Vec<ManifestJob>) -> CrawlStats {
        let queue = Arc::new(JobQueue::new(jobs));
        let workers = self.workers.min(queue.len()).max(1);
        let mut tasks = JoinSet::new();

        for _ in 0..workers {
            let queue = queue.clone();
            let pipeline = self.pipeline.clone();

            tasks.spawn(async move {
                let mut stats = CrawlStats::default();
                while let Some(job) = queue.pop() {
                    let outcome = pipeline.run_job(job).await;
                    stats.record(&outcome);
                }
                stats
            });
        }

        let mut stats = CrawlStats::default();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(worker_stats) => stats.merge(&worker_stats),
                Err(e) => tracing::error!("Crawl worker failed: {}", e),
            }
        }
        stats
    }

    /// Fetches, validates, and registers a manifest as pending
    ///
    /// # Arguments
    ///
    /// * `url` - The manifest URL
    ///
    /// # Returns
    ///
    /// * `Ok(ManifestRecord)` - The stored manifest
    /// * `Err(FundwatchError)` - The URL, fetch, or manifest was rejected
    pub async fn submit(&self, url: &str) -> Result<ManifestRecord, FundwatchError> {
        let url = parse_http_url(url, MAX_URL_LEN)?;

        let body = self
            .pipeline
            .fetcher
            .fetch(&url)
            .await
            .map_err(|source| FundwatchError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let invalid = |source| FundwatchError::Invalid {
            url: url.to_string(),
            source,
        };
        let manifest = Manifest::parse(url.as_str(), &body).map_err(invalid)?;
        let manifest = self.pipeline.schema.validate(manifest).await.map_err(invalid)?;

        let record = self
            .pipeline
            .lock_storage()?
            .upsert_manifest(&manifest, ManifestStatus::Pending)?;

        tracing::info!("Registered manifest {} as {}", record.url, record.status);
        Ok(record)
    }
}
