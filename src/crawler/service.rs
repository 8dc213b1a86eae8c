//! Crawl service
//!
//! Owns everything a pipeline run needs and is the single entry point for
//! running one, whether the trigger is the scheduler or the API.

use crate::config::Config;
use crate::crawler::detail::DetailReconciler;
use crate::crawler::paginator::ListingPaginator;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::upsert::upsert_all;
use crate::crawler::HttpFetcher;
use crate::state::{CrawlGuard, Pipeline};
use crate::storage::{self, RunCounters, RunStatus, SharedStorage, Storage, StorageResult};
use crate::CrawlError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a pipeline run that was allowed to start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub pipeline: Pipeline,
    pub run_id: i64,
    #[serde(flatten)]
    pub counters: RunCounters,
}

/// Outcome of asking for a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Another run of the same pipeline is in flight; nothing was done
    AlreadyRunning,

    /// The run went through to the end
    Completed(RunReport),
}

/// Runs the listing and detail pipelines
///
/// Cheap to clone; clones share storage, the HTTP client and both guards.
#[derive(Clone)]
pub struct CrawlService {
    config: Arc<Config>,
    config_hash: Arc<str>,
    fetcher: HttpFetcher,
    storage: SharedStorage,
    listing_guard: CrawlGuard,
    detail_guard: CrawlGuard,
}

impl CrawlService {
    /// Creates a crawl service
    ///
    /// # Arguments
    ///
    /// * `config` - The effective configuration
    /// * `config_hash` - Hash recorded on every run
    /// * `storage` - Shared catalog storage
    pub fn new(
        config: Config,
        config_hash: String,
        storage: SharedStorage,
    ) -> Result<Self, CrawlError> {
        let fetcher = HttpFetcher::new(&config.upstream)?;

        Ok(Self {
            config: Arc::new(config),
            config_hash: Arc::from(config_hash),
            fetcher,
            storage,
            listing_guard: CrawlGuard::new(Pipeline::Listing),
            detail_guard: CrawlGuard::new(Pipeline::Detail),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// The guard for a pipeline
    pub fn guard(&self, pipeline: Pipeline) -> &CrawlGuard {
        match pipeline {
            Pipeline::Listing => &self.listing_guard,
            Pipeline::Detail => &self.detail_guard,
        }
    }

    /// Whether a pipeline run is currently in flight
    pub fn is_running(&self, pipeline: Pipeline) -> bool {
        self.guard(pipeline).is_running()
    }

    /// Marks runs left `running` by a previous process as interrupted
    pub fn recover_interrupted_runs(&self) -> StorageResult<u64> {
        let recovered = storage::lock(&self.storage)?.mark_interrupted_runs()?;
        if recovered > 0 {
            warn!(runs = recovered, "Marked unfinished runs from a previous process as interrupted");
        }
        Ok(recovered)
    }

    /// Runs a pipeline on demand
    ///
    /// Returns `TriggerOutcome::AlreadyRunning` immediately if the pipeline is
    /// busy. Errors are returned to the caller after the run is recorded as
    /// failed.
    pub async fn trigger_manually(&self, pipeline: Pipeline) -> Result<TriggerOutcome, CrawlError> {
        let _permit = match self.guard(pipeline).try_enter() {
            Some(permit) => permit,
            None => {
                info!(pipeline = %pipeline, "Crawl already running, skipping");
                return Ok(TriggerOutcome::AlreadyRunning);
            }
        };

        let run_id = storage::lock(&self.storage)?.create_run(pipeline, &self.config_hash)?;
        info!(pipeline = %pipeline, run_id = run_id, "Crawl run started");

        let result = match pipeline {
            Pipeline::Listing => self.run_listing().await,
            Pipeline::Detail => self.run_details().await,
        };

        match result {
            Ok(counters) => {
                storage::lock(&self.storage)?.finish_run(
                    run_id,
                    RunStatus::Completed,
                    counters,
                    None,
                )?;
                info!(
                    pipeline = %pipeline,
                    run_id = run_id,
                    attempted = counters.attempted,
                    succeeded = counters.succeeded,
                    failed = counters.failed,
                    skipped = counters.skipped,
                    "Crawl run completed"
                );
                Ok(TriggerOutcome::Completed(RunReport {
                    pipeline,
                    run_id,
                    counters,
                }))
            }
            Err(e) => {
                let message = e.to_string();
                let recorded = storage::lock(&self.storage).and_then(|mut store| {
                    store.finish_run(
                        run_id,
                        RunStatus::Failed,
                        RunCounters::default(),
                        Some(&message),
                    )
                });
                if let Err(ledger_error) = recorded {
                    warn!(run_id = run_id, error = %ledger_error, "Failed to record run failure");
                }
                Err(e)
            }
        }
    }

    /// Runs a pipeline from a scheduled trigger
    ///
    /// Failures are logged and swallowed so the schedule keeps going.
    pub async fn run_scheduled(&self, pipeline: Pipeline) {
        match self.trigger_manually(pipeline).await {
            Ok(TriggerOutcome::Completed(report)) => {
                info!(pipeline = %pipeline, run_id = report.run_id, "Scheduled crawl finished");
            }
            Ok(TriggerOutcome::AlreadyRunning) => {}
            Err(e) => {
                error!(pipeline = %pipeline, error = %e, "Scheduled crawl failed");
            }
        }
    }

    async fn run_listing(&self) -> Result<RunCounters, CrawlError> {
        let paginator = ListingPaginator::new(
            &self.fetcher,
            RetryPolicy::linear(&self.config.retry),
            self.config.crawl.listing_max_pages,
        );
        let items = paginator.fetch_all_listings().await?;
        let fetched = items.len() as u64;

        // A full catalog batch holds the lock for a while; keep it off the async workers
        let shared = self.storage.clone();
        let summary = tokio::task::spawn_blocking(move || {
            let mut store = storage::lock(&shared)?;
            upsert_all(&mut *store, items)
        })
        .await??;

        Ok(RunCounters {
            attempted: fetched,
            succeeded: summary.written as u64,
            failed: 0,
            skipped: summary.skipped as u64,
        })
    }

    async fn run_details(&self) -> Result<RunCounters, CrawlError> {
        let reconciler = DetailReconciler::new(
            &self.fetcher,
            &self.storage,
            RetryPolicy::fixed(&self.config.retry),
            self.config.crawl.detail_throttle(),
        );
        let summary = reconciler.reconcile_missing_details().await?;

        Ok(RunCounters {
            attempted: summary.attempted,
            succeeded: summary.succeeded,
            failed: summary.failed,
            skipped: summary.skipped,
        })
    }
}
