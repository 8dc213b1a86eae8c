//! Detail reconciliation
//!
//! Finds catalog titles that have no detail record yet and fetches them one at
//! a time. A title that cannot be fetched or parsed is counted as failed and
//! the loop moves on; only storage failures abort the batch.

use crate::crawler::retry::RetryPolicy;
use crate::crawler::upstream::{normalize_episodes, parse_detail_page, UpstreamError};
use crate::crawler::{FetchError, HttpFetcher};
use crate::storage::{self, DetailRecord, MissingDetail, SharedStorage, Storage, StorageError};
use crate::CrawlError;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters for one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Candidates considered
    pub attempted: u64,

    /// Detail records written
    pub succeeded: u64,

    /// Candidates with an invalid slug, a failed fetch or a malformed body
    pub failed: u64,

    /// Candidates that turned out to have a detail record already
    pub skipped: u64,
}

/// What happened to one candidate
#[derive(Debug)]
enum SlugOutcome {
    Stored,
    AlreadyPresent,
    InvalidSlug,
    Upstream(UpstreamError),
}

/// Fetches missing detail records
pub struct DetailReconciler<'a> {
    fetcher: &'a HttpFetcher,
    storage: &'a SharedStorage,
    retry: RetryPolicy,
    throttle: Duration,
}

impl<'a> DetailReconciler<'a> {
    /// Creates a reconciler
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The upstream fetcher
    /// * `storage` - Shared catalog storage
    /// * `retry` - Retry policy for each detail request
    /// * `throttle` - Pause after each upstream request
    pub fn new(
        fetcher: &'a HttpFetcher,
        storage: &'a SharedStorage,
        retry: RetryPolicy,
        throttle: Duration,
    ) -> Self {
        Self {
            fetcher,
            storage,
            retry,
            throttle,
        }
    }

    /// Fetches a detail record for every catalog title lacking one
    ///
    /// Candidates are processed strictly one at a time.
    pub async fn reconcile_missing_details(&self) -> Result<ReconcileSummary, CrawlError> {
        let missing = storage::lock(self.storage)?.catalog_missing_details()?;
        info!(candidates = missing.len(), "Reconciling missing details");

        let mut summary = ReconcileSummary::default();

        for candidate in missing {
            summary.attempted += 1;

            match self.reconcile_one(&candidate).await? {
                SlugOutcome::Stored => {
                    summary.succeeded += 1;
                    tokio::time::sleep(self.throttle).await;
                }
                SlugOutcome::AlreadyPresent => summary.skipped += 1,
                SlugOutcome::InvalidSlug => {
                    warn!(
                        catalog_id = candidate.catalog_id,
                        slug = %candidate.slug,
                        "Catalog entry has no usable slug"
                    );
                    summary.failed += 1;
                }
                SlugOutcome::Upstream(e) => {
                    warn!(slug = %candidate.slug, error = %e, "Failed to fetch detail");
                    summary.failed += 1;
                    tokio::time::sleep(self.throttle).await;
                }
            }
        }

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Detail reconciliation finished"
        );

        Ok(summary)
    }

    async fn reconcile_one(&self, candidate: &MissingDetail) -> Result<SlugOutcome, CrawlError> {
        let slug = match candidate.slug.resolve() {
            Some(slug) => slug,
            None => return Ok(SlugOutcome::InvalidSlug),
        };

        // Another run may have written it since the candidate list was built
        let exists = storage::lock(self.storage)?.detail_exists(&slug)?;
        if exists {
            debug!(slug = %slug, "Detail already present, skipping");
            return Ok(SlugOutcome::AlreadyPresent);
        }

        let fetcher = self.fetcher;
        let slug_ref: &str = &slug;
        let body = match self
            .retry
            .run_if(
                move |_| fetcher.fetch_detail(slug_ref),
                FetchError::is_transient,
            )
            .await
        {
            Ok(body) => body,
            Err(e) => return Ok(SlugOutcome::Upstream(e.into())),
        };

        let page = match parse_detail_page(&body) {
            Ok(page) => page,
            Err(e) => return Ok(SlugOutcome::Upstream(e.into())),
        };

        let record = DetailRecord {
            slug: slug.clone(),
            catalog_id: Some(candidate.catalog_id),
            movie: page.movie,
            episodes: normalize_episodes(page.episodes),
            created_at: None,
        };

        let inserted = storage::lock(self.storage)?.insert_detail(&record);
        match inserted {
            Ok(()) => {
                info!(slug = %slug, "Stored detail");
                Ok(SlugOutcome::Stored)
            }
            Err(StorageError::DuplicateKey(_)) => {
                debug!(slug = %slug, "Detail written concurrently, skipping");
                Ok(SlugOutcome::AlreadyPresent)
            }
            Err(e) => Err(e.into()),
        }
    }
}
