//! Crawler module for pulling the upstream catalog
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and error classification
//! - Retry policies with fixed or linear back-off
//! - Parsing and validation of upstream responses
//! - The listing walk and catalog upsert
//! - Detail reconciliation
//! - The service that runs either pipeline behind its guard

mod detail;
mod fetcher;
mod paginator;
mod retry;
mod service;
mod upsert;
mod upstream;

pub use detail::{DetailReconciler, ReconcileSummary};
pub use fetcher::{build_http_client, FetchError, HttpFetcher};
pub use paginator::ListingPaginator;
pub use retry::{Backoff, RetryPolicy};
pub use service::{CrawlService, RunReport, TriggerOutcome};
pub use upsert::{prepare_entries, upsert_all, UpsertSummary};
pub use upstream::{
    derive_episode_slug, normalize_episodes, parse_detail_page, parse_listing_page, DetailPage,
    ListingPage, MalformedResponse, RawEpisode, RawListingItem, RawServerData, UpstreamError,
};
