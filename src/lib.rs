//! Movie-Catalog: an incremental movie catalog crawler
//!
//! This crate pulls paginated listings and per-title detail pages from an upstream
//! movie API, reconciles them into a SQLite catalog, and serves the catalog through
//! a small paginated REST API.
//!
//! The crawl side is split into two independently scheduled pipelines:
//!
//! - the **listing** pipeline walks every upstream listing page and upserts the
//!   catalog by slug
//! - the **detail** pipeline fetches detail pages for catalog titles that do not
//!   have one yet, one title at a time

pub mod api;
pub mod config;
pub mod crawler;
pub mod output;
pub mod query;
pub mod schedule;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Movie-Catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Query error: {0}")]
    Query(#[from] query::QueryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid cron expression: {0}")]
    InvalidCron(#[from] schedule::CronError),
}

/// Errors that abort a crawl pipeline run
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Listing page {page} failed: {source}")]
    ListingPage {
        page: u32,
        #[source]
        source: crawler::UpstreamError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias for Movie-Catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlService, TriggerOutcome};
pub use state::{CrawlGuard, Pipeline};
pub use storage::{CatalogEntry, DetailRecord, SqliteStorage};
