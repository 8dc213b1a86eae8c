//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::Pipeline;
use crate::storage::{
    CatalogEntry, CatalogPage, CatalogQuery, DetailRecord, MissingDetail, RunCounters, RunRecord,
    RunStatus,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record with this natural key already exists
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every database operation needed by the pipelines and the
/// query layer. Writes take `&mut self`; callers share a backend behind a mutex.
pub trait Storage {
    // ===== Catalog =====

    /// Upserts a batch of catalog entries in one transaction
    ///
    /// Entries are matched by slug. Existing rows have every field replaced,
    /// except `created_at`; new rows are inserted. Either the whole batch is
    /// written or nothing is.
    ///
    /// # Returns
    ///
    /// The number of entries written
    fn upsert_catalog(&mut self, entries: &[CatalogEntry]) -> StorageResult<usize>;

    /// Gets a catalog entry by slug
    fn get_catalog_entry(&self, slug: &str) -> StorageResult<Option<CatalogEntry>>;

    /// Runs a filtered, paginated catalog read
    fn query_catalog(&self, query: &CatalogQuery) -> StorageResult<CatalogPage>;

    /// Lists catalog titles with no detail record, in one set-difference query
    fn catalog_missing_details(&self) -> StorageResult<Vec<MissingDetail>>;

    /// Gets total catalog count
    fn count_catalog(&self) -> StorageResult<u64>;

    // ===== Detail =====

    /// Checks whether a detail record exists for a slug
    fn detail_exists(&self, slug: &str) -> StorageResult<bool>;

    /// Inserts a detail record
    ///
    /// Fails with `StorageError::DuplicateKey` if one already exists for the slug.
    fn insert_detail(&mut self, record: &DetailRecord) -> StorageResult<()>;

    /// Gets the detail record for a slug
    fn get_detail(&self, slug: &str) -> StorageResult<Option<DetailRecord>>;

    /// Gets total detail record count
    fn count_details(&self) -> StorageResult<u64>;

    // ===== Run Ledger =====

    /// Records the start of a crawl run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, pipeline: Pipeline, config_hash: &str) -> StorageResult<i64>;

    /// Records the outcome of a crawl run with a finish timestamp
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: RunCounters,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of a pipeline
    fn get_latest_run(&self, pipeline: Pipeline) -> StorageResult<Option<RunRecord>>;

    /// Marks runs left `running` by a previous process as interrupted
    ///
    /// # Returns
    ///
    /// The number of runs updated
    fn mark_interrupted_runs(&mut self) -> StorageResult<u64>;
}
