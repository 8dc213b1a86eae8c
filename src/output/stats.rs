//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! catalog and crawl-run statistics from the storage layer.

use crate::state::Pipeline;
use crate::storage::{RunRecord, Storage, StorageResult};

/// Catalog statistics summary
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Number of catalog entries
    pub catalog_entries: u64,

    /// Number of stored detail records
    pub detail_records: u64,

    /// Catalog entries with no detail record yet
    pub missing_details: u64,

    /// Most recent run of each pipeline, in scheduling order
    pub latest_runs: Vec<(Pipeline, Option<RunRecord>)>,
}

impl CatalogStatistics {
    /// Share of catalog entries that have a detail record, in percent
    pub fn detail_coverage(&self) -> f64 {
        if self.catalog_entries == 0 {
            return 0.0;
        }
        let covered = self.catalog_entries.saturating_sub(self.missing_details);
        (covered as f64 / self.catalog_entries as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CatalogStatistics> {
    let catalog_entries = storage.count_catalog()?;
    let detail_records = storage.count_details()?;
    let missing_details = storage.catalog_missing_details()?.len() as u64;

    let mut latest_runs = Vec::with_capacity(Pipeline::ALL.len());
    for pipeline in Pipeline::ALL {
        latest_runs.push((pipeline, storage.get_latest_run(pipeline)?));
    }

    Ok(CatalogStatistics {
        catalog_entries,
        detail_records,
        missing_details,
        latest_runs,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Catalog entries: {}", stats.catalog_entries);
    println!("  Detail records: {}", stats.detail_records);
    println!(
        "  Missing details: {} ({:.1}% covered)",
        stats.missing_details,
        stats.detail_coverage()
    );
    println!();

    println!("Latest Runs:");
    for (pipeline, run) in &stats.latest_runs {
        match run {
            Some(run) => {
                println!(
                    "  {}: #{} {} (started {}, finished {})",
                    pipeline,
                    run.id,
                    run.status.to_db_string(),
                    run.started_at,
                    run.finished_at.as_deref().unwrap_or("-")
                );
                println!(
                    "    attempted {}, succeeded {}, failed {}, skipped {}",
                    run.counters.attempted,
                    run.counters.succeeded,
                    run.counters.failed,
                    run.counters.skipped
                );
                if let Some(message) = &run.error_message {
                    println!("    error: {}", message);
                }
            }
            None => println!("  {}: never run", pipeline),
        }
    }
}
