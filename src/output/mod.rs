//! Output module for command-line reports
//!
//! Currently this is the `--stats` summary of catalog coverage and the most
//! recent crawl runs.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CatalogStatistics};
