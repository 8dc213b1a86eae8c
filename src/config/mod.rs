//! Configuration module for Movie-Catalog
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file, and layering environment variable overrides on top of it.
//!
//! # Example
//!
//! ```no_run
//! use movie_catalog::config::load_effective_config;
//! use std::path::Path;
//!
//! let (config, hash) = load_effective_config(Some(Path::new("config.toml"))).unwrap();
//! println!("Listing pipeline runs on: {} ({})", config.schedule.listing_cron, hash);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlConfig, DatabaseConfig, RetryConfig, ScheduleConfig, ServerConfig,
    UpstreamConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_effective_config,
};
pub use validation::validate;
