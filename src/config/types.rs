use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for Movie-Catalog
///
/// Every section and key is optional in the TOML file; missing values fall
/// back to the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub retry: RetryConfig,
    pub crawl: CrawlConfig,
    pub schedule: ScheduleConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

/// Upstream movie source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UpstreamConfig {
    /// Base URL of the upstream API
    pub base_url: String,

    /// Path of the paginated listing, relative to the base URL
    pub listing_path: String,

    /// Path prefix of detail pages; the slug is appended as a path segment
    pub detail_path: String,

    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ophim1.com".to_string(),
            listing_path: "/danh-sach/phim-moi-cap-nhat".to_string(),
            detail_path: "/phim".to_string(),
            timeout_ms: 5000,
            user_agent: format!("movie-catalog/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry behavior for upstream requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,

    /// Delay unit between attempts (milliseconds)
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Crawl pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Pause after each detail request sent upstream (milliseconds)
    pub detail_throttle_ms: u64,

    /// Upper bound on listing pages walked per run; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_max_pages: Option<u32>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            detail_throttle_ms: 1000,
            listing_max_pages: None,
        }
    }
}

impl CrawlConfig {
    pub fn detail_throttle(&self) -> Duration {
        Duration::from_millis(self.detail_throttle_ms)
    }
}

/// Pipeline schedules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScheduleConfig {
    /// Five-field cron expression for the listing pipeline
    pub listing_cron: String,

    /// Five-field cron expression for the detail pipeline
    pub detail_cron: String,

    /// Run both pipelines once as soon as the service starts
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            listing_cron: "0 0,12 * * *".to_string(),
            detail_cron: "0 2 * * *".to_string(),
            run_on_startup: false,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./movie-catalog.db".to_string(),
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Lifetime of cached query responses (seconds)
    pub cache_ttl_secs: u64,

    /// Most responses held by each query cache
    pub cache_max_entries: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cache_ttl_secs: 300,
            cache_max_entries: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
