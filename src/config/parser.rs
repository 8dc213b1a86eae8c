use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use movie_catalog::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Upstream: {}", config.upstream.base_url);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Builds the effective configuration: file (if any), then environment
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Validated configuration and its hash
/// * `Err(ConfigError)` - Failed to load, parse, override, or validate
pub fn load_effective_config(path: Option<&Path>) -> Result<(Config, String), ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;

    let hash = compute_config_hash(&config)?;
    Ok((config, hash))
}

/// Applies environment variable overrides to a configuration
///
/// `lookup` resolves a variable name to its value. Variables that are unset
/// leave the configuration untouched; variables that are set but unparseable
/// are rejected.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("UPSTREAM_BASE_URL") {
        config.upstream.base_url = value;
    }
    if let Some(value) = lookup("DATABASE_PATH") {
        config.database.path = value;
    }
    if let Some(value) = lookup("HOST") {
        config.server.host = value;
    }
    if let Some(value) = lookup("PORT") {
        config.server.port = parse_env("PORT", &value)?;
    }
    if let Some(value) = lookup("LISTING_CRON") {
        config.schedule.listing_cron = value;
    }
    if let Some(value) = lookup("DETAIL_CRON") {
        config.schedule.detail_cron = value;
    }
    if let Some(value) = lookup("RUN_ON_STARTUP") {
        config.schedule.run_on_startup = parse_bool("RUN_ON_STARTUP", &value)?;
    }
    if let Some(value) = lookup("HTTP_TIMEOUT_MS") {
        config.upstream.timeout_ms = parse_env("HTTP_TIMEOUT_MS", &value)?;
    }
    if let Some(value) = lookup("RETRY_MAX_ATTEMPTS") {
        config.retry.max_attempts = parse_env("RETRY_MAX_ATTEMPTS", &value)?;
    }
    if let Some(value) = lookup("RETRY_BASE_DELAY_MS") {
        config.retry.base_delay_ms = parse_env("RETRY_BASE_DELAY_MS", &value)?;
    }
    if let Some(value) = lookup("DETAIL_THROTTLE_MS") {
        config.crawl.detail_throttle_ms = parse_env("DETAIL_THROTTLE_MS", &value)?;
    }
    if let Some(value) = lookup("LISTING_MAX_PAGES") {
        config.crawl.listing_max_pages = Some(parse_env("LISTING_MAX_PAGES", &value)?);
    }
    if let Some(value) = lookup("CACHE_TTL_SECS") {
        config.server.cache_ttl_secs = parse_env("CACHE_TTL_SECS", &value)?;
    }
    if let Some(value) = lookup("CACHE_MAX_ENTRIES") {
        config.server.cache_max_entries = parse_env("CACHE_MAX_ENTRIES", &value)?;
    }
    Ok(())
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| {
        ConfigError::Validation(format!("{} has an invalid value: '{}'", name, raw))
    })
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{} must be a boolean, got '{}'",
            name, raw
        ))),
    }
}

/// Computes a SHA-256 hash of the effective configuration
///
/// This is recorded on each crawl run so that runs made under different
/// settings can be told apart.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the serialized configuration
/// * `Err(ConfigError)` - Failed to serialize the configuration
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let content = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}
