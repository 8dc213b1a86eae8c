//! Storage module for persisting the catalog
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Catalog upserts keyed by slug
//! - Detail records, written once per slug
//! - Filtered, paginated catalog reads for the API
//! - The crawl run ledger

mod normalize;
mod schema;
mod sqlite;
mod traits;

pub use normalize::{coerce_year, deserialize_year, normalize_slug, parse_year, SlugField};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::Pipeline;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the pipelines and the API
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens a storage database and wraps it for sharing
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_shared(path: &Path) -> StorageResult<SharedStorage> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Locks shared storage
///
/// The guard must be dropped before the caller reaches an await point.
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// A `{id, name, slug}` triple used for categories and countries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// External rating identifiers and score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub tmdb_type: Option<String>,
    pub tmdb_id: Option<String>,
    pub tmdb_season: Option<i64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub imdb_id: Option<String>,
}

/// One catalog row per upstream title
///
/// `slug` is the natural key. The upstream `_id` is kept for reference only; it
/// is regenerated upstream and never used to match rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    #[serde(skip)]
    pub id: Option<i64>,
    pub slug: String,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub upstream_id: Option<String>,
    pub name: String,
    pub origin_name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub thumb_url: Option<String>,
    pub poster_url: Option<String>,
    pub year: Option<i32>,
    pub content: Option<String>,
    pub rating: Rating,
    #[serde(rename = "category")]
    pub categories: Vec<Taxonomy>,
    #[serde(rename = "country")]
    pub countries: Vec<Taxonomy>,
    #[serde(rename = "actor")]
    pub actors: Vec<String>,
    #[serde(rename = "director")]
    pub directors: Vec<String>,
    /// Last-modified time as reported upstream
    pub modified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// One playable source inside an episode server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerData {
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "link_embed")]
    pub embed_link: String,
    #[serde(rename = "link_m3u8")]
    pub m3u8_link: String,
}

/// A named server and the episodes it hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub server_name: String,
    pub server_data: Vec<ServerData>,
}

/// Full detail payload for one title, written once per slug
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRecord {
    pub slug: String,
    #[serde(skip)]
    pub catalog_id: Option<i64>,
    /// Upstream movie object, stored as received
    pub movie: serde_json::Value,
    pub episodes: Vec<Episode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A catalog title that has no detail record yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDetail {
    pub catalog_id: i64,
    pub slug: SlugField,
}

/// Filter and window for a catalog read
///
/// All predicates are ANDed. `search` is free text matched against the
/// full-text index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub year: Option<i32>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub kind: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

/// One window of catalog entries plus the total match count
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogPage {
    pub items: Vec<CatalogEntry>,
    pub total: u64,
}

/// Counters recorded for a finished crawl run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub pipeline: Pipeline,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub counters: RunCounters,
    pub error_message: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
