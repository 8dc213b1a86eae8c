//! Read side of the catalog
//!
//! The query service turns raw request parameters into catalog reads and
//! memoises the answers for a short while.

mod cache;

pub use cache::ResponseCache;

use crate::storage::{
    self, normalize_slug, parse_year, CatalogEntry, CatalogQuery, Episode, SharedStorage, Storage,
    StorageError,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Page used when the request gives none or an unusable one
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when the request gives none or an unusable one
pub const DEFAULT_LIMIT: u64 = 24;

/// Largest page size a caller can ask for
pub const MAX_LIMIT: u64 = 100;

/// Errors raised while answering a catalog query
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Page number and size of a catalog read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Builds a pagination from raw query-string values
    ///
    /// Missing, non-numeric and zero values fall back to the defaults. The page
    /// is raised to at least 1 and the limit is clamped to `1..=MAX_LIMIT`.
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = parse_nonzero(page).unwrap_or(DEFAULT_PAGE as i64).max(1) as u64;
        let limit = parse_nonzero(limit)
            .unwrap_or(DEFAULT_LIMIT as i64)
            .clamp(1, MAX_LIMIT as i64) as u64;
        Self { page, limit }
    }

    /// Number of rows skipped before this page
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

fn parse_nonzero(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|value| *value != 0)
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Predicates for a filtered catalog read
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MovieFilter {
    pub search: Option<String>,
    pub year: Option<i32>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub kind: Option<String>,
}

impl MovieFilter {
    /// Builds a filter from raw query-string values
    ///
    /// Blank values are treated as absent. A year that does not parse as an
    /// integer is dropped rather than rejected.
    pub fn from_params(
        search: Option<String>,
        year: Option<String>,
        category: Option<String>,
        country: Option<String>,
        kind: Option<String>,
    ) -> Self {
        Self {
            search: non_empty(search),
            year: year.as_deref().and_then(parse_year),
            category: non_empty(category),
            country: non_empty(country),
            kind: non_empty(kind),
        }
    }

    fn into_query(self, pagination: Pagination) -> CatalogQuery {
        CatalogQuery {
            search: self.search,
            year: self.year,
            category: self.category,
            country: self.country,
            kind: self.kind,
            offset: pagination.offset(),
            limit: pagination.limit,
        }
    }
}

/// One page of catalog entries as returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoviePage {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub items: Vec<CatalogEntry>,
}

/// A title with its episodes
///
/// When only the catalog entry is known, `movie` is that entry and
/// `episodes` is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDetail {
    pub movie: serde_json::Value,
    pub episodes: Vec<Episode>,
}

/// Answers catalog reads, with a bounded TTL cache in front of storage
#[derive(Clone)]
pub struct QueryService {
    storage: SharedStorage,
    pages: ResponseCache<CatalogQuery, MoviePage>,
    details: ResponseCache<String, MovieDetail>,
}

impl QueryService {
    /// Creates a query service
    ///
    /// # Arguments
    ///
    /// * `storage` - Shared catalog storage
    /// * `cache_ttl` - How long answers are reused; zero disables the cache
    /// * `cache_capacity` - Most answers held per cache
    pub fn new(storage: SharedStorage, cache_ttl: Duration, cache_capacity: u64) -> Self {
        Self {
            storage,
            pages: ResponseCache::new(cache_ttl, cache_capacity),
            details: ResponseCache::new(cache_ttl, cache_capacity),
        }
    }

    /// Newest titles first
    pub fn list(&self, pagination: Pagination) -> Result<MoviePage, QueryError> {
        self.filter(MovieFilter::default(), pagination)
    }

    /// Titles matching every given predicate
    ///
    /// With a search term the results are ordered by relevance, otherwise
    /// newest first.
    pub fn filter(
        &self,
        filter: MovieFilter,
        pagination: Pagination,
    ) -> Result<MoviePage, QueryError> {
        let query = filter.into_query(pagination);
        if let Some(page) = self.pages.get(&query) {
            return Ok(page);
        }

        let result = storage::lock(&self.storage)?.query_catalog(&query)?;
        debug!(total = result.total, returned = result.items.len(), "Catalog query");

        let page = MoviePage {
            total: result.total,
            page: pagination.page,
            limit: pagination.limit,
            items: result.items,
        };
        self.pages.insert(query, page.clone());
        Ok(page)
    }

    /// Detail for one title, or `None` if the slug is unknown
    pub fn detail(&self, slug: &str) -> Result<Option<MovieDetail>, QueryError> {
        let slug = match normalize_slug(slug) {
            Some(slug) => slug,
            None => return Ok(None),
        };

        if let Some(detail) = self.details.get(&slug) {
            return Ok(Some(detail));
        }

        let found = {
            let store = storage::lock(&self.storage)?;
            match store.get_detail(&slug)? {
                Some(record) => Some(MovieDetail {
                    movie: record.movie,
                    episodes: record.episodes,
                }),
                None => match store.get_catalog_entry(&slug)? {
                    Some(entry) => Some(MovieDetail {
                        movie: serde_json::to_value(entry)?,
                        episodes: Vec::new(),
                    }),
                    None => None,
                },
            }
        };

        if let Some(detail) = &found {
            self.details.insert(slug, detail.clone());
        }
        Ok(found)
    }
}
