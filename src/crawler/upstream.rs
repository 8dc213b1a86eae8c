//! Parsing boundary for upstream responses
//!
//! Every upstream body passes through `parse_listing_page` or
//! `parse_detail_page` before anything else looks at it. Shape problems are
//! reported as `MalformedResponse` here, so drift in the upstream format fails
//! visibly instead of reaching the database.

use crate::crawler::FetchError;
use crate::storage::{
    deserialize_year, normalize_slug, CatalogEntry, Episode, Rating, ServerData, SlugField,
    Taxonomy,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// An upstream body that does not have the expected shape
#[derive(Debug, Error)]
pub enum MalformedResponse {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("`{0}` is missing or not an array")]
    MissingArray(&'static str),

    #[error("`{0}` is missing or not an object")]
    MissingObject(&'static str),

    #[error("`pagination.totalPages` is missing or not a number")]
    MissingTotalPages,
}

/// Failure to get a usable response from the upstream source
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed response: {0}")]
    Malformed(#[from] MalformedResponse),
}

impl UpstreamError {
    /// Whether retrying the request might help
    ///
    /// Malformed bodies are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_transient(),
            Self::Malformed(_) => false,
        }
    }
}

/// Treats `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTmdb {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<Value>,
    pub season: Option<Value>,
    pub vote_average: Option<Value>,
    pub vote_count: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawImdb {
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTimestamp {
    pub time: Option<String>,
}

/// One item of an upstream listing page, as received
///
/// Every field is optional; `into_entry` decides what is usable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawListingItem {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub slug: Option<SlugField>,
    pub origin_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub thumb_url: Option<String>,
    pub poster_url: Option<String>,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: Option<i32>,
    pub content: Option<String>,
    pub tmdb: Option<RawTmdb>,
    pub imdb: Option<RawImdb>,
    pub modified: Option<RawTimestamp>,
    #[serde(deserialize_with = "null_as_default")]
    pub category: Vec<Taxonomy>,
    #[serde(deserialize_with = "null_as_default")]
    pub country: Vec<Taxonomy>,
    #[serde(deserialize_with = "null_as_default")]
    pub actor: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub director: Vec<String>,
}

impl RawListingItem {
    /// Normalizes the item into a catalog entry
    ///
    /// Returns None when the item has no usable slug or no name.
    pub fn into_entry(self) -> Option<CatalogEntry> {
        let slug = self.slug.as_ref().and_then(SlugField::resolve)?;
        let name = self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
        let tmdb = self.tmdb.unwrap_or_default();

        Some(CatalogEntry {
            id: None,
            slug,
            upstream_id: self.id,
            name,
            origin_name: self.origin_name.unwrap_or_default(),
            kind: self.kind,
            status: self.status,
            thumb_url: self.thumb_url,
            poster_url: self.poster_url,
            year: self.year,
            content: self.content,
            rating: Rating {
                tmdb_type: tmdb.kind,
                tmdb_id: tmdb.id.as_ref().and_then(value_as_string),
                tmdb_season: tmdb.season.as_ref().and_then(value_as_i64),
                vote_average: tmdb.vote_average.as_ref().and_then(value_as_f64),
                vote_count: tmdb.vote_count.as_ref().and_then(value_as_i64),
                imdb_id: self
                    .imdb
                    .and_then(|imdb| imdb.id)
                    .as_ref()
                    .and_then(value_as_string),
            },
            categories: self.category,
            countries: self.country,
            actors: self.actor,
            directors: self.director,
            modified_at: self.modified.and_then(|m| m.time),
            created_at: None,
            updated_at: None,
        })
    }
}

/// One validated listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub items: Vec<RawListingItem>,
    pub total_pages: u32,
}

/// Parses one listing page body
///
/// Requires an `items` array and a numeric `pagination.totalPages`. Individual
/// items that cannot be read at all are logged and dropped.
pub fn parse_listing_page(body: &str) -> Result<ListingPage, MalformedResponse> {
    let value: Value = serde_json::from_str(body)?;

    let items = value
        .get("items")
        .and_then(Value::as_array)
        .ok_or(MalformedResponse::MissingArray("items"))?;

    let total_pages = value
        .get("pagination")
        .and_then(|p| p.get("totalPages"))
        .and_then(value_as_i64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(MalformedResponse::MissingTotalPages)?;

    let items = items
        .iter()
        .filter_map(|item| match RawListingItem::deserialize(item) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "Dropping unreadable listing item");
                None
            }
        })
        .collect();

    Ok(ListingPage { items, total_pages })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawServerData {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub slug: Option<String>,
    pub filename: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub link_embed: String,
    #[serde(deserialize_with = "null_as_default")]
    pub link_m3u8: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEpisode {
    #[serde(deserialize_with = "null_as_default")]
    pub server_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub server_data: Vec<RawServerData>,
}

/// One validated detail page
#[derive(Debug, Clone)]
pub struct DetailPage {
    pub movie: Value,
    pub episodes: Vec<RawEpisode>,
}

/// Parses one detail page body
///
/// Requires a `movie` object and an `episodes` array.
pub fn parse_detail_page(body: &str) -> Result<DetailPage, MalformedResponse> {
    let mut value: Value = serde_json::from_str(body)?;

    let movie = match value.get_mut("movie").map(Value::take) {
        Some(movie @ Value::Object(_)) => movie,
        _ => return Err(MalformedResponse::MissingObject("movie")),
    };

    let episodes = match value.get_mut("episodes").map(Value::take) {
        Some(episodes @ Value::Array(_)) => episodes,
        _ => return Err(MalformedResponse::MissingArray("episodes")),
    };
    let episodes: Vec<RawEpisode> = serde_json::from_value(episodes)?;

    Ok(DetailPage { movie, episodes })
}

/// Derives a server-data slug from its display name
///
/// Lowercases and replaces each run of whitespace with one hyphen. Applying it
/// to its own output changes nothing.
pub fn derive_episode_slug(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Converts raw episodes, filling in missing server-data slugs
pub fn normalize_episodes(raw: Vec<RawEpisode>) -> Vec<Episode> {
    raw.into_iter()
        .map(|episode| Episode {
            server_name: episode.server_name,
            server_data: episode
                .server_data
                .into_iter()
                .map(|data| {
                    let slug = data
                        .slug
                        .as_deref()
                        .and_then(normalize_slug)
                        .unwrap_or_else(|| derive_episode_slug(&data.name));
                    ServerData {
                        name: data.name,
                        slug,
                        filename: data.filename.filter(|f| !f.is_empty()),
                        embed_link: data.link_embed,
                        m3u8_link: data.link_m3u8,
                    }
                })
                .collect(),
        })
        .collect()
}
