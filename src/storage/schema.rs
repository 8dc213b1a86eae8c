//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Movie-Catalog database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per upstream title, keyed by slug
CREATE TABLE IF NOT EXISTS catalog (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    upstream_id TEXT,
    name TEXT NOT NULL,
    origin_name TEXT NOT NULL DEFAULT '',
    kind TEXT,
    status TEXT,
    thumb_url TEXT,
    poster_url TEXT,
    year INTEGER,
    content TEXT,
    tmdb_type TEXT,
    tmdb_id TEXT,
    tmdb_season INTEGER,
    tmdb_vote_average REAL,
    tmdb_vote_count INTEGER,
    imdb_id TEXT,
    categories TEXT NOT NULL DEFAULT '[]',
    countries TEXT NOT NULL DEFAULT '[]',
    actors TEXT NOT NULL DEFAULT '[]',
    directors TEXT NOT NULL DEFAULT '[]',
    modified_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_catalog_year ON catalog(year);
CREATE INDEX IF NOT EXISTS idx_catalog_kind ON catalog(kind);
CREATE INDEX IF NOT EXISTS idx_catalog_created ON catalog(created_at DESC);

-- Category and country slugs, for filtering
CREATE TABLE IF NOT EXISTS catalog_categories (
    catalog_slug TEXT NOT NULL REFERENCES catalog(slug) ON DELETE CASCADE,
    slug TEXT NOT NULL,
    PRIMARY KEY (catalog_slug, slug)
);

CREATE INDEX IF NOT EXISTS idx_catalog_categories_slug ON catalog_categories(slug);

CREATE TABLE IF NOT EXISTS catalog_countries (
    catalog_slug TEXT NOT NULL REFERENCES catalog(slug) ON DELETE CASCADE,
    slug TEXT NOT NULL,
    PRIMARY KEY (catalog_slug, slug)
);

CREATE INDEX IF NOT EXISTS idx_catalog_countries_slug ON catalog_countries(slug);

-- Full-text index over names, rowid = catalog.id; name is weighted above origin_name
CREATE VIRTUAL TABLE IF NOT EXISTS catalog_search USING fts5(
    name,
    origin_name
);

-- One detail payload per slug, written once
CREATE TABLE IF NOT EXISTS detail (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    catalog_id INTEGER,
    movie TEXT NOT NULL,
    episodes TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Crawl run ledger
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    attempted INTEGER NOT NULL DEFAULT 0,
    succeeded INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_runs_pipeline ON crawl_runs(pipeline, id DESC);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
