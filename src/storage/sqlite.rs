//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::Pipeline;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CatalogEntry, CatalogPage, CatalogQuery, DetailRecord, MissingDetail, Rating, RunCounters,
    RunRecord, RunStatus, SlugField,
};
use chrono::{SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;

const CATALOG_COLUMNS: &str = "c.id, c.slug, c.upstream_id, c.name, c.origin_name, c.kind, \
     c.status, c.thumb_url, c.poster_url, c.year, c.content, c.tmdb_type, c.tmdb_id, \
     c.tmdb_season, c.tmdb_vote_average, c.tmdb_vote_count, c.imdb_id, c.categories, \
     c.countries, c.actors, c.directors, c.modified_at, c.created_at, c.updated_at";

const RUN_COLUMNS: &str = "id, pipeline, started_at, finished_at, config_hash, status, \
     attempted, succeeded, failed, skipped, error_message";

const UPSERT_CATALOG_SQL: &str = "
    INSERT INTO catalog (
        slug, upstream_id, name, origin_name, kind, status, thumb_url, poster_url, year,
        content, tmdb_type, tmdb_id, tmdb_season, tmdb_vote_average, tmdb_vote_count, imdb_id,
        categories, countries, actors, directors, modified_at, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
            ?17, ?18, ?19, ?20, ?21, ?22, ?22)
    ON CONFLICT(slug) DO UPDATE SET
        upstream_id = excluded.upstream_id,
        name = excluded.name,
        origin_name = excluded.origin_name,
        kind = excluded.kind,
        status = excluded.status,
        thumb_url = excluded.thumb_url,
        poster_url = excluded.poster_url,
        year = excluded.year,
        content = excluded.content,
        tmdb_type = excluded.tmdb_type,
        tmdb_id = excluded.tmdb_id,
        tmdb_season = excluded.tmdb_season,
        tmdb_vote_average = excluded.tmdb_vote_average,
        tmdb_vote_count = excluded.tmdb_vote_count,
        imdb_id = excluded.imdb_id,
        categories = excluded.categories,
        countries = excluded.countries,
        actors = excluded.actors,
        directors = excluded.directors,
        modified_at = excluded.modified_at,
        updated_at = excluded.updated_at
    RETURNING id
";

/// Current time as a fixed-width RFC 3339 string, so stored timestamps sort as text
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Reads a JSON-encoded column
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_catalog_entry(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        slug: row.get(1)?,
        upstream_id: row.get(2)?,
        name: row.get(3)?,
        origin_name: row.get(4)?,
        kind: row.get(5)?,
        status: row.get(6)?,
        thumb_url: row.get(7)?,
        poster_url: row.get(8)?,
        year: row.get(9)?,
        content: row.get(10)?,
        rating: Rating {
            tmdb_type: row.get(11)?,
            tmdb_id: row.get(12)?,
            tmdb_season: row.get(13)?,
            vote_average: row.get(14)?,
            vote_count: row.get(15)?,
            imdb_id: row.get(16)?,
        },
        categories: json_column(row, 17)?,
        countries: json_column(row, 18)?,
        actors: json_column(row, 19)?,
        directors: json_column(row, 20)?,
        modified_at: row.get(21)?,
        created_at: row.get(22)?,
        updated_at: row.get(23)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let pipeline: String = row.get(1)?;
    let pipeline = Pipeline::from_db_string(&pipeline).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown pipeline: {}", pipeline).into(),
        )
    })?;

    Ok(RunRecord {
        id: row.get(0)?,
        pipeline,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        counters: RunCounters {
            attempted: row.get(6)?,
            succeeded: row.get(7)?,
            failed: row.get(8)?,
            skipped: row.get(9)?,
        },
        error_message: row.get(10)?,
    })
}

/// Turns free text into an FTS5 query of quoted terms, all required
///
/// Returns None when the text has no searchable terms.
fn fts_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{}\"", term.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Direct access to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Storage for SqliteStorage {
    // ===== Catalog =====

    fn upsert_catalog(&mut self, entries: &[CatalogEntry]) -> StorageResult<usize> {
        let now = now_timestamp();
        let tx = self.conn.transaction()?;

        {
            let mut upsert = tx.prepare_cached(UPSERT_CATALOG_SQL)?;
            let mut clear_categories =
                tx.prepare_cached("DELETE FROM catalog_categories WHERE catalog_slug = ?1")?;
            let mut add_category = tx.prepare_cached(
                "INSERT OR IGNORE INTO catalog_categories (catalog_slug, slug) VALUES (?1, ?2)",
            )?;
            let mut clear_countries =
                tx.prepare_cached("DELETE FROM catalog_countries WHERE catalog_slug = ?1")?;
            let mut add_country = tx.prepare_cached(
                "INSERT OR IGNORE INTO catalog_countries (catalog_slug, slug) VALUES (?1, ?2)",
            )?;
            let mut clear_search =
                tx.prepare_cached("DELETE FROM catalog_search WHERE rowid = ?1")?;
            let mut add_search = tx.prepare_cached(
                "INSERT INTO catalog_search (rowid, name, origin_name) VALUES (?1, ?2, ?3)",
            )?;

            for entry in entries {
                let id: i64 = upsert.query_row(
                    params![
                        entry.slug,
                        entry.upstream_id,
                        entry.name,
                        entry.origin_name,
                        entry.kind,
                        entry.status,
                        entry.thumb_url,
                        entry.poster_url,
                        entry.year,
                        entry.content,
                        entry.rating.tmdb_type,
                        entry.rating.tmdb_id,
                        entry.rating.tmdb_season,
                        entry.rating.vote_average,
                        entry.rating.vote_count,
                        entry.rating.imdb_id,
                        serde_json::to_string(&entry.categories)?,
                        serde_json::to_string(&entry.countries)?,
                        serde_json::to_string(&entry.actors)?,
                        serde_json::to_string(&entry.directors)?,
                        entry.modified_at,
                        now,
                    ],
                    |row| row.get(0),
                )?;

                clear_categories.execute(params![entry.slug])?;
                for category in entry.categories.iter().filter(|c| !c.slug.is_empty()) {
                    add_category.execute(params![entry.slug, category.slug])?;
                }

                clear_countries.execute(params![entry.slug])?;
                for country in entry.countries.iter().filter(|c| !c.slug.is_empty()) {
                    add_country.execute(params![entry.slug, country.slug])?;
                }

                clear_search.execute(params![id])?;
                add_search.execute(params![id, entry.name, entry.origin_name])?;
            }
        }

        tx.commit()?;
        Ok(entries.len())
    }

    fn get_catalog_entry(&self, slug: &str) -> StorageResult<Option<CatalogEntry>> {
        let sql = format!("SELECT {} FROM catalog c WHERE c.slug = ?1", CATALOG_COLUMNS);
        let entry = self
            .conn
            .query_row(&sql, params![slug], row_to_catalog_entry)
            .optional()?;
        Ok(entry)
    }

    fn query_catalog(&self, query: &CatalogQuery) -> StorageResult<CatalogPage> {
        let mut joins = String::new();
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        let mut order = "c.created_at DESC, c.id ASC";

        if let Some(terms) = query.search.as_deref().and_then(fts_query) {
            joins.push_str(
                " JOIN (SELECT rowid AS catalog_id, bm25(catalog_search, 2.0, 1.0) AS rank \
                 FROM catalog_search WHERE catalog_search MATCH ?) s ON s.catalog_id = c.id",
            );
            args.push(Value::Text(terms));
            order = "s.rank ASC, c.id ASC";
        }

        if let Some(year) = query.year {
            clauses.push("c.year = ?");
            args.push(Value::Integer(i64::from(year)));
        }

        if let Some(kind) = &query.kind {
            clauses.push("c.kind = ?");
            args.push(Value::Text(kind.clone()));
        }

        if let Some(category) = &query.category {
            clauses.push(
                "EXISTS (SELECT 1 FROM catalog_categories cc \
                 WHERE cc.catalog_slug = c.slug AND cc.slug = ?)",
            );
            args.push(Value::Text(category.clone()));
        }

        if let Some(country) = &query.country {
            clauses.push(
                "EXISTS (SELECT 1 FROM catalog_countries cn \
                 WHERE cn.catalog_slug = c.slug AND cn.slug = ?)",
            );
            args.push(Value::Text(country.clone()));
        }

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM catalog c{}{}", joins, filter);
        let total: i64 = self
            .conn
            .query_row(&count_sql, params_from_iter(args.iter()), |row| row.get(0))?;

        let select_sql = format!(
            "SELECT {} FROM catalog c{}{} ORDER BY {} LIMIT ? OFFSET ?",
            CATALOG_COLUMNS, joins, filter, order
        );
        args.push(Value::Integer(i64::try_from(query.limit).unwrap_or(i64::MAX)));
        args.push(Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));

        let mut stmt = self.conn.prepare(&select_sql)?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), row_to_catalog_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CatalogPage {
            items,
            total: total as u64,
        })
    }

    fn catalog_missing_details(&self) -> StorageResult<Vec<MissingDetail>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.slug FROM catalog c
             WHERE c.slug NOT IN (SELECT d.slug FROM detail d)
             ORDER BY c.id ASC",
        )?;

        let candidates = stmt
            .query_map([], |row| {
                let raw: String = row.get(1)?;
                Ok(MissingDetail {
                    catalog_id: row.get(0)?,
                    slug: SlugField::from_stored(&raw),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        // Legacy list-form rows store a different text than the detail slug
        let mut missing = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let stored = match (&candidate.slug, candidate.slug.resolve()) {
                (SlugField::List(_), Some(slug)) => self.detail_exists(&slug)?,
                _ => false,
            };
            if !stored {
                missing.push(candidate);
            }
        }

        Ok(missing)
    }

    fn count_catalog(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM catalog", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Detail =====

    fn detail_exists(&self, slug: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM detail WHERE slug = ?1)",
            params![slug],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_detail(&mut self, record: &DetailRecord) -> StorageResult<()> {
        let result = self.conn.execute(
            "INSERT INTO detail (slug, catalog_id, movie, episodes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.slug,
                record.catalog_id,
                serde_json::to_string(&record.movie)?,
                serde_json::to_string(&record.episodes)?,
                now_timestamp(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateKey(record.slug.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_detail(&self, slug: &str) -> StorageResult<Option<DetailRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT slug, catalog_id, movie, episodes, created_at FROM detail WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(DetailRecord {
                        slug: row.get(0)?,
                        catalog_id: row.get(1)?,
                        movie: json_column(row, 2)?,
                        episodes: json_column(row, 3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn count_details(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM detail", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run Ledger =====

    fn create_run(&mut self, pipeline: Pipeline, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO crawl_runs (pipeline, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                pipeline.to_db_string(),
                now_timestamp(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: RunCounters,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE crawl_runs
             SET status = ?1, finished_at = ?2, attempted = ?3, succeeded = ?4,
                 failed = ?5, skipped = ?6, error_message = ?7
             WHERE id = ?8",
            params![
                status.to_db_string(),
                now_timestamp(),
                counters.attempted,
                counters.succeeded,
                counters.failed,
                counters.skipped,
                error_message,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM crawl_runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], row_to_run)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, pipeline: Pipeline) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_runs WHERE pipeline = ?1 ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self
            .conn
            .query_row(&sql, params![pipeline.to_db_string()], row_to_run)
            .optional()?;
        Ok(run)
    }

    fn mark_interrupted_runs(&mut self) -> StorageResult<u64> {
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, finished_at = ?2 WHERE status = ?3",
            params![
                RunStatus::Interrupted.to_db_string(),
                now_timestamp(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(updated as u64)
    }
}
