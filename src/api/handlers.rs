//! Route handlers and response bodies

use super::AppState;
use crate::crawler::{RunReport, TriggerOutcome};
use crate::query::{MovieDetail, MovieFilter, MoviePage, Pagination, QueryError, QueryService};
use crate::state::Pipeline;
use crate::CrawlError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

// ============================================================================
// Response Types
// ============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// A page of catalog entries
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub status: bool,
    #[serde(flatten)]
    pub page: MoviePage,
}

/// A single title and its episodes
#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub status: bool,
    #[serde(flatten)]
    pub detail: MovieDetail,
}

/// Answer to a manual crawl trigger
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
}

/// Failure body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
        }
    }
}

/// Raw query-string parameters
///
/// Everything is taken as text so a malformed value falls back to its default
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct MovieParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub year: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl MovieParams {
    fn pagination(&self) -> Pagination {
        Pagination::from_params(self.page.as_deref(), self.limit.as_deref())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Internal failures behind an API call
///
/// The details are logged; callers only ever see a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Query task failed: {0}")]
    Task(#[from] JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Internal server error")),
        )
            .into_response()
    }
}

/// Runs a blocking catalog read off the async worker threads
async fn run_query<T, F>(query: QueryService, read: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&QueryService) -> Result<T, QueryError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || read(&query)).await?;
    Ok(result?)
}

// ============================================================================
// Handlers
// ============================================================================

pub(super) async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

pub(super) async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<MovieParams>,
) -> Result<Json<PageResponse>, ApiError> {
    let pagination = params.pagination();
    let page = run_query(state.query, move |query| query.list(pagination)).await?;

    Ok(Json(PageResponse { status: true, page }))
}

pub(super) async fn filter_movies(
    State(state): State<AppState>,
    Query(params): Query<MovieParams>,
) -> Result<Json<PageResponse>, ApiError> {
    let pagination = params.pagination();
    let filter = MovieFilter::from_params(
        params.search,
        params.year,
        params.category,
        params.country,
        params.kind,
    );
    let page = run_query(state.query, move |query| query.filter(filter, pagination)).await?;

    Ok(Json(PageResponse { status: true, page }))
}

pub(super) async fn get_movie_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let detail = run_query(state.query, move |query| query.detail(&slug)).await?;

    Ok(match detail {
        Some(detail) => Json(DetailResponse {
            status: true,
            detail,
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Movie not found")),
        )
            .into_response(),
    })
}

pub(super) async fn trigger_listing_crawl(
    State(state): State<AppState>,
) -> Result<Json<TriggerResponse>, ApiError> {
    trigger(&state, Pipeline::Listing).await
}

pub(super) async fn trigger_detail_crawl(
    State(state): State<AppState>,
) -> Result<Json<TriggerResponse>, ApiError> {
    trigger(&state, Pipeline::Detail).await
}

async fn trigger(state: &AppState, pipeline: Pipeline) -> Result<Json<TriggerResponse>, ApiError> {
    let response = match state.crawl.trigger_manually(pipeline).await? {
        TriggerOutcome::AlreadyRunning => TriggerResponse {
            status: true,
            message: format!("The {} crawl is already running", pipeline),
            report: None,
        },
        TriggerOutcome::Completed(report) => TriggerResponse {
            status: true,
            message: format!("The {} crawl completed", pipeline),
            report: Some(report),
        },
    };
    Ok(Json(response))
}
