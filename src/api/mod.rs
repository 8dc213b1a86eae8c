//! HTTP API over the catalog
//!
//! Handlers are thin: reads go through the query service, crawl triggers go
//! through the crawl service. Errors are logged and answered with a generic
//! body.

mod handlers;

pub use handlers::{
    ApiError, DetailResponse, ErrorResponse, HealthResponse, MovieParams, PageResponse,
    TriggerResponse,
};

use crate::crawler::CrawlService;
use crate::query::QueryService;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Catalog reads
    pub query: QueryService,

    /// Manual pipeline triggers
    pub crawl: CrawlService,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(query: QueryService, crawl: CrawlService) -> Self {
        Self {
            query,
            crawl,
            start_time: Instant::now(),
        }
    }
}

/// Creates the API router with CORS and request tracing
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/movies", get(handlers::list_movies))
        .route("/api/movies/filter", get(handlers::filter_movies))
        .route("/api/movies/crawl", post(handlers::trigger_listing_crawl))
        .route(
            "/api/movies/crawl/details",
            post(handlers::trigger_detail_crawl),
        )
        .route("/api/movies/{slug}", get(handlers::get_movie_detail))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serves the router until `shutdown` resolves
pub async fn serve<F>(router: Router, bind_address: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!(address = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
