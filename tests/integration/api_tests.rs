//! HTTP API tests, driving the router directly

use crate::common::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use movie_catalog::api::{create_router, AppState};
use movie_catalog::crawler::{upsert_all, RawListingItem};
use movie_catalog::query::QueryService;
use movie_catalog::storage::{self, SharedStorage, Storage};
use movie_catalog::{DetailRecord, Pipeline};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::MockServer;

/// Upstream address for tests that never reach the network
const UNUSED_UPSTREAM: &str = "http://127.0.0.1:9";

fn seed(storage: &SharedStorage, slugs: &[&str]) {
    let items: Vec<RawListingItem> = slugs
        .iter()
        .map(|slug| serde_json::from_value(listing_item(slug)).unwrap())
        .collect();
    upsert_all(&mut *storage::lock(storage).unwrap(), items).unwrap();
}

fn router(base_url: &str, storage: SharedStorage) -> Router {
    let crawl = crawl_service(base_url, storage.clone());
    let query = QueryService::new(storage, Duration::ZERO, 100);
    create_router(AppState::new(query, crawl))
}

async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(router(UNUSED_UPSTREAM, shared_storage()), "GET", "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_list_movies_paginates() {
    let storage = shared_storage();
    seed(&storage, &["a", "b", "c", "d", "e"]);

    let (status, body) = send(
        router(UNUSED_UPSTREAM, storage),
        "GET",
        "/api/movies?page=2&limit=2",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
    assert_eq!(body["total"], 5);
    assert_eq!(body["page"], 2);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    // Same batch, so upstream order is kept
    assert_eq!(body["items"][0]["slug"], "c");
}

#[tokio::test]
async fn test_list_movies_bad_params_use_defaults() {
    let storage = shared_storage();
    seed(&storage, &["a"]);

    let (status, body) = send(
        router(UNUSED_UPSTREAM, storage),
        "GET",
        "/api/movies?page=abc&limit=-",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 24);
}

#[tokio::test]
async fn test_filter_movies() {
    let storage = shared_storage();
    seed(&storage, &["a", "b"]);
    {
        let mut other = listing_item("c");
        other["year"] = json!(1999);
        other["country"] = json!([{"id": "9", "name": "Japan", "slug": "nhat-ban"}]);
        let item: RawListingItem = serde_json::from_value(other).unwrap();
        upsert_all(&mut *storage::lock(&storage).unwrap(), vec![item]).unwrap();
    }

    let (status, body) = send(
        router(UNUSED_UPSTREAM, storage.clone()),
        "GET",
        "/api/movies/filter?year=2021&country=han-quoc&type=single",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = send(
        router(UNUSED_UPSTREAM, storage),
        "GET",
        "/api/movies/filter?year=abc&country=nhat-ban",
    )
    .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["slug"], "c");
}

#[tokio::test]
async fn test_movie_detail_and_fallback() {
    let storage = shared_storage();
    seed(&storage, &["a", "b"]);
    storage::lock(&storage)
        .unwrap()
        .insert_detail(&DetailRecord {
            slug: "a".to_string(),
            catalog_id: None,
            movie: json!({"name": "Movie a", "slug": "a"}),
            episodes: Vec::new(),
            created_at: None,
        })
        .unwrap();

    let (status, body) = send(router(UNUSED_UPSTREAM, storage.clone()), "GET", "/api/movies/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
    assert_eq!(body["movie"]["name"], "Movie a");

    let (status, body) = send(router(UNUSED_UPSTREAM, storage), "GET", "/api/movies/b").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movie"]["slug"], "b");
    assert_eq!(body["movie"]["year"], 2021);
    assert_eq!(body["episodes"], json!([]));
}

#[tokio::test]
async fn test_movie_not_found() {
    let (status, body) = send(
        router(UNUSED_UPSTREAM, shared_storage()),
        "GET",
        "/api/movies/nothing-here",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": false, "message": "Movie not found"}));
}

#[tokio::test]
async fn test_trigger_listing_crawl() {
    let server = MockServer::start().await;
    mount_listing_page(
        &server,
        1,
        listing_body(vec![listing_item("x"), listing_item("y")], 1),
    )
    .await;

    let storage = shared_storage();
    let (status, body) = send(router(&server.uri(), storage.clone()), "POST", "/api/movies/crawl").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
    assert_eq!(body["report"]["pipeline"], "listing");
    assert_eq!(body["report"]["succeeded"], 2);
    assert_eq!(storage::lock(&storage).unwrap().count_catalog().unwrap(), 2);
}

#[tokio::test]
async fn test_trigger_while_running_is_ok() {
    let storage = shared_storage();
    let crawl = crawl_service(UNUSED_UPSTREAM, storage.clone());
    let app = create_router(AppState::new(
        QueryService::new(storage, Duration::ZERO, 100),
        crawl.clone(),
    ));

    let _permit = crawl.guard(Pipeline::Detail).try_enter().unwrap();
    let (status, body) = send(app, "POST", "/api/movies/crawl/details").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
    assert!(body.get("report").is_none());
}

#[tokio::test]
async fn test_failed_crawl_hides_details() {
    // Nothing listens on the upstream port, so every attempt fails
    let (status, body) = send(
        router(UNUSED_UPSTREAM, shared_storage()),
        "POST",
        "/api/movies/crawl",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"status": false, "message": "Internal server error"})
    );
}
