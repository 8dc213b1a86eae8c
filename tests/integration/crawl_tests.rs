//! End-to-end tests of the listing and detail pipelines

use crate::common::*;
use movie_catalog::config::Config;
use movie_catalog::crawler::{
    upsert_all, HttpFetcher, ListingPaginator, RawListingItem, RetryPolicy, RunReport,
    TriggerOutcome,
};
use movie_catalog::schedule::Scheduler;
use movie_catalog::storage::{self, RunStatus, SqliteStorage, Storage};
use movie_catalog::{CrawlError, CrawlService, DetailRecord, Pipeline};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completed(outcome: TriggerOutcome) -> RunReport {
    match outcome {
        TriggerOutcome::Completed(report) => report,
        TriggerOutcome::AlreadyRunning => panic!("Expected the run to complete"),
    }
}

#[tokio::test]
async fn test_listing_walks_every_page() {
    let server = MockServer::start().await;

    let page_one = (0..20).map(|i| listing_item(&format!("movie-{}", i))).collect();
    let page_two = (20..25).map(|i| listing_item(&format!("movie-{}", i))).collect();
    mount_listing_page(&server, 1, listing_body(page_one, 2)).await;
    mount_listing_page(&server, 2, listing_body(page_two, 2)).await;

    let storage = shared_storage();
    let crawl = crawl_service(&server.uri(), storage.clone());
    let report = completed(crawl.trigger_manually(Pipeline::Listing).await.unwrap());

    assert_eq!(report.pipeline, Pipeline::Listing);
    assert_eq!(report.counters.attempted, 25);
    assert_eq!(report.counters.succeeded, 25);

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_catalog().unwrap(), 25);

    let run = store.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_listing_page_cap() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_body(vec![listing_item("only")], 40)).await;

    let fetcher = HttpFetcher::new(&test_config(&server.uri()).upstream).unwrap();
    let retry = RetryPolicy::linear(&test_config(&server.uri()).retry);
    let items = ListingPaginator::new(&fetcher, retry, Some(1))
        .fetch_all_listings()
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_upsert_twice_is_idempotent() {
    let server = MockServer::start().await;
    let mut renamed = listing_item("b");
    renamed["name"] = json!("Renamed");
    let items = vec![listing_item("a"), listing_item("b")];

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(items, 1)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(listing_body(vec![listing_item("a"), renamed], 1)),
        )
        .mount(&server)
        .await;

    let storage = shared_storage();
    let crawl = crawl_service(&server.uri(), storage.clone());
    crawl.trigger_manually(Pipeline::Listing).await.unwrap();
    crawl.trigger_manually(Pipeline::Listing).await.unwrap();

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_catalog().unwrap(), 2);
    let b = store.get_catalog_entry("b").unwrap().unwrap();
    assert_eq!(b.name, "Renamed");
}

#[tokio::test]
async fn test_year_coercion_through_listing() {
    let server = MockServer::start().await;
    let mut text_year = listing_item("text-year");
    text_year["year"] = json!("2021");
    let mut bad_year = listing_item("bad-year");
    bad_year["year"] = json!("abc");
    mount_listing_page(&server, 1, listing_body(vec![text_year, bad_year], 1)).await;

    let storage = shared_storage();
    let crawl = crawl_service(&server.uri(), storage.clone());
    crawl.trigger_manually(Pipeline::Listing).await.unwrap();

    let store = storage::lock(&storage).unwrap();
    assert_eq!(
        store.get_catalog_entry("text-year").unwrap().unwrap().year,
        Some(2021)
    );
    assert_eq!(store.get_catalog_entry("bad-year").unwrap().unwrap().year, None);
}

#[tokio::test]
async fn test_list_form_slug_in_listing() {
    let server = MockServer::start().await;
    let mut listed = listing_item("ignored");
    listed["slug"] = json!(["Foo-Bar "]);
    mount_listing_page(&server, 1, listing_body(vec![listed], 1)).await;
    mount_detail(
        &server,
        "foo-bar",
        ResponseTemplate::new(200).set_body_json(detail_body("foo-bar")),
    )
    .await;

    let storage = shared_storage();
    let crawl = crawl_service(&server.uri(), storage.clone());
    crawl.trigger_manually(Pipeline::Listing).await.unwrap();
    let report = completed(crawl.trigger_manually(Pipeline::Detail).await.unwrap());

    assert_eq!(report.counters.succeeded, 1);
    let store = storage::lock(&storage).unwrap();
    assert!(store.get_catalog_entry("foo-bar").unwrap().is_some());
    assert!(store.detail_exists("foo-bar").unwrap());
}

#[tokio::test]
async fn test_listing_retry_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let storage = shared_storage();
    let crawl = crawl_service(&server.uri(), storage.clone());
    let result = crawl.trigger_manually(Pipeline::Listing).await;

    assert!(matches!(result, Err(CrawlError::ListingPage { page: 1, .. })));
    assert!(!crawl.is_running(Pipeline::Listing));

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_catalog().unwrap(), 0);
    let run = store.get_latest_run(Pipeline::Listing).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.is_some());
}

#[tokio::test]
async fn test_reconcile_counts_malformed_as_failed() {
    let server = MockServer::start().await;
    mount_detail(
        &server,
        "b",
        ResponseTemplate::new(200).set_body_json(json!({"status": false, "msg": "gone"})),
    )
    .await;
    mount_detail(
        &server,
        "c",
        ResponseTemplate::new(200).set_body_json(detail_body("c")),
    )
    .await;

    let storage = shared_storage();
    {
        let mut store = storage::lock(&storage).unwrap();
        let entries: Vec<_> = ["a", "b", "c"]
            .iter()
            .filter_map(|slug| serde_json::from_value::<RawListingItem>(listing_item(slug)).ok())
            .collect();
        upsert_all(&mut *store, entries).unwrap();
        store
            .insert_detail(&DetailRecord {
                slug: "a".to_string(),
                catalog_id: None,
                movie: json!({"slug": "a"}),
                episodes: Vec::new(),
                created_at: None,
            })
            .unwrap();
    }

    let crawl = crawl_service(&server.uri(), storage.clone());
    let report = completed(crawl.trigger_manually(Pipeline::Detail).await.unwrap());

    assert_eq!(report.counters.attempted, 2);
    assert_eq!(report.counters.succeeded, 1);
    assert_eq!(report.counters.failed, 1);
    assert_eq!(report.counters.skipped, 0);

    let store = storage::lock(&storage).unwrap();
    assert!(store.detail_exists("a").unwrap());
    assert!(!store.detail_exists("b").unwrap());
    assert!(store.detail_exists("c").unwrap());

    let c = store.get_detail("c").unwrap().unwrap();
    assert_eq!(c.episodes[0].server_data[0].slug, "tap-01");
}

#[tokio::test]
async fn test_reconcile_resolves_list_form_slug() {
    let server = MockServer::start().await;
    mount_detail(
        &server,
        "foo-bar",
        ResponseTemplate::new(200).set_body_json(detail_body("foo-bar")),
    )
    .await;

    let storage = shared_storage();
    {
        let store = storage::lock(&storage).unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO catalog (slug, name, created_at, updated_at)
                 VALUES ('[\"foo-bar\"]', 'Foo Bar', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
    }

    let crawl = crawl_service(&server.uri(), storage.clone());
    let report = completed(crawl.trigger_manually(Pipeline::Detail).await.unwrap());

    assert_eq!(report.counters.succeeded, 1);
    assert_eq!(report.counters.failed, 0);
    assert!(storage::lock(&storage).unwrap().detail_exists("foo-bar").unwrap());
}

#[tokio::test]
async fn test_detail_retry_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/phim/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut store = SqliteStorage::open_in_memory().unwrap();
    let item = serde_json::from_value(listing_item("flaky")).unwrap();
    upsert_all(&mut store, vec![item]).unwrap();
    let storage = std::sync::Arc::new(std::sync::Mutex::new(store));

    let crawl = crawl_service(&server.uri(), storage.clone());
    let report = completed(crawl.trigger_manually(Pipeline::Detail).await.unwrap());

    assert_eq!(report.counters.attempted, 1);
    assert_eq!(report.counters.failed, 1);
}

#[tokio::test]
async fn test_detail_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/phim/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let storage = shared_storage();
    {
        let mut store = storage::lock(&storage).unwrap();
        let item = serde_json::from_value(listing_item("missing")).unwrap();
        upsert_all(&mut *store, vec![item]).unwrap();
    }

    let crawl = crawl_service(&server.uri(), storage);
    let report = completed(crawl.trigger_manually(Pipeline::Detail).await.unwrap());
    assert_eq!(report.counters.failed, 1);
}

#[tokio::test]
async fn test_trigger_while_running_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let storage = shared_storage();
    let crawl = crawl_service(&server.uri(), storage.clone());

    let permit = crawl.guard(Pipeline::Listing).try_enter().unwrap();
    let outcome = crawl.trigger_manually(Pipeline::Listing).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::AlreadyRunning);
    drop(permit);

    // Nothing recorded for a rejected trigger
    let store = storage::lock(&storage).unwrap();
    assert!(store.get_latest_run(Pipeline::Listing).unwrap().is_none());
}

#[tokio::test]
async fn test_interrupted_runs_recovered() {
    let storage = shared_storage();
    let run_id = storage::lock(&storage)
        .unwrap()
        .create_run(Pipeline::Detail, "old-hash")
        .unwrap();

    let crawl = CrawlService::new(Config::default(), "hash".to_string(), storage.clone()).unwrap();
    assert_eq!(crawl.recover_interrupted_runs().unwrap(), 1);

    let run = storage::lock(&storage).unwrap().get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_scheduled_failure_is_contained() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let storage = shared_storage();
    let crawl = crawl_service(&server.uri(), storage.clone());
    crawl.run_scheduled(Pipeline::Listing).await;

    assert!(!crawl.is_running(Pipeline::Listing));
    assert!(crawl.guard(Pipeline::Listing).try_enter().is_some());

    let store = storage::lock(&storage).unwrap();
    let run = store.get_latest_run(Pipeline::Listing).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.unwrap().contains("Listing page 1"));
}

#[tokio::test]
async fn test_startup_run_fills_catalog() {
    let server = MockServer::start().await;
    mount_listing_page(
        &server,
        1,
        listing_body(vec![listing_item("x"), listing_item("y")], 1),
    )
    .await;
    for slug in ["x", "y"] {
        mount_detail(
            &server,
            slug,
            ResponseTemplate::new(200).set_body_json(detail_body(slug)),
        )
        .await;
    }

    let storage = shared_storage();
    let mut scheduler = Scheduler::new(crawl_service(&server.uri(), storage.clone()));
    scheduler.run_on_startup();

    // Listing runs first, so a finished detail run means both are done
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let finished = storage::lock(&storage)
            .unwrap()
            .get_latest_run(Pipeline::Detail)
            .unwrap()
            .is_some_and(|run| run.status != RunStatus::Running);
        if finished {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "Startup run did not finish"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    scheduler.shutdown();

    let store = storage::lock(&storage).unwrap();
    assert_eq!(store.count_catalog().unwrap(), 2);
    assert!(store.detail_exists("x").unwrap());
    assert!(store.detail_exists("y").unwrap());
    let listing = store.get_latest_run(Pipeline::Listing).unwrap().unwrap();
    assert_eq!(listing.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_detail_throttle_applies_after_failures() {
    let server = MockServer::start().await;
    for slug in ["gone-1", "gone-2"] {
        mount_detail(&server, slug, ResponseTemplate::new(404)).await;
    }

    let storage = shared_storage();
    {
        let mut store = storage::lock(&storage).unwrap();
        let items = ["gone-1", "gone-2"]
            .iter()
            .map(|slug| serde_json::from_value(listing_item(slug)).unwrap())
            .collect();
        upsert_all(&mut *store, items).unwrap();
    }

    let mut config = test_config(&server.uri());
    config.crawl.detail_throttle_ms = 150;
    let crawl = CrawlService::new(config, "test-hash".to_string(), storage).unwrap();

    let started = std::time::Instant::now();
    let report = completed(crawl.trigger_manually(Pipeline::Detail).await.unwrap());

    assert_eq!(report.counters.failed, 2);
    assert!(started.elapsed() >= Duration::from_millis(300));
}
