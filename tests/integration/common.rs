//! Shared fixtures for the integration tests

use movie_catalog::config::Config;
use movie_catalog::storage::{SharedStorage, SqliteStorage};
use movie_catalog::CrawlService;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LISTING_PATH: &str = "/danh-sach/phim-moi-cap-nhat";

/// Configuration pointed at a mock upstream, with near-zero delays
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.upstream.base_url = base_url.to_string();
    config.upstream.timeout_ms = 2000;
    config.retry.base_delay_ms = 1;
    config.crawl.detail_throttle_ms = 0;
    config
}

pub fn shared_storage() -> SharedStorage {
    Arc::new(Mutex::new(
        SqliteStorage::open_in_memory().expect("Failed to open in-memory database"),
    ))
}

pub fn crawl_service(base_url: &str, storage: SharedStorage) -> CrawlService {
    CrawlService::new(test_config(base_url), "test-hash".to_string(), storage)
        .expect("Failed to create crawl service")
}

/// A listing item as the upstream sends it
pub fn listing_item(slug: &str) -> Value {
    json!({
        "_id": format!("id-{}", slug),
        "name": format!("Movie {}", slug),
        "slug": slug,
        "origin_name": format!("Original {}", slug),
        "type": "single",
        "year": 2021,
        "modified": {"time": "2024-05-01T10:00:00.000Z"},
        "category": [{"id": "1", "name": "Action", "slug": "hanh-dong"}],
        "country": [{"id": "2", "name": "Korea", "slug": "han-quoc"}]
    })
}

pub fn listing_body(items: Vec<Value>, total_pages: u32) -> Value {
    json!({
        "status": true,
        "items": items,
        "pagination": {
            "totalItems": 0,
            "totalItemsPerPage": 24,
            "currentPage": 1,
            "totalPages": total_pages
        }
    })
}

pub fn detail_body(slug: &str) -> Value {
    json!({
        "status": true,
        "movie": {"name": format!("Movie {}", slug), "slug": slug},
        "episodes": [{
            "server_name": "Vietsub #1",
            "server_data": [{
                "name": "Tap 01",
                "slug": "",
                "filename": "movie-tap-01",
                "link_embed": "https://player.example.com/embed/1",
                "link_m3u8": "https://player.example.com/1/index.m3u8"
            }]
        }]
    })
}

pub async fn mount_listing_page(server: &MockServer, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_detail(server: &MockServer, slug: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/phim/{}", slug)))
        .respond_with(response)
        .mount(server)
        .await;
}
