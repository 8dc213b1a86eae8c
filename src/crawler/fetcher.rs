//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests to the upstream source, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - Building listing and detail URLs
//! - GET requests returning the raw response body
//! - Error classification into transient and permanent failures

use crate::config::UpstreamConfig;
use crate::CrawlError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Transport-level failure of a single upstream request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Whether retrying the same request might succeed
    ///
    /// | Condition | Transient |
    /// |-----------|-----------|
    /// | Timeout | yes |
    /// | Connection / transport failure | yes |
    /// | Body read failure | yes |
    /// | HTTP 5xx | yes |
    /// | HTTP 429 | yes |
    /// | Other HTTP 4xx | no |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } | Self::Body { .. } => true,
            Self::Status { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
        }
    }

    /// The HTTP status, if the upstream answered with one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The upstream configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UpstreamConfig) -> Result<Client, reqwest::Error> {
    let timeout = config.timeout();

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches listing and detail pages from the upstream source
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    listing_url: Url,
    detail_base_url: Url,
}

impl HttpFetcher {
    /// Creates a fetcher for the configured upstream
    pub fn new(config: &UpstreamConfig) -> Result<Self, CrawlError> {
        let base = config.base_url.trim_end_matches('/');
        let listing_url = Url::parse(&format!("{}{}", base, config.listing_path))?;
        let detail_base_url = Url::parse(&format!("{}{}", base, config.detail_path))?;

        Ok(Self {
            client: build_http_client(config)?,
            listing_url,
            detail_base_url,
        })
    }

    /// URL of one listing page
    pub fn listing_url(&self, page: u32) -> Url {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }

    /// URL of the detail page for a slug
    ///
    /// The slug is appended as a single, percent-encoded path segment.
    pub fn detail_url(&self, slug: &str) -> Url {
        let mut url = self.detail_base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(slug);
        }
        url
    }

    /// Fetches the raw body of one listing page
    pub async fn fetch_listing_page(&self, page: u32) -> Result<String, FetchError> {
        self.get(self.listing_url(page)).await
    }

    /// Fetches the raw body of the detail page for a slug
    pub async fn fetch_detail(&self, slug: &str) -> Result<String, FetchError> {
        self.get(self.detail_url(slug)).await
    }

    async fn get(&self, url: Url) -> Result<String, FetchError> {
        let url_string = url.to_string();
        tracing::debug!(url = %url_string, "GET");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url_string.clone(),
                }
            } else {
                FetchError::Network {
                    url: url_string.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_string,
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url_string.clone(),
                }
            } else {
                FetchError::Body {
                    url: url_string.clone(),
                    message: e.to_string(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UpstreamConfig {
        UpstreamConfig {
            base_url: "https://upstream.example/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        let client = build_http_client(&config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_listing_url() {
        let fetcher = HttpFetcher::new(&create_test_config()).unwrap();
        assert_eq!(
            fetcher.listing_url(3).as_str(),
            "https://upstream.example/danh-sach/phim-moi-cap-nhat?page=3"
        );
    }

    #[test]
    fn test_detail_url_encodes_slug() {
        let fetcher = HttpFetcher::new(&create_test_config()).unwrap();
        assert_eq!(
            fetcher.detail_url("foo-bar").as_str(),
            "https://upstream.example/phim/foo-bar"
        );
        assert_eq!(
            fetcher.detail_url("a/b").as_str(),
            "https://upstream.example/phim/a%2Fb"
        );
    }

    #[test]
    fn test_transient_classification() {
        let status = |status| FetchError::Status {
            url: "u".to_string(),
            status,
        };

        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(400).is_transient());
        assert!(FetchError::Timeout {
            url: "u".to_string()
        }
        .is_transient());
        assert_eq!(status(404).status(), Some(404));
    }
}
