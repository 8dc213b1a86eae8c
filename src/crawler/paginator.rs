//! Listing pagination
//!
//! Walks the upstream listing from page 1 until `totalPages`, retrying each
//! page with linear back-off. A page that still fails after the last attempt
//! aborts the walk; nothing fetched so far is returned.

use crate::crawler::retry::RetryPolicy;
use crate::crawler::upstream::{parse_listing_page, ListingPage, RawListingItem, UpstreamError};
use crate::crawler::HttpFetcher;
use crate::CrawlError;
use tracing::{debug, info};

/// Fetches every listing page in order
pub struct ListingPaginator<'a> {
    fetcher: &'a HttpFetcher,
    retry: RetryPolicy,
    max_pages: Option<u32>,
}

impl<'a> ListingPaginator<'a> {
    /// Creates a paginator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The upstream fetcher
    /// * `retry` - Retry policy applied to each page (fetch and parse)
    /// * `max_pages` - Optional cap on the number of pages walked
    pub fn new(fetcher: &'a HttpFetcher, retry: RetryPolicy, max_pages: Option<u32>) -> Self {
        Self {
            fetcher,
            retry,
            max_pages,
        }
    }

    /// Fetches and validates one page, with retries
    async fn fetch_page(&self, page: u32) -> Result<ListingPage, CrawlError> {
        self.retry
            .run(move |attempt| async move {
                debug!(page = page, attempt = attempt, "Fetching listing page");
                let body = self.fetcher.fetch_listing_page(page).await?;
                let parsed = parse_listing_page(&body)?;
                Ok::<_, UpstreamError>(parsed)
            })
            .await
            .map_err(|source| CrawlError::ListingPage { page, source })
    }

    /// Fetches all listing items
    ///
    /// Issues exactly `totalPages` requests when every page succeeds (fewer if
    /// capped), and returns the items of all pages in upstream order.
    pub async fn fetch_all_listings(&self) -> Result<Vec<RawListingItem>, CrawlError> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let listing = self.fetch_page(page).await?;
            let last_page = match self.max_pages {
                Some(cap) => listing.total_pages.min(cap),
                None => listing.total_pages,
            };

            info!(
                page = page,
                total_pages = listing.total_pages,
                items = listing.items.len(),
                "Fetched listing page"
            );
            items.extend(listing.items);

            if page >= last_page {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}
