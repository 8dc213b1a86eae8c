//! Integration tests for Movie-Catalog
//!
//! These tests use wiremock to stand in for the upstream movie source and an
//! in-memory SQLite database for storage.

mod api_tests;
mod common;
mod crawl_tests;
