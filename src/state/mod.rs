//! State module for tracking crawl pipelines
//!
//! This module provides the process-local state shared by the scheduler and the
//! manual trigger entry points.
//!
//! # Components
//!
//! - `Pipeline`: Identifies one of the two independently scheduled crawl pipelines
//! - `CrawlGuard`: Single-flight flag ensuring a pipeline never overlaps itself
//!
//! None of this state is persisted. It is created at startup and lives as long as
//! the process; a multi-instance deployment would need a shared lock instead.

mod guard;
mod pipeline;

// Re-export main types
pub use guard::{CrawlGuard, GuardPermit};
pub use pipeline::Pipeline;
