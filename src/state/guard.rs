//! Single-flight guard for crawl pipelines
//!
//! A `CrawlGuard` admits at most one active cycle per pipeline. Callers that find
//! the guard taken are turned away immediately; nothing is queued.

use crate::state::Pipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-local "is a cycle currently executing" flag for one pipeline
///
/// Clones share the same flag, so the scheduler and the API can hold their own
/// handle to the guard of a pipeline.
#[derive(Debug, Clone)]
pub struct CrawlGuard {
    pipeline: Pipeline,
    running: Arc<AtomicBool>,
}

impl CrawlGuard {
    /// Creates a released guard for the given pipeline
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attempts to start a cycle
    ///
    /// Returns `None` without blocking if a cycle is already in flight. Otherwise
    /// returns a permit; the flag is released when the permit is dropped, on every
    /// exit path of the caller including errors and panics.
    pub fn try_enter(&self) -> Option<GuardPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                tracing::trace!(pipeline = %self.pipeline, "Guard acquired");
                GuardPermit {
                    pipeline: self.pipeline,
                    running: Arc::clone(&self.running),
                }
            })
    }

    /// Returns whether a cycle is currently in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The pipeline this guard protects
    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }
}

/// Proof that the holder owns the current cycle of a pipeline
#[derive(Debug)]
#[must_use = "the guard is released as soon as the permit is dropped"]
pub struct GuardPermit {
    pipeline: Pipeline,
    running: Arc<AtomicBool>,
}

impl GuardPermit {
    /// The pipeline this permit was issued for
    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }
}

impl Drop for GuardPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        tracing::trace!(pipeline = %self.pipeline, "Guard released");
    }
}
