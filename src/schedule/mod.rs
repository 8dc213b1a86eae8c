//! Periodic pipeline triggers
//!
//! Each scheduled pipeline gets its own task that sleeps until the next cron
//! slot in local time and then runs the pipeline through the crawl service.
//! A slot that arrives while the previous run is still going is skipped by
//! the pipeline's guard.

mod cron;

pub use cron::{CronError, CronSchedule};

use crate::config::ScheduleConfig;
use crate::crawler::CrawlService;
use crate::state::Pipeline;
use chrono::Local;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Registers and owns the periodic trigger tasks
pub struct Scheduler {
    crawl: CrawlService,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(crawl: CrawlService) -> Self {
        Self {
            crawl,
            handles: Vec::new(),
        }
    }

    /// Starts the schedules described by the configuration
    ///
    /// Both pipelines are scheduled; with `run_on_startup` they also run once
    /// right away, listing first.
    pub fn start(&mut self, config: &ScheduleConfig) -> Result<(), CronError> {
        let listing: CronSchedule = config.listing_cron.parse()?;
        let detail: CronSchedule = config.detail_cron.parse()?;

        self.schedule_periodic(Pipeline::Listing, listing);
        self.schedule_periodic(Pipeline::Detail, detail);

        if config.run_on_startup {
            self.run_on_startup();
        }
        Ok(())
    }

    /// Registers a recurring trigger for a pipeline
    pub fn schedule_periodic(&mut self, pipeline: Pipeline, schedule: CronSchedule) {
        info!(pipeline = %pipeline, cron = %schedule, "Scheduling pipeline");
        let crawl = self.crawl.clone();

        let handle = tokio::spawn(async move {
            loop {
                let now = Local::now();
                let next = match schedule.next_after(&now) {
                    Some(next) => next,
                    None => {
                        warn!(pipeline = %pipeline, cron = %schedule, "Schedule never fires again");
                        break;
                    }
                };

                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                info!(pipeline = %pipeline, next_run = %next, "Next run scheduled");
                tokio::time::sleep(wait).await;

                crawl.run_scheduled(pipeline).await;
            }
        });

        self.handles.push(handle);
    }

    /// Runs every pipeline once in the background, listing first
    pub fn run_on_startup(&mut self) {
        let crawl = self.crawl.clone();
        let handle = tokio::spawn(async move {
            info!("Running pipelines on startup");
            for pipeline in Pipeline::ALL {
                crawl.run_scheduled(pipeline).await;
            }
        });
        self.handles.push(handle);
    }

    /// Number of background tasks started
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Stops every trigger task
    ///
    /// A run in progress is aborted at its next suspension point; its ledger
    /// row stays `running` and is marked interrupted on the next start.
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
