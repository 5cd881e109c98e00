// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod bootstrap;
pub mod capabilities;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod gates;
pub mod jobs;
pub mod metrics;
pub mod parse;
pub mod relevance;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod topics;

use std::sync::Arc;

pub use crate::error::{CapabilityError, JobError, SkipReason};
pub use crate::jobs::{JobName, JobOutcome, JobResult, JobRouter};

use crate::config::AutopilotConfig;

/// Bootstrap the job router from an already loaded config and build the HTTP router.
/// Starts the built-in scheduler when `scheduler.enabled` is set.
pub fn app(cfg: AutopilotConfig) -> anyhow::Result<axum::Router> {
    let scheduler_enabled = cfg.scheduler.enabled;
    let jobs = Arc::new(bootstrap::from_config(cfg)?);
    if scheduler_enabled {
        scheduler::spawn_scheduler(jobs.clone(), scheduler::default_schedule());
    }
    let metrics = metrics::Metrics::init();
    Ok(api::router(api::AppState::new(jobs), &metrics))
}
