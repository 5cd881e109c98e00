// src/scheduler.rs
//! Built-in timer that fires jobs through the router at fixed cadences.
use std::sync::Arc;
use std::time::Duration;

use metrics::gauge;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::jobs::{JobName, JobRouter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub job: JobName,
    pub every: Duration,
}

const MIN: u64 = 60;
const HOUR: u64 = 60 * MIN;

/// periodic-post 3h, mentions 10m, trends 4h, analysis 24h, poll hourly
/// (the daily gate keeps it once per day), search 6h, scrape 2h.
pub fn default_schedule() -> Vec<ScheduleEntry> {
    let e = |job, secs| ScheduleEntry {
        job,
        every: Duration::from_secs(secs),
    };
    vec![
        e(JobName::PeriodicPost, 3 * HOUR),
        e(JobName::ReplyToMentions, 10 * MIN),
        e(JobName::MonitorTrends, 4 * HOUR),
        e(JobName::DailyFollowerAnalysis, 24 * HOUR),
        e(JobName::PostPoll, HOUR),
        e(JobName::SearchUsingTrends, 6 * HOUR),
        e(JobName::ScrapeAndPost, 2 * HOUR),
    ]
}

/// One task per entry. Missed ticks are skipped, not bursted. The first
/// tick fires after one full period.
pub fn spawn_scheduler(router: Arc<JobRouter>, schedule: Vec<ScheduleEntry>) -> Vec<JoinHandle<()>> {
    schedule
        .into_iter()
        .map(|entry| {
            let router = router.clone();
            tokio::spawn(async move {
                let start = tokio::time::Instant::now() + entry.every;
                let mut ticker = tokio::time::interval_at(start, entry.every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                tracing::info!(
                    target: "scheduler",
                    job = entry.job.as_str(),
                    every_secs = entry.every.as_secs(),
                    "job scheduled"
                );
                loop {
                    ticker.tick().await;
                    let res = router.run(entry.job).await;
                    gauge!("scheduler_last_run_ts", "job" => entry.job.as_str())
                        .set(chrono::Utc::now().timestamp() as f64);
                    tracing::debug!(
                        target: "scheduler",
                        job = entry.job.as_str(),
                        outcome = res.outcome.as_str(),
                        "scheduled tick done"
                    );
                }
            })
        })
        .collect()
}
