// src/jobs/router.rs
//! Name → pipeline. Every trigger (cron, HTTP, CLI) goes through here and
//! always gets a `JobResult` back; nothing escapes as a panic or an `Err`.

use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{error, info, info_span, warn, Instrument};

use super::{ActionDispatcher, Completion, JobName, JobOutcome, JobResult};
use crate::error::JobError;
use crate::metrics::ensure_metrics_described;

pub struct JobRouter {
    dispatcher: ActionDispatcher,
}

impl JobRouter {
    pub fn new(dispatcher: ActionDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub async fn route(&self, name: &str) -> JobResult {
        ensure_metrics_described();
        let job = match name.parse::<JobName>() {
            Ok(j) => j,
            Err(e) => {
                warn!(target: "jobs", job = name, "unknown job requested");
                counter!("jobs_total", "job" => "unknown", "outcome" => "failed").increment(1);
                return JobResult::failed(name.trim(), &e);
            }
        };
        self.run(job).await
    }

    pub async fn run(&self, job: JobName) -> JobResult {
        ensure_metrics_described();
        let started = Instant::now();
        let span = info_span!(target: "jobs", "job", job = job.as_str());

        let result = async {
            info!(target: "jobs", "job started");
            self.dispatcher.dispatch(job).await
        }
        .instrument(span)
        .await;

        let res = into_result(job, result);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        counter!("jobs_total", "job" => job.as_str(), "outcome" => res.outcome.as_str())
            .increment(1);
        histogram!("job_duration_ms", "job" => job.as_str()).record(elapsed_ms);

        match res.outcome {
            JobOutcome::Success => {
                info!(target: "jobs", job = job.as_str(), elapsed_ms, detail = %res.detail, "job finished")
            }
            JobOutcome::Skipped => {
                info!(target: "jobs", job = job.as_str(), reason = %res.detail, "job skipped")
            }
            JobOutcome::Failed => {
                error!(target: "jobs", job = job.as_str(), error = %res.detail, "job failed")
            }
        }
        res
    }
}

fn into_result(job: JobName, result: Result<Completion, JobError>) -> JobResult {
    match result {
        Ok(Completion::Done(detail)) => JobResult::success(job.as_str(), detail),
        Ok(Completion::Skipped(reason)) => JobResult::skipped(job.as_str(), reason),
        Err(e) => JobResult::failed(job.as_str(), &e),
    }
}
