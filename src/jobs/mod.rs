// src/jobs/mod.rs
//! Job names, results, and the per-item bookkeeping shared by the pipelines.

pub mod dispatcher;
pub mod router;

pub use dispatcher::{ActionDispatcher, Capabilities, DispatchSettings, GateSet};
pub use router::JobRouter;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{JobError, SkipReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobName {
    PeriodicPost,
    ReplyToMentions,
    MonitorTrends,
    DailyFollowerAnalysis,
    PostPoll,
    SearchUsingTrends,
    ScrapeAndPost,
}

impl JobName {
    pub const ALL: [JobName; 7] = [
        JobName::PeriodicPost,
        JobName::ReplyToMentions,
        JobName::MonitorTrends,
        JobName::DailyFollowerAnalysis,
        JobName::PostPoll,
        JobName::SearchUsingTrends,
        JobName::ScrapeAndPost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::PeriodicPost => "periodic-post",
            JobName::ReplyToMentions => "reply-to-mentions",
            JobName::MonitorTrends => "monitor-trends",
            JobName::DailyFollowerAnalysis => "daily-follower-analysis",
            JobName::PostPoll => "post-poll",
            JobName::SearchUsingTrends => "search-using-trends",
            JobName::ScrapeAndPost => "scrape-and-post",
        }
    }

    /// Trigger names used by the older cron setup.
    fn from_legacy(s: &str) -> Option<Self> {
        Some(match s {
            "tweetEvery3Hours" => JobName::PeriodicPost,
            "replyToMentionsEvery10Minutes" => JobName::ReplyToMentions,
            "monitorTrendsEvery4Hours" => JobName::MonitorTrends,
            "dailyFollowerAnalysis" => JobName::DailyFollowerAnalysis,
            "postPollAt9AM" => JobName::PostPoll,
            "searchTweetsUsingTrendsEvery6Hours" => JobName::SearchUsingTrends,
            "scrapeAndPostEveryTwoHours" => JobName::ScrapeAndPost,
            _ => return None,
        })
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobName {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        JobName::ALL
            .into_iter()
            .find(|j| j.as_str() == t)
            .or_else(|| JobName::from_legacy(t))
            .ok_or_else(|| JobError::UnknownJob(t.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Success,
    Skipped,
    Failed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Skipped => "skipped",
            JobOutcome::Failed => "failed",
        }
    }
}

/// What every trigger gets back. Built per invocation, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job: String,
    pub outcome: JobOutcome,
    pub detail: String,
}

impl JobResult {
    pub fn success(job: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            outcome: JobOutcome::Success,
            detail: detail.into(),
        }
    }

    pub fn skipped(job: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            job: job.into(),
            outcome: JobOutcome::Skipped,
            detail: reason.to_string(),
        }
    }

    pub fn failed(job: impl Into<String>, err: &JobError) -> Self {
        Self {
            job: job.into(),
            outcome: JobOutcome::Failed,
            detail: err.to_string(),
        }
    }
}

/// How a pipeline ended when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Done(String),
    Skipped(SkipReason),
}

/// Result of one sub-action on one item (a mention, a trend, a search hit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub item: String,
    pub step: &'static str,
    pub error: Option<String>,
}

/// Per-item outcomes of a looping job. One item's failure never stops the loop.
#[derive(Debug, Clone, Default)]
pub struct ItemOutcomes {
    items: Vec<ItemOutcome>,
}

impl ItemOutcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<T>(&mut self, item: impl Into<String>, step: &'static str, result: &Result<T, JobError>) {
        self.items.push(ItemOutcome {
            item: item.into(),
            step,
            error: result.as_ref().err().map(|e| e.to_string()),
        });
    }

    pub fn items(&self) -> &[ItemOutcome] {
        &self.items
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|o| o.error.is_none()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|o| o.error.is_some())
    }

    /// e.g. `"3/4 reply steps succeeded; failed: 17 (reply): rate limit exceeded ..."`
    pub fn summary(&self, noun: &str) -> String {
        let mut out = format!("{}/{} {noun} succeeded", self.succeeded(), self.items.len());
        let failed: Vec<String> = self
            .failures()
            .map(|o| {
                format!(
                    "{} ({}): {}",
                    o.item,
                    o.step,
                    o.error.as_deref().unwrap_or_default()
                )
            })
            .collect();
        if !failed.is_empty() {
            out.push_str("; failed: ");
            out.push_str(&failed.join("; "));
        }
        out
    }
}
