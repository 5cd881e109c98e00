//! Error and skip taxonomy shared by capabilities, gates and job pipelines.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// What an external collaborator (action, decision or scrape capability) can fail with.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The collaborator is refusing requests for now. `retry_after` is the
    /// server's suggestion, when it gave one.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The collaborator answered, but not in the shape we asked for.
    #[error("malformed output: {0}")]
    Malformed(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl CapabilityError {
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

pub type CapResult<T> = Result<T, CapabilityError>;

/// Failure of a job pipeline step. Converted into `JobOutcome::Failed` at the router.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("rate limit exceeded for {call} after {attempts} attempts")]
    RateLimitExceeded { call: String, attempts: u32 },

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("{call} failed: {source:#}")]
    ExternalCallFailure {
        call: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{call} returned malformed output: {reason}")]
    MalformedCapabilityOutput { call: String, reason: String },

    #[error("gate state unavailable: {0:#}")]
    State(#[source] anyhow::Error),
}

impl JobError {
    pub fn malformed(call: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCapabilityOutput {
            call: call.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly label, used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::UnknownJob(_) => "unknown_job",
            Self::ExternalCallFailure { .. } => "external_call_failure",
            Self::MalformedCapabilityOutput { .. } => "malformed_capability_output",
            Self::State(_) => "state",
        }
    }
}

/// Normal, non-error reasons for a job not doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    QuotaExhausted,
    ThrottleActive,
    AlreadyRanToday,
    NoNewContent,
    NoRelevantTrends,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::QuotaExhausted => "quota exhausted",
            Self::ThrottleActive => "throttle active",
            Self::AlreadyRanToday => "already ran today",
            Self::NoNewContent => "no new content",
            Self::NoRelevantTrends => "no relevant trends",
        };
        f.write_str(s)
    }
}
