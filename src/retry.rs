//! Bounded exponential backoff around external capability calls.
//!
//! Every call the job pipelines make to the action, decision or scrape
//! capability goes through [`RateLimitRetrier::invoke`]. Only rate-limit
//! signals are retried; every other error goes straight back to the caller.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CapabilityError, JobError};

/// Immutable retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always >= 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Always >= 1.0.
    pub backoff_multiplier: f64,
    /// Upper bound for any single wait, server suggestions included.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        backoff_multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_multiplier: if backoff_multiplier.is_finite() {
                backoff_multiplier.max(1.0)
            } else {
                1.0
            },
            max_delay: max_delay.max(base_delay),
        }
    }

    /// `base_delay * multiplier^attempt`, capped at `max_delay`. `attempt` is 0-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Wait before the retry that follows failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        let backoff = self.backoff(attempt);
        match suggested {
            Some(s) => s.min(self.max_delay).max(backoff),
            None => backoff,
        }
    }

    /// Worst-case total time spent waiting across one `invoke`.
    pub fn max_total_wait(&self) -> Duration {
        self.max_delay * self.max_attempts.saturating_sub(1)
    }
}

/// Delay primitive, swappable so tests can count waits instead of sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// Records requested waits and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().expect("sleeper mutex poisoned").clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        self.waits.lock().expect("sleeper mutex poisoned").push(d);
    }
}

#[derive(Clone)]
pub struct RateLimitRetrier {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimitRetrier {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn with_tokio(policy: RetryPolicy) -> Self {
        Self::new(policy, Arc::new(TokioSleeper))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call`, retrying on rate-limit signals until `max_attempts` is used up.
    ///
    /// `label` names the call in logs, metrics and error details. Callers must
    /// not hold any gate lock across this future: it may sleep.
    pub async fn invoke<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, JobError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        let max = self.policy.max_attempts;
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(CapabilityError::RateLimited { retry_after }) => {
                    attempt += 1;
                    counter!("capability_rate_limited_total", "call" => label.to_string())
                        .increment(1);
                    if attempt >= max {
                        counter!("capability_retry_exhausted_total", "call" => label.to_string())
                            .increment(1);
                        warn!(target: "retry", call = label, attempts = attempt, "rate limit retry budget exhausted");
                        return Err(JobError::RateLimitExceeded {
                            call: label.to_string(),
                            attempts: attempt,
                        });
                    }
                    let wait = self.policy.delay_for(attempt - 1, retry_after);
                    warn!(
                        target: "retry",
                        call = label,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        suggested_ms = retry_after.map(|d| d.as_millis() as u64),
                        "rate limited, backing off"
                    );
                    self.sleeper.sleep(wait).await;
                }
                Err(CapabilityError::Malformed(reason)) => {
                    return Err(JobError::MalformedCapabilityOutput {
                        call: label.to_string(),
                        reason,
                    })
                }
                Err(CapabilityError::Failed(source)) => {
                    return Err(JobError::ExternalCallFailure {
                        call: label.to_string(),
                        source,
                    })
                }
            }
        }
    }
}
