// src/gates/quota.rs
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_and_update, peek};
use crate::clock::Clock;
use crate::store::StateStore;

/// Rolling 24h action counter, stored as `{"count": n, "windowStart": ts}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCounter {
    pub count: u32,
    #[serde(alias = "lastReset")]
    pub window_start: DateTime<Utc>,
}

impl QuotaCounter {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.window_start + ChronoDuration::hours(24)
    }

    /// Replace with `{0, now}` once `now` is past the window. Returns whether it reset.
    pub fn reset_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            *self = Self::fresh(now);
            true
        } else {
            false
        }
    }

    /// Reserve one unit if under `limit`. Never touches the counter otherwise.
    pub fn try_reserve(&mut self, limit: u32) -> bool {
        if self.count < limit {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

/// Daily action quota. A granted `allow()` has already consumed its unit;
/// nothing refunds it.
pub struct QuotaTracker {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    key: String,
    daily_limit: u32,
}

impl QuotaTracker {
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        daily_limit: u32,
    ) -> Self {
        Self {
            store,
            clock,
            key: key.into(),
            daily_limit,
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Reset-if-expired, limit check and increment in one atomic step.
    /// `Ok(false)` is the normal "quota exhausted" answer; `Err` only means the
    /// store itself could not be reached.
    pub async fn allow(&self) -> Result<bool> {
        let now = self.clock.now();
        let limit = self.daily_limit;
        let allowed = check_and_update(self.store.as_ref(), &self.key, |stored| {
            let mut counter = stored.unwrap_or_else(|| QuotaCounter::fresh(now));
            counter.reset_if_expired(now);
            let granted = counter.try_reserve(limit);
            (Some(counter), granted)
        })
        .await?;

        if !allowed {
            info!(target: "gates", key = %self.key, limit, "daily quota exhausted");
        }
        Ok(allowed)
    }

    /// Counter as a caller would see it now (expired windows read as fresh).
    pub async fn snapshot(&self) -> Result<QuotaCounter> {
        let now = self.clock.now();
        let mut counter = peek::<QuotaCounter>(self.store.as_ref(), &self.key)
            .await?
            .unwrap_or_else(|| QuotaCounter::fresh(now));
        counter.reset_if_expired(now);
        Ok(counter)
    }
}
