// src/gates/throttle.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_and_update, peek};
use crate::clock::Clock;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleState {
    pub last_run: Option<DateTime<Utc>>,
}

impl ThrottleState {
    /// Absent `last_run` always passes. A clock that went backwards does not.
    pub fn permits(&self, now: DateTime<Utc>, min_interval: ChronoDuration) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.signed_duration_since(last) >= min_interval,
        }
    }
}

/// Minimum-interval gate for one periodic action.
pub struct ThrottleGate {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    key: String,
}

impl ThrottleGate {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>, key: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            key: key.into(),
        }
    }

    /// Passes (and stamps `last_run = now`) when at least `min_interval` has
    /// elapsed since the previous pass.
    pub async fn try_acquire(&self, min_interval: Duration) -> Result<bool> {
        let min_interval = ChronoDuration::from_std(min_interval)
            .context("throttle interval out of range")?;
        let now = self.clock.now();
        let acquired = check_and_update(self.store.as_ref(), &self.key, |stored| {
            let state: ThrottleState = stored.unwrap_or_default();
            if state.permits(now, min_interval) {
                (Some(ThrottleState { last_run: Some(now) }), true)
            } else {
                (None, false)
            }
        })
        .await?;

        if !acquired {
            info!(target: "gates", key = %self.key, interval_secs = min_interval.num_seconds(), "throttle active");
        }
        Ok(acquired)
    }

    pub async fn snapshot(&self) -> Result<ThrottleState> {
        Ok(peek(self.store.as_ref(), &self.key).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn gate() -> (ThrottleGate, Arc<ManualClock>) {
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let g = ThrottleGate::new(Arc::new(MemoryStore::new()), clock.clone(), "throttle:test");
        (g, clock)
    }

    const TEN_MIN: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn second_call_inside_interval_is_refused() {
        let (g, clock) = gate();
        assert!(g.try_acquire(TEN_MIN).await.unwrap());
        clock.advance(ChronoDuration::minutes(9));
        assert!(!g.try_acquire(TEN_MIN).await.unwrap());
    }

    #[tokio::test]
    async fn second_call_after_interval_passes() {
        let (g, clock) = gate();
        assert!(g.try_acquire(TEN_MIN).await.unwrap());
        clock.advance(ChronoDuration::minutes(10));
        assert!(g.try_acquire(TEN_MIN).await.unwrap());
    }

    #[tokio::test]
    async fn refusal_does_not_move_last_run() {
        let (g, clock) = gate();
        let t0 = clock.now();
        assert!(g.try_acquire(TEN_MIN).await.unwrap());
        clock.advance(ChronoDuration::minutes(5));
        assert!(!g.try_acquire(TEN_MIN).await.unwrap());
        assert_eq!(g.snapshot().await.unwrap().last_run, Some(t0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_triggers_get_one_permit() {
        let (g, _clock) = gate();
        let g = Arc::new(g);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let g = g.clone();
                tokio::spawn(async move { g.try_acquire(TEN_MIN).await.unwrap() })
            })
            .collect();
        let mut granted = 0;
        for h in handles {
            if h.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }
}
