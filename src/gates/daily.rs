// src/gates/daily.rs
use std::sync::Arc;

use anyhow::Result;
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_and_update, peek};
use crate::clock::Clock;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyFlag {
    pub last_run_date: Option<NaiveDate>,
}

/// At-most-once-per-calendar-day gate. Days are compared as dates in a fixed
/// offset, not as elapsed time: 23:59 and 00:01 are different days.
pub struct DailyGate {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    key: String,
    tz: FixedOffset,
}

impl DailyGate {
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        tz: FixedOffset,
    ) -> Self {
        Self {
            store,
            clock,
            key: key.into(),
            tz,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.tz).date_naive()
    }

    pub async fn try_acquire_for_today(&self) -> Result<bool> {
        let today = self.today();
        let acquired = check_and_update(self.store.as_ref(), &self.key, |stored| {
            let flag: DailyFlag = stored.unwrap_or_default();
            if flag.last_run_date == Some(today) {
                (None, false)
            } else {
                (Some(DailyFlag { last_run_date: Some(today) }), true)
            }
        })
        .await?;

        if !acquired {
            info!(target: "gates", key = %self.key, %today, "already ran today");
        }
        Ok(acquired)
    }

    pub async fn snapshot(&self) -> Result<DailyFlag> {
        Ok(peek(self.store.as_ref(), &self.key).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn gate_at(h: u32, m: u32, tz: FixedOffset) -> (DailyGate, Arc<ManualClock>) {
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, h, m, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let g = DailyGate::new(Arc::new(MemoryStore::new()), clock.clone(), "daily:test", tz);
        (g, clock)
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[tokio::test]
    async fn once_per_date_regardless_of_calls() {
        let (g, clock) = gate_at(0, 30, utc());
        assert!(g.try_acquire_for_today().await.unwrap());
        for _ in 0..5 {
            clock.advance(ChronoDuration::hours(4));
            assert!(!g.try_acquire_for_today().await.unwrap());
        }
    }

    #[tokio::test]
    async fn midnight_crossing_passes_within_minutes() {
        let (g, clock) = gate_at(23, 59, utc());
        assert!(g.try_acquire_for_today().await.unwrap());
        clock.advance(ChronoDuration::minutes(2));
        assert!(g.try_acquire_for_today().await.unwrap());
    }

    #[tokio::test]
    async fn date_follows_configured_offset() {
        // 23:00 UTC is already the next day at UTC+2.
        let plus2 = FixedOffset::east_opt(2 * 3600).unwrap();
        let (g, clock) = gate_at(21, 0, plus2);
        assert!(g.try_acquire_for_today().await.unwrap());
        clock.advance(ChronoDuration::hours(2));
        assert!(g.try_acquire_for_today().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_triggers_run_once() {
        let (g, _clock) = gate_at(9, 0, utc());
        let g = Arc::new(g);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let g = g.clone();
                tokio::spawn(async move { g.try_acquire_for_today().await.unwrap() })
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
