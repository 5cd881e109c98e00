//! Permission gates in front of the scheduled jobs.
//!
//! Each gate keeps its state in a [`StateStore`] record and changes it with a
//! single check-and-update step, so two overlapping triggers cannot both pass.

pub mod daily;
pub mod quota;
pub mod throttle;

pub use daily::{DailyFlag, DailyGate};
pub use quota::{QuotaCounter, QuotaTracker};
pub use throttle::{ThrottleGate, ThrottleState};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::store::StateStore;

/// Compare-and-set attempts before giving up on a contended record.
const MAX_CAS_ATTEMPTS: usize = 16;

/// Load `key`, let `decide` compute the next record and a verdict, and write
/// the record back only if nobody changed it in between. `decide` may run
/// more than once under contention and must be free of side effects.
///
/// `decide` returning `None` as the next record means "leave it as is".
pub(crate) async fn check_and_update<T, R, F>(
    store: &dyn StateStore,
    key: &str,
    mut decide: F,
) -> Result<R>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(Option<T>) -> (Option<T>, R),
{
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let raw = store.get(key).await?;
        let current = raw.as_deref().and_then(|s| decode::<T>(key, s));
        let (next, verdict) = decide(current);
        let Some(next) = next else {
            return Ok(verdict);
        };
        let encoded =
            serde_json::to_string(&next).with_context(|| format!("encoding record {key}"))?;
        if store.compare_and_set(key, raw.as_deref(), &encoded).await? {
            return Ok(verdict);
        }
        debug!(target: "gates", key, attempt, "state record changed underneath, retrying");
    }
    bail!("state record {key} stayed contended after {MAX_CAS_ATTEMPTS} attempts")
}

/// Read-only view of a record, for dashboards.
pub(crate) async fn peek<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Result<Option<T>> {
    Ok(store
        .get(key)
        .await?
        .as_deref()
        .and_then(|s| decode::<T>(key, s)))
}

/// Unreadable records are treated as absent so a corrupt file cannot wedge a gate.
fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(target: "gates", key, error = %e, "unreadable state record, treating as absent");
            None
        }
    }
}
