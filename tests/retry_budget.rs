// tests/retry_budget.rs
//
// Attempt and wait accounting of the rate-limit retrier.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use social_autopilot::retry::{RateLimitRetrier, RecordingSleeper, RetryPolicy};
use social_autopilot::{CapabilityError, JobError};

fn retrier(max_attempts: u32) -> (RateLimitRetrier, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::new());
    let policy = RetryPolicy::new(
        max_attempts,
        Duration::from_millis(10),
        2.0,
        Duration::from_millis(50),
    );
    (RateLimitRetrier::new(policy, sleeper.clone()), sleeper)
}

#[tokio::test]
async fn succeeds_after_max_minus_one_rate_limits() {
    for max in 1..=5u32 {
        let (r, sleeper) = retrier(max);
        let calls = AtomicU32::new(0);
        let out = r
            .invoke("post", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n + 1 < max {
                        Err(CapabilityError::rate_limited(None))
                    } else {
                        Ok("posted")
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), "posted", "max={max}");
        assert_eq!(calls.load(Ordering::SeqCst), max);
        assert_eq!(sleeper.waits().len(), (max - 1) as usize);
    }
}

#[tokio::test]
async fn always_rate_limited_stops_after_exactly_max_attempts() {
    let (r, sleeper) = retrier(4);
    let calls = AtomicU32::new(0);
    let err = r
        .invoke::<(), _, _>("search", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::rate_limited(Some(Duration::from_millis(30)))) }
        })
        .await
        .unwrap_err();

    match err {
        JobError::RateLimitExceeded { call, attempts } => {
            assert_eq!(call, "search");
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // The server hint wins while it is longer than the local backoff, and
    // nothing exceeds the cap.
    assert_eq!(
        sleeper.waits(),
        vec![
            Duration::from_millis(30),
            Duration::from_millis(30),
            Duration::from_millis(40),
        ]
    );
}

#[tokio::test]
async fn malformed_output_is_not_retried() {
    let (r, sleeper) = retrier(3);
    let err = r
        .invoke::<String, _, _>("generate", || async {
            Err(CapabilityError::malformed("empty completion"))
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "generate returned malformed output: empty completion");
    assert!(sleeper.waits().is_empty());
}
