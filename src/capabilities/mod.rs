//! External collaborators the job pipelines drive: the platform (action),
//! the content generator (decision) and the page scraper.
//!
//! Everything here is an interface plus thin HTTP adapters. Any method may
//! answer `CapabilityError::RateLimited`; the pipelines only ever call these
//! through the `RateLimitRetrier`.

pub mod mock;
pub mod openai;
pub mod scraper;
pub mod x_api;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CapResult;

pub type PostId = String;

/// A post seen on the platform: a mention, or a search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub id: String,
    pub text: String,
    pub author_id: String,
    #[serde(default)]
    pub author_handle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default = "default_poll_minutes")]
    pub duration_minutes: u32,
}

fn default_poll_minutes() -> u32 {
    1440
}

#[async_trait]
pub trait ActionCapability: Send + Sync {
    async fn post(&self, text: &str) -> CapResult<PostId>;
    async fn reply(&self, text: &str, target_id: &str) -> CapResult<PostId>;
    async fn get_mentions(&self) -> CapResult<Vec<PostRef>>;
    async fn get_trends(&self) -> CapResult<Vec<String>>;
    async fn search(&self, query: &str) -> CapResult<Vec<PostRef>>;
    /// `user_id` is the account doing the liking.
    async fn like(&self, user_id: &str, target_id: &str) -> CapResult<()>;
    async fn post_poll(&self, poll: &Poll) -> CapResult<PostId>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait DecisionCapability: Send + Sync {
    async fn generate(&self, prompt: &str) -> CapResult<String>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ScrapeCapability: Send + Sync {
    /// Bounded-time. A failure is one error, never partial results.
    async fn scrape(&self, url: &str) -> CapResult<Vec<String>>;
    fn name(&self) -> &'static str;
}

/// Parse `retry-after` (seconds) or `x-rate-limit-reset` (unix seconds) into a wait.
pub(crate) fn retry_after_from_headers(
    headers: &reqwest::header::HeaderMap,
    now_unix: i64,
) -> Option<std::time::Duration> {
    let header_i64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<i64>().ok())
    };
    if let Some(secs) = header_i64("retry-after") {
        return Some(std::time::Duration::from_secs(secs.max(0) as u64));
    }
    header_i64("x-rate-limit-reset")
        .map(|reset| std::time::Duration::from_secs((reset - now_unix).max(0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};
    use std::time::Duration;

    #[test]
    fn retry_after_prefers_explicit_seconds() {
        let mut h = HeaderMap::new();
        h.insert("retry-after", HeaderValue::from_static("7"));
        h.insert("x-rate-limit-reset", HeaderValue::from_static("2000"));
        assert_eq!(retry_after_from_headers(&h, 1000), Some(Duration::from_secs(7)));
    }

    #[test]
    fn reset_timestamp_becomes_remaining_wait() {
        let mut h = HeaderMap::new();
        h.insert("x-rate-limit-reset", HeaderValue::from_static("1090"));
        assert_eq!(retry_after_from_headers(&h, 1000), Some(Duration::from_secs(90)));
        assert_eq!(retry_after_from_headers(&HeaderMap::new(), 1000), None);
    }
}
