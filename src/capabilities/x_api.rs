// src/capabilities/x_api.rs
//! Action capability backed by the X v2 HTTP API (user-context bearer token).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{retry_after_from_headers, ActionCapability, Poll, PostId, PostRef};
use crate::config::XConfig;
use crate::error::{CapResult, CapabilityError};

pub struct XApiClient {
    http: Client,
    api_base: String,
    bearer_token: String,
    user_id: String,
    trends_woeid: u32,
    search_max_results: u32,
}

impl XApiClient {
    pub fn new(cfg: &XConfig, search_max_results: u32) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("social-autopilot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .context("building X API http client")?;
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            bearer_token: cfg.bearer_token.clone(),
            user_id: cfg.user_id.clone(),
            trends_woeid: cfg.trends_woeid,
            // recent search accepts 10..=100
            search_max_results: search_max_results.clamp(10, 100),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send<T: DeserializeOwned>(&self, call: &str, req: RequestBuilder) -> CapResult<T> {
        let resp = req
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .with_context(|| format!("{call}: request failed"))?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after_from_headers(resp.headers(), chrono::Utc::now().timestamp());
            debug!(target: "capability", call, ?wait, "X API answered 429");
            return Err(CapabilityError::rate_limited(wait));
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("{call}: reading body"))?;
        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(anyhow!("{call}: HTTP {status}: {snippet}").into());
        }
        serde_json::from_str(&body)
            .map_err(|e| CapabilityError::malformed(format!("{call}: unexpected response: {e}")))
    }

    async fn create_tweet(&self, call: &str, body: serde_json::Value) -> CapResult<PostId> {
        let resp: CreateResp = self
            .send(call, self.http.post(self.url("/2/tweets")).json(&body))
            .await?;
        Ok(resp.data.id)
    }

    async fn timeline(&self, call: &str, req: RequestBuilder) -> CapResult<Vec<PostRef>> {
        let resp: TimelineResp = self.send(call, req).await?;
        Ok(resp.into_posts())
    }
}

#[derive(Deserialize)]
struct CreateResp {
    data: Created,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct TimelineResp {
    #[serde(default)]
    data: Vec<TweetData>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct Includes {
    #[serde(default)]
    users: Vec<UserData>,
}

#[derive(Deserialize)]
struct UserData {
    id: String,
    username: String,
}

impl TimelineResp {
    fn into_posts(self) -> Vec<PostRef> {
        let handles: HashMap<String, String> = self
            .includes
            .users
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();
        self.data
            .into_iter()
            .map(|t| {
                let author_id = t.author_id.unwrap_or_default();
                PostRef {
                    author_handle: handles.get(&author_id).cloned(),
                    id: t.id,
                    text: t.text,
                    author_id,
                }
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct LikeResp {
    data: LikeData,
}

#[derive(Deserialize)]
struct LikeData {
    liked: bool,
}

#[derive(Deserialize)]
struct TrendsResp {
    #[serde(default)]
    data: Vec<TrendData>,
}

#[derive(Deserialize)]
struct TrendData {
    trend_name: String,
}

#[async_trait]
impl ActionCapability for XApiClient {
    async fn post(&self, text: &str) -> CapResult<PostId> {
        self.create_tweet("post", json!({ "text": text })).await
    }

    async fn reply(&self, text: &str, target_id: &str) -> CapResult<PostId> {
        self.create_tweet(
            "reply",
            json!({ "text": text, "reply": { "in_reply_to_tweet_id": target_id } }),
        )
        .await
    }

    async fn get_mentions(&self) -> CapResult<Vec<PostRef>> {
        let req = self
            .http
            .get(self.url(&format!("/2/users/{}/mentions", self.user_id)))
            .query(&[
                ("max_results", "20"),
                ("expansions", "author_id"),
                ("user.fields", "username"),
            ]);
        self.timeline("get_mentions", req).await
    }

    async fn get_trends(&self) -> CapResult<Vec<String>> {
        let resp: TrendsResp = self
            .send(
                "get_trends",
                self.http
                    .get(self.url(&format!("/2/trends/by/woeid/{}", self.trends_woeid))),
            )
            .await?;
        Ok(resp.data.into_iter().map(|t| t.trend_name).collect())
    }

    async fn search(&self, query: &str) -> CapResult<Vec<PostRef>> {
        let max = self.search_max_results.to_string();
        let req = self
            .http
            .get(self.url("/2/tweets/search/recent"))
            .query(&[
                ("query", query),
                ("max_results", max.as_str()),
                ("expansions", "author_id"),
                ("user.fields", "username"),
            ]);
        self.timeline("search", req).await
    }

    async fn like(&self, user_id: &str, target_id: &str) -> CapResult<()> {
        let resp: LikeResp = self
            .send(
                "like",
                self.http
                    .post(self.url(&format!("/2/users/{user_id}/likes")))
                    .json(&json!({ "tweet_id": target_id })),
            )
            .await?;
        if resp.data.liked {
            Ok(())
        } else {
            Err(CapabilityError::malformed("like: platform reported liked=false"))
        }
    }

    async fn post_poll(&self, poll: &Poll) -> CapResult<PostId> {
        self.create_tweet(
            "post_poll",
            json!({
                "text": poll.question,
                "poll": { "options": poll.options, "duration_minutes": poll.duration_minutes }
            }),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "x-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_joins_author_handles() {
        let raw = r#"{
            "data": [{"id": "1", "text": "hi @bot", "author_id": "u1"},
                     {"id": "2", "text": "anon"}],
            "includes": {"users": [{"id": "u1", "username": "alice"}]}
        }"#;
        let resp: TimelineResp = serde_json::from_str(raw).unwrap();
        let posts = resp.into_posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].author_handle.as_deref(), Some("alice"));
        assert_eq!(posts[1].author_id, "");
        assert_eq!(posts[1].author_handle, None);
    }

    #[test]
    fn empty_timeline_has_no_data_field() {
        let resp: TimelineResp = serde_json::from_str(r#"{"meta":{"result_count":0}}"#).unwrap();
        assert!(resp.into_posts().is_empty());
    }
}
