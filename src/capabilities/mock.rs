// src/capabilities/mock.rs
//! Scripted, recording stand-ins for the three capabilities. Used by the test
//! suites and by `AI_TEST_MODE=mock`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use super::{ActionCapability, DecisionCapability, Poll, PostId, PostRef, ScrapeCapability};
use crate::error::{CapResult, CapabilityError};

/// A failure to inject into a stub call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubFailure {
    RateLimited(Option<Duration>),
    Failed(String),
    Malformed(String),
}

impl StubFailure {
    fn into_error(self) -> CapabilityError {
        match self {
            Self::RateLimited(d) => CapabilityError::rate_limited(d),
            Self::Failed(msg) => CapabilityError::Failed(anyhow!(msg)),
            Self::Malformed(msg) => CapabilityError::Malformed(msg),
        }
    }
}

/// Per-operation failure script: queued one-shot failures first, then a
/// standing failure if one is set.
#[derive(Debug, Default)]
struct FailureScript {
    queued: HashMap<String, VecDeque<StubFailure>>,
    always: HashMap<String, StubFailure>,
}

impl FailureScript {
    fn next(&mut self, op: &str) -> Option<StubFailure> {
        if let Some(f) = self.queued.get_mut(op).and_then(VecDeque::pop_front) {
            return Some(f);
        }
        self.always.get(op).cloned()
    }
}

/// One recorded call: operation name plus its main argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubCall {
    pub op: &'static str,
    pub arg: String,
}

#[derive(Debug, Default)]
pub struct StubAction {
    mentions: Vec<PostRef>,
    trends: Vec<String>,
    search_results: HashMap<String, Vec<PostRef>>,
    failures: Mutex<FailureScript>,
    calls: Mutex<Vec<StubCall>>,
    next_id: Mutex<u64>,
}

impl StubAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mentions(mut self, mentions: Vec<PostRef>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn with_trends<S: Into<String>>(mut self, trends: impl IntoIterator<Item = S>) -> Self {
        self.trends = trends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_search_results(mut self, query: &str, hits: Vec<PostRef>) -> Self {
        self.search_results.insert(query.to_string(), hits);
        self
    }

    /// Fail the next `times` calls of `op`.
    pub fn fail_next(self, op: &str, failure: StubFailure, times: usize) -> Self {
        {
            let mut f = self.failures.lock().expect("stub mutex poisoned");
            let q = f.queued.entry(op.to_string()).or_default();
            q.extend(std::iter::repeat(failure).take(times));
        }
        self
    }

    /// Fail every call of `op` (after any queued failures).
    pub fn fail_always(self, op: &str, failure: StubFailure) -> Self {
        self.failures
            .lock()
            .expect("stub mutex poisoned")
            .always
            .insert(op.to_string(), failure);
        self
    }

    pub fn calls(&self) -> Vec<StubCall> {
        self.calls.lock().expect("stub mutex poisoned").clone()
    }

    /// Recorded calls of `op`, failed ones included.
    pub fn calls_of(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.arg)
            .collect()
    }

    fn record(&self, op: &'static str, arg: impl Into<String>) -> CapResult<()> {
        self.calls
            .lock()
            .expect("stub mutex poisoned")
            .push(StubCall { op, arg: arg.into() });
        match self.failures.lock().expect("stub mutex poisoned").next(op) {
            Some(f) => Err(f.into_error()),
            None => Ok(()),
        }
    }

    fn fresh_id(&self) -> PostId {
        let mut g = self.next_id.lock().expect("stub mutex poisoned");
        *g += 1;
        format!("stub-{}", *g)
    }
}

#[async_trait]
impl ActionCapability for StubAction {
    async fn post(&self, text: &str) -> CapResult<PostId> {
        self.record("post", text)?;
        Ok(self.fresh_id())
    }

    async fn reply(&self, text: &str, target_id: &str) -> CapResult<PostId> {
        self.record("reply", format!("{target_id}:{text}"))?;
        Ok(self.fresh_id())
    }

    async fn get_mentions(&self) -> CapResult<Vec<PostRef>> {
        self.record("get_mentions", "")?;
        Ok(self.mentions.clone())
    }

    async fn get_trends(&self) -> CapResult<Vec<String>> {
        self.record("get_trends", "")?;
        Ok(self.trends.clone())
    }

    async fn search(&self, query: &str) -> CapResult<Vec<PostRef>> {
        self.record("search", query)?;
        Ok(self.search_results.get(query).cloned().unwrap_or_default())
    }

    async fn like(&self, user_id: &str, target_id: &str) -> CapResult<()> {
        self.record("like", format!("{user_id}:{target_id}"))
    }

    async fn post_poll(&self, poll: &Poll) -> CapResult<PostId> {
        self.record("post_poll", format!("{} [{}]", poll.question, poll.options.join("|")))?;
        Ok(self.fresh_id())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String, StubFailure> + Send + Sync>;

pub struct StubDecision {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<StubFailure>>,
}

impl StubDecision {
    /// Answers every prompt with the same text.
    pub fn replying(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::with_responder(move |_| Ok(text.clone()))
    }

    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, StubFailure> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(f),
            prompts: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Deterministic responder used in mock mode: poll prompts get a valid
    /// poll, everything else gets a short post echoing the prompt.
    pub fn canned() -> Self {
        Self::with_responder(canned_response)
    }

    pub fn fail_next(self, failure: StubFailure, times: usize) -> Self {
        self.failures
            .lock()
            .expect("stub mutex poisoned")
            .extend(std::iter::repeat(failure).take(times));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("stub mutex poisoned").clone()
    }
}

fn canned_response(prompt: &str) -> Result<String, StubFailure> {
    if prompt.contains("\"options\"") {
        return Ok(r#"{"question":"What is your favorite cryptocurrency?","options":["Bitcoin","Ethereum","Dogecoin","Other"]}"#.to_string());
    }
    let gist: String = prompt.chars().take(120).collect();
    Ok(format!("[mock] {gist}"))
}

#[async_trait]
impl DecisionCapability for StubDecision {
    async fn generate(&self, prompt: &str) -> CapResult<String> {
        self.prompts
            .lock()
            .expect("stub mutex poisoned")
            .push(prompt.to_string());
        if let Some(f) = self.failures.lock().expect("stub mutex poisoned").pop_front() {
            return Err(f.into_error());
        }
        (self.responder)(prompt).map_err(StubFailure::into_error)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub struct StubScraper {
    result: Result<Vec<String>, StubFailure>,
    urls: Mutex<Vec<String>>,
}

impl StubScraper {
    pub fn returning<S: Into<String>>(headlines: impl IntoIterator<Item = S>) -> Self {
        Self {
            result: Ok(headlines.into_iter().map(Into::into).collect()),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: StubFailure) -> Self {
        Self {
            result: Err(failure),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("stub mutex poisoned").clone()
    }
}

#[async_trait]
impl ScrapeCapability for StubScraper {
    async fn scrape(&self, url: &str) -> CapResult<Vec<String>> {
        self.urls
            .lock()
            .expect("stub mutex poisoned")
            .push(url.to_string());
        self.result.clone().map_err(StubFailure::into_error)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_failures_run_out_then_standing_one_applies() {
        let a = StubAction::new()
            .fail_next("post", StubFailure::RateLimited(None), 1)
            .fail_always("post", StubFailure::Failed("down".into()));
        assert!(a.post("x").await.unwrap_err().is_rate_limited());
        assert_eq!(a.post("x").await.unwrap_err().to_string(), "down");
        assert_eq!(a.calls_of("post").len(), 2);
    }

    #[tokio::test]
    async fn canned_decision_answers_poll_prompts_with_json() {
        let d = StubDecision::canned();
        let out = d.generate(r#"Return JSON with "question" and "options""#).await.unwrap();
        assert!(out.starts_with('{'));
        assert_eq!(d.prompts().len(), 1);
    }
}
