// src/bootstrap.rs
//! Wires config into a ready `JobRouter`: state store, clock, capabilities
//! (live adapters or mock stubs), gates and retrier.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::capabilities::mock::{StubAction, StubDecision, StubScraper};
use crate::capabilities::openai::OpenAiDecision;
use crate::capabilities::scraper::HttpScraper;
use crate::capabilities::x_api::XApiClient;
use crate::capabilities::{DecisionCapability, PostRef};
use crate::clock::{Clock, SystemClock};
use crate::config::{is_mock_mode, AutopilotConfig, StateBackend, StateConfig};
use crate::dedup::DedupTracker;
use crate::error::{CapResult, CapabilityError};
use crate::gates::{DailyGate, QuotaTracker, ThrottleGate};
use crate::jobs::{ActionDispatcher, Capabilities, DispatchSettings, GateSet, JobRouter};
use crate::retry::{RateLimitRetrier, Sleeper, TokioSleeper};
use crate::store::{FileStore, MemoryStore, StateStore};

pub const QUOTA_KEY: &str = "quota:periodic-post";
pub const THROTTLE_KEY: &str = "throttle:reply-to-mentions";
pub const DAILY_POLL_KEY: &str = "daily:post-poll";

const MOCK_USER_ID: &str = "mock-user";

/// Stands in for the decision capability when `ai.enabled = false`.
pub struct DisabledDecision;

#[async_trait]
impl DecisionCapability for DisabledDecision {
    async fn generate(&self, _prompt: &str) -> CapResult<String> {
        Err(CapabilityError::Failed(anyhow!("AI is disabled in config")))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

pub fn build_store(cfg: &StateConfig) -> Arc<dyn StateStore> {
    match cfg.backend {
        StateBackend::Memory => Arc::new(MemoryStore::new()),
        StateBackend::File => Arc::new(FileStore::new(cfg.dir.clone())),
    }
}

/// Deterministic capabilities for `AI_TEST_MODE=mock`: a few mentions and
/// trends, a fixed headline page, and a canned decision responder.
pub fn mock_capabilities() -> Capabilities {
    let mention = |id: &str, handle: &str, text: &str| PostRef {
        id: id.to_string(),
        text: text.to_string(),
        author_id: format!("{handle}-id"),
        author_handle: Some(handle.to_string()),
    };
    let action = StubAction::new()
        .with_mentions(vec![
            mention("mock-mention-1", "alice", "What do you think about Bitcoin today?"),
            mention("mock-mention-2", "bob", "Any AI news worth reading?"),
        ])
        .with_trends(["#Bitcoin", "#AI", "#MondayMotivation"])
        .with_search_results(
            "#Bitcoin",
            vec![mention("mock-hit-1", "carol", "Bitcoin just broke another record")],
        );
    Capabilities {
        action: Arc::new(action),
        decision: Arc::new(StubDecision::canned()),
        scraper: Arc::new(StubScraper::returning([
            "Bitcoin ETF inflows hit a weekly high",
            "Ethereum developers schedule the next upgrade",
            "Regulators publish new stablecoin guidance",
        ])),
    }
}

/// Live adapters. Resolves "ENV" secrets in `cfg` first.
pub fn live_capabilities(cfg: &mut AutopilotConfig) -> Result<Capabilities> {
    cfg.resolve_secrets().context("resolving secrets")?;
    info!(
        target: "capability",
        provider = %cfg.ai.provider,
        ai_enabled = cfg.ai.enabled,
        key_len = cfg.ai.api_key.len(),
        "capabilities configured"
    );

    let action = XApiClient::new(&cfg.x, cfg.search.results_per_trend)?;
    let decision: Arc<dyn DecisionCapability> = if cfg.ai.enabled {
        Arc::new(OpenAiDecision::new(&cfg.ai)?)
    } else {
        warn!(target: "capability", "AI disabled in config; generation jobs will fail");
        Arc::new(DisabledDecision)
    };
    let scraper = HttpScraper::new(Duration::from_secs(cfg.scrape.timeout_secs.max(1)))?;

    Ok(Capabilities {
        action: Arc::new(action),
        decision,
        scraper: Arc::new(scraper),
    })
}

/// Assemble a router from explicit parts. Tests pass stubs, a `ManualClock`
/// and a `RecordingSleeper` here.
pub fn assemble(
    cfg: &AutopilotConfig,
    caps: Capabilities,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
) -> Result<JobRouter> {
    let gates = GateSet {
        quota: QuotaTracker::new(
            store.clone(),
            clock.clone(),
            QUOTA_KEY,
            cfg.quota.daily_post_limit,
        ),
        mention_throttle: ThrottleGate::new(store.clone(), clock.clone(), THROTTLE_KEY),
        poll_gate: DailyGate::new(store, clock.clone(), DAILY_POLL_KEY, cfg.daily.offset()?),
    };
    let capacity = Some(cfg.scrape.dedup_capacity);
    let dispatcher = ActionDispatcher::new(
        caps,
        gates,
        DispatchSettings::from_config(cfg),
        RateLimitRetrier::new(cfg.retry.policy(), sleeper),
        DedupTracker::new(capacity, clock.clone()),
        DedupTracker::new(capacity, clock),
    );
    Ok(JobRouter::new(dispatcher))
}

/// Full bootstrap from a loaded config, honouring `AI_TEST_MODE=mock`.
pub fn from_config(mut cfg: AutopilotConfig) -> Result<JobRouter> {
    let caps = if is_mock_mode() {
        info!(target: "capability", "AI_TEST_MODE=mock: using stub capabilities");
        if cfg.x.user_id.trim().eq_ignore_ascii_case("env") {
            cfg.x.user_id = MOCK_USER_ID.to_string();
        }
        mock_capabilities()
    } else {
        live_capabilities(&mut cfg)?
    };
    let store = build_store(&cfg.state);
    info!(target: "gates", backend = store.name(), "state store ready");
    assemble(&cfg, caps, store, Arc::new(SystemClock), Arc::new(TokioSleeper))
}
