// src/config/mod.rs
//! Runtime configuration.
//!
//! Loaded from TOML:
//! 1) $AUTOPILOT_CONFIG_PATH
//! 2) config/autopilot.toml
//! 3) built-in defaults
//!
//! Secrets written as the literal "ENV" are read from the environment
//! (`X_BEARER_TOKEN`, `X_USER_ID`, `OPENAI_API_KEY`).

pub mod ai;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::parse::POLL_OPTION_COUNT;
use crate::retry::RetryPolicy;
use crate::topics;

pub use ai::AiConfig;

pub const ENV_CONFIG_PATH: &str = "AUTOPILOT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/autopilot.toml";
/// `AI_TEST_MODE=mock` swaps every capability for a deterministic stub.
pub const ENV_TEST_MODE: &str = "AI_TEST_MODE";

pub fn is_mock_mode() -> bool {
    std::env::var(ENV_TEST_MODE)
        .map(|v| v.eq_ignore_ascii_case("mock"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    pub quota: QuotaConfig,
    pub throttle: ThrottleConfig,
    pub daily: DailyConfig,
    pub retry: RetryConfig,
    pub topics: TopicsConfig,
    pub scrape: ScrapeConfig,
    pub poll: PollConfig,
    pub search: SearchConfig,
    pub x: XConfig,
    pub ai: AiConfig,
    pub state: StateConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub daily_post_limit: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_post_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub mention_interval_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            mention_interval_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyConfig {
    /// Reference zone for "today", as a whole-hour offset from UTC.
    pub utc_offset_hours: i32,
}

impl DailyConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("daily.utc_offset_hours out of range: {}", self.utc_offset_hours))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 120_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.backoff_multiplier,
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub prioritized: Vec<String>,
    pub general: Vec<String>,
    /// Focus topics the trend filter matches against.
    pub focus: Vec<String>,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            prioritized: topics::default_prioritized(),
            general: topics::default_general(),
            focus: topics::default_focus(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Most headlines fed into one synthesized post.
    pub max_headlines: usize,
    /// Seen-headline memory size; 0 = unbounded.
    pub dedup_capacity: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: "https://www.cointelegraph.com".to_string(),
            timeout_secs: 60,
            max_headlines: 10,
            dedup_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub question: String,
    pub options: Vec<String>,
    pub duration_minutes: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            question: "What is your favorite cryptocurrency?".to_string(),
            options: ["Bitcoin", "Ethereum", "Dogecoin", "Other"]
                .into_iter()
                .map(String::from)
                .collect(),
            duration_minutes: 1440,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub results_per_trend: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_per_trend: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XConfig {
    pub api_base: String,
    /// OAuth 2.0 user-context token, or "ENV" for X_BEARER_TOKEN.
    pub bearer_token: String,
    /// The bot's own account id, or "ENV" for X_USER_ID.
    pub user_id: String,
    /// Where-On-Earth id for trends (1 = worldwide).
    pub trends_woeid: u32,
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com".to_string(),
            bearer_token: "ENV".to_string(),
            user_id: "ENV".to_string(),
            trends_woeid: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub backend: StateBackend,
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::File,
            dir: PathBuf::from("state"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
}

fn resolve_env(field: &mut String, var: &str) -> Result<()> {
    if field.trim().eq_ignore_ascii_case("env") {
        *field = std::env::var(var).map_err(|_| anyhow!("Missing {var} env var"))?;
    }
    Ok(())
}

impl AutopilotConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parsing autopilot config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Env path, then the default path, then built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }

    /// Structural checks that do not depend on the environment.
    pub fn validate(&self) -> Result<()> {
        if self.poll.options.len() != POLL_OPTION_COUNT {
            bail!(
                "poll.options must hold exactly {POLL_OPTION_COUNT} entries, got {}",
                self.poll.options.len()
            );
        }
        if self.poll.question.trim().is_empty() {
            bail!("poll.question is empty");
        }
        self.daily.offset()?;
        if self.scrape.url.trim().is_empty() {
            bail!("scrape.url is empty");
        }
        Ok(())
    }

    /// Resolve "ENV" secrets for the live adapters. Not needed in mock mode.
    pub fn resolve_secrets(&mut self) -> Result<()> {
        resolve_env(&mut self.x.bearer_token, "X_BEARER_TOKEN")?;
        resolve_env(&mut self.x.user_id, "X_USER_ID")?;
        self.ai.resolve()
    }

    pub fn mention_interval(&self) -> Duration {
        Duration::from_secs(self.throttle.mention_interval_secs)
    }
}
