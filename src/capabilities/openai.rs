// src/capabilities/openai.rs
//! Decision capability over the OpenAI Chat Completions API.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{retry_after_from_headers, DecisionCapability};
use crate::config::ai::AiConfig;
use crate::error::{CapResult, CapabilityError};

const SYSTEM_PROMPT: &str = "You write for a tech-focused social media account \
(AI, DAO, blockchain, crypto). Answer with exactly what was asked for and nothing \
else: no preamble, no surrounding quotes. Posts stay under 280 characters.";

pub struct OpenAiDecision {
    http: Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiDecision {
    pub fn new(cfg: &AiConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("social-autopilot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building OpenAI http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl DecisionCapability for OpenAiDecision {
    async fn generate(&self, prompt: &str) -> CapResult<String> {
        if self.api_key.is_empty() {
            return Err(anyhow!("OpenAI api key is empty").into());
        }
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("generate: request failed")?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after_from_headers(resp.headers(), chrono::Utc::now().timestamp());
            return Err(CapabilityError::rate_limited(wait));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(anyhow!("generate: HTTP {status}: {snippet}").into());
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| CapabilityError::malformed(format!("generate: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CapabilityError::malformed("generate: no content in completion"))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
