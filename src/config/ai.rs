// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_temperature() -> f32 {
    0.8
}
fn default_max_tokens() -> u32 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Only "openai" is wired today (case-insensitive).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            api_base: default_api_base(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AiConfig {
    /// Normalise provider, resolve an "ENV" key, clamp sampling params.
    pub fn resolve(&mut self) -> anyhow::Result<()> {
        self.provider = self.provider.to_lowercase();
        if self.provider != "openai" {
            anyhow::bail!("Unsupported AI provider in config: {}", self.provider);
        }

        if self.enabled && self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?;
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_key_is_resolved_and_missing_key_errors() {
        env::remove_var("OPENAI_API_KEY");
        let mut cfg = AiConfig::default();
        assert!(cfg.resolve().is_err());

        env::set_var("OPENAI_API_KEY", "sk-test");
        let mut cfg = AiConfig::default();
        cfg.resolve().unwrap();
        assert_eq!(cfg.api_key, "sk-test");
        env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    fn out_of_range_sampling_params_fall_back() {
        let mut cfg = AiConfig {
            enabled: false,
            provider: "OpenAI".into(),
            temperature: 9.0,
            max_tokens: 0,
            ..AiConfig::default()
        };
        cfg.resolve().unwrap();
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.temperature, 0.8);
        assert_eq!(cfg.max_tokens, 200);
    }
}
