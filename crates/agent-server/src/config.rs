use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use agent_core::budget::ModelLimitsRegistry;
use agent_orchestrator::OrchestratorConfig;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise, helpful writing companion.";

/// Gateway settings. Built once at startup and handed to the app state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Required connection token. When unset any non-empty token is accepted.
    pub auth_token: Option<String>,
    pub llm_base_url: String,
    pub model: String,
    pub api_key: String,
    pub system_prompt: Option<String>,
    /// Prompt limit; defaults to the model's context window.
    pub max_prompt_tokens: Option<i64>,
    pub default_reserve: i64,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub preview_delay_ms: u64,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
    pub debug: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8787".to_string(),
            auth_token: None,
            llm_base_url: agent_llm::providers::openai::DEFAULT_BASE_URL.to_string(),
            model: agent_llm::providers::openai::DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_prompt_tokens: None,
            default_reserve: 800,
            temperature: 0.3,
            request_timeout_secs: 90,
            preview_delay_ms: 300,
            heartbeat_interval_secs: 15,
            client_timeout_secs: 45,
            debug: false,
        }
    }
}

impl GatewayConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn effective_max_prompt_tokens(&self) -> i64 {
        self.max_prompt_tokens.unwrap_or_else(|| {
            i64::from(
                ModelLimitsRegistry::new()
                    .get_or_default(&self.model)
                    .max_context_tokens,
            )
        })
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            model: self.model.clone(),
            max_prompt_tokens: self.effective_max_prompt_tokens(),
            default_reserve: self.default_reserve,
            temperature: self.temperature,
            max_output_tokens: u32::try_from(self.default_reserve).ok().filter(|n| *n > 0),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            preview_delay: Duration::from_millis(self.preview_delay_ms),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn defaults_match_deepseek_setup() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8787");
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.llm_base_url, "https://api.deepseek.com/v1");
        assert_eq!(config.effective_max_prompt_tokens(), 64_000);

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.request_timeout, Duration::from_secs(90));
        assert_eq!(orchestrator.preview_delay, Duration::from_millis(300));
        assert_eq!(orchestrator.max_output_tokens, Some(800));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"model": "gpt-4o", "auth_token": "secret", "max_prompt_tokens": 2000}}"#
        )
        .unwrap();

        let config = GatewayConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.effective_max_prompt_tokens(), 2000);
        assert_eq!(config.heartbeat_interval_secs, 15);
    }

    #[test]
    fn unreadable_or_invalid_file_is_an_error() {
        assert!(GatewayConfig::load(Some(Path::new("/definitely/not/here.json"))).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let error = GatewayConfig::load(Some(file.path())).unwrap_err();
        assert!(error.to_string().contains("failed to parse"));
    }
}
