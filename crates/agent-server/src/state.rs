use std::sync::Arc;

use thiserror::Error;

use agent_core::budget::{HeuristicTokenizer, SharedTokenizer};
use agent_core::tools::{GetCurrentTimeTool, ToolCatalog, ToolRegistry};
use agent_core::Session;
use agent_llm::{LLMProvider, OpenAIProvider};
use agent_orchestrator::Orchestrator;

use crate::config::GatewayConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,
}

/// Process-wide collaborators shared by every connection.
pub struct AppState {
    pub config: GatewayConfig,
    pub llm: Arc<dyn LLMProvider>,
    pub tokenizer: SharedTokenizer,
    pub tools: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        log::info!(
            "Creating LLM provider with base URL: {} and model: {}",
            config.llm_base_url,
            config.model
        );
        let llm: Arc<dyn LLMProvider> = Arc::new(
            OpenAIProvider::new(config.api_key.clone())
                .with_base_url(config.llm_base_url.clone())
                .with_model(config.model.clone()),
        );
        Self::with_provider(config, llm)
    }

    pub fn with_provider(config: GatewayConfig, llm: Arc<dyn LLMProvider>) -> Self {
        let tools = Arc::new(ToolRegistry::new());
        if let Err(error) = tools.register(GetCurrentTimeTool) {
            log::error!("Failed to register built-in tool: {}", error);
        }
        log::info!("Tool registry initialized with {} tools", tools.len());

        Self {
            config,
            llm,
            tokenizer: Arc::new(HeuristicTokenizer::default()),
            tools,
        }
    }

    /// Check the connection token against the configured one.
    pub fn authorize(&self, token: Option<&str>) -> Result<(), AuthError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        match &self.config.auth_token {
            Some(expected) if expected != token => Err(AuthError::InvalidToken),
            _ => Ok(()),
        }
    }

    /// A fresh orchestrator for one connection; request ids are scoped to it.
    pub fn orchestrator(&self) -> Orchestrator {
        let catalog: Arc<dyn ToolCatalog> = self.tools.clone();
        Orchestrator::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.tokenizer),
            self.config.orchestrator_config(),
        )
        .with_tools(catalog)
    }

    pub fn new_session(&self) -> Session {
        Session::new(self.config.system_prompt.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(auth_token: Option<&str>) -> AppState {
        AppState::new(GatewayConfig {
            auth_token: auth_token.map(str::to_string),
            ..GatewayConfig::default()
        })
    }

    #[test]
    fn any_token_is_accepted_without_configured_secret() {
        let state = state(None);
        assert_eq!(state.authorize(Some("anything")), Ok(()));
        assert_eq!(state.authorize(Some("  ")), Err(AuthError::MissingToken));
        assert_eq!(state.authorize(None), Err(AuthError::MissingToken));
    }

    #[test]
    fn configured_secret_must_match() {
        let state = state(Some("s3cret"));
        assert_eq!(state.authorize(Some("s3cret")), Ok(()));
        assert_eq!(state.authorize(Some("guess")), Err(AuthError::InvalidToken));
    }

    #[test]
    fn builtin_tools_and_prompt_are_wired() {
        let state = state(None);
        assert_eq!(state.tools.list_tools()[0].name, "get_current_time");
        assert_eq!(
            state.new_session().system_prompt.as_deref(),
            Some(crate::config::DEFAULT_SYSTEM_PROMPT)
        );
        assert_eq!(state.orchestrator().config().model, "deepseek-chat");
    }
}
