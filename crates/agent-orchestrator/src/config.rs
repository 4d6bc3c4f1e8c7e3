use std::time::Duration;

use agent_core::budget::ModelLimitsRegistry;

pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_RESERVE: i64 = 800;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_PREVIEW_DELAY: Duration = Duration::from_millis(300);

/// Per-request limits and generation settings, shared by every run of one
/// orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub model: String,
    pub max_prompt_tokens: i64,
    /// Response reserve used when a request does not carry one
    pub default_reserve: i64,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    /// Hard upper bound on one run, provider streaming included
    pub request_timeout: Duration,
    /// How long a run waits for a sentence end before previewing anyway
    pub preview_delay: Duration,
}

impl OrchestratorConfig {
    /// Defaults for `model`, with the prompt limit taken from its context window.
    pub fn for_model(model: impl Into<String>) -> Self {
        let model = model.into();
        let limit = ModelLimitsRegistry::new().get_or_default(&model);
        Self {
            max_prompt_tokens: i64::from(limit.max_context_tokens),
            model,
            default_reserve: DEFAULT_RESERVE,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: Some(DEFAULT_RESERVE as u32),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            preview_delay: DEFAULT_PREVIEW_DELAY,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::for_model(DEFAULT_MODEL)
    }
}
