use std::time::Duration;

use thiserror::Error;

use agent_core::budget::BudgetError;
use agent_core::protocol::error_code;
use agent_llm::LLMError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request {0} is already running")]
    DuplicateRequest(String),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error("provider error: {0}")]
    Provider(#[from] LLMError),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool failed: {0}")]
    ToolFailed(String),

    #[error("request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("client connection closed: {0}")]
    SinkClosed(String),
}

impl OrchestratorError {
    /// Wire code reported in `agent/error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::BadRequest(_) => error_code::BAD_REQUEST,
            OrchestratorError::DuplicateRequest(_) => error_code::DUPLICATE_REQUEST,
            OrchestratorError::Budget(BudgetError::InvalidConfig { .. }) => error_code::CONFIG_ERROR,
            OrchestratorError::Budget(BudgetError::Exhausted { .. }) => error_code::BUDGET_ERROR,
            OrchestratorError::Provider(_) => error_code::LLM_ERROR,
            OrchestratorError::UnknownTool(_) => error_code::UNKNOWN_TOOL,
            OrchestratorError::ToolFailed(_) => error_code::TOOL_FAILED,
            OrchestratorError::TimedOut(_) => error_code::LLM_TIMEOUT,
            OrchestratorError::Cancelled | OrchestratorError::SinkClosed(_) => "cancelled",
        }
    }

    /// Whether the client should see an error frame for this outcome.
    pub fn is_reportable(&self) -> bool {
        !matches!(
            self,
            OrchestratorError::Cancelled | OrchestratorError::SinkClosed(_)
        )
    }
}
