//! Core types for token budget management.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::types::Message;

/// Result of clipping a conversation to a prompt budget.
#[derive(Debug, Clone)]
pub struct ClippedContext {
    /// Messages to send, in chronological order
    pub messages: Vec<Message>,
    /// Token accounting for the clipped messages
    pub token_usage: TokenUsageBreakdown,
    /// Number of input messages left out entirely
    pub messages_dropped: usize,
    /// Whether one message was cut short
    pub truncation_occurred: bool,
}

impl ClippedContext {
    pub fn was_clipped(&self) -> bool {
        self.messages_dropped > 0 || self.truncation_occurred
    }
}

/// Detailed token usage breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsageBreakdown {
    /// Tokens used by the leading system message
    pub system_tokens: u32,
    /// Tokens used by the retained conversation window
    pub window_tokens: u32,
    /// Total tokens in the clipped context
    pub total_tokens: u32,
    /// Prompt budget after the response reserve
    pub budget_limit: u32,
}

impl TokenUsageBreakdown {
    /// Calculate percentage of budget used.
    pub fn usage_percentage(&self) -> f64 {
        if self.budget_limit == 0 {
            return 0.0;
        }
        (self.total_tokens as f64 / self.budget_limit as f64) * 100.0
    }
}

/// Errors that can occur during budget management.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    /// The prompt limit itself is unusable
    #[error("max prompt tokens must be positive, got {max_prompt_tokens}")]
    InvalidConfig { max_prompt_tokens: i64 },

    /// Nothing is left for the prompt once the response reserve is taken,
    /// or too little to carry even a truncated system message.
    #[error("no prompt budget left: max prompt tokens {max_prompt_tokens}, response reserve {reserve}")]
    Exhausted { max_prompt_tokens: i64, reserve: i64 },
}
