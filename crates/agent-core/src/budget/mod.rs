//! Token budget management for outgoing prompts.
//!
//! - [`tokenizer`]: approximate, per-model token counting and truncation
//! - [`clip`]: fitting a conversation into a prompt budget
//! - [`limits`]: model context window registry
//! - [`types`]: budget errors and clipping results

pub mod clip;
pub mod limits;
pub mod tokenizer;
pub mod types;

pub use clip::{clip_messages, ContextBudgeter};
pub use limits::{ModelLimit, ModelLimitsRegistry};
pub use tokenizer::{
    Encoding, HeuristicTokenizer, SharedTokenizer, Tokenizer, ELLIPSIS, MESSAGE_OVERHEAD_TOKENS,
};
pub use types::{BudgetError, ClippedContext, TokenUsageBreakdown};
