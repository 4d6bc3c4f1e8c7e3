use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// A fragment of a streamed tool call, as the provider sent it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LLMChunk {
    Token(String),
    ToolCalls(Vec<ToolCallDelta>),
    /// Trailing metadata: finish reason and usage, when the provider reports them.
    Finish {
        model: Option<String>,
        reason: Option<String>,
        usage: Option<TokenUsage>,
    },
    Done,
}

/// What a finished (or cancelled) stream produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamResult {
    pub text: String,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    /// Fragments passed to the delta handler
    pub deltas: usize,
    /// The stream stopped because cancellation was requested
    pub cancelled: bool,
}
