use crate::types::LLMChunk;
use agent_core::{tools::ToolDef, Message};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),

    /// The delta consumer refused a fragment and the stream was abandoned.
    #[error("Stream aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMChunk>> + Send>>;

/// Per-call generation options.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Overrides the provider's default model when set
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Tool definitions offered to the model
    pub tools: Vec<ToolDef>,
}

impl StreamOptions {
    pub fn with_tools(mut self, tools: Vec<ToolDef>) -> Self {
        self.tools = tools;
        self
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Start a streaming chat completion.
    async fn chat_stream(&self, messages: &[Message], options: &StreamOptions) -> Result<LLMStream>;

    /// Model used when the options do not name one.
    fn default_model(&self) -> &str;
}
