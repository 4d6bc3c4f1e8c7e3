//! Wire frames exchanged with the interactive client.
//!
//! Every frame is a JSON object tagged by `type`. Inbound frames are decoded
//! one at a time; a frame that fails to decode is dropped by the gateway.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::agent::{Message, Role};

pub mod frame_type {
    pub const RUN: &str = "agent/run";
    pub const CANCEL: &str = "agent/cancel";
    pub const RESET: &str = "agent/reset";
    pub const SYSTEM: &str = "agent/system";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    pub const PREVIEW_DELTA: &str = "agent/preview.delta";
    pub const FULL_DELTA: &str = "agent/full.delta";
    pub const DONE: &str = "agent/done";
    pub const ERROR: &str = "agent/error";
    pub const TOOLS_CALL_DELTA: &str = "tools/call.delta";
    pub const TOOLS_CALL_RESULT: &str = "tools/call.result";
    pub const TOOLS_LIST_RESULT: &str = "tools/list.result";
}

/// Machine-readable error codes carried in `agent/error` frames.
pub mod error_code {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const DUPLICATE_REQUEST: &str = "duplicate_request";
    pub const CONFIG_ERROR: &str = "config_error";
    pub const BUDGET_ERROR: &str = "budget_error";
    pub const LLM_ERROR: &str = "llm_error";
    pub const LLM_TIMEOUT: &str = "llm_timeout";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const TOOL_FAILED: &str = "tool_failed";
    pub const INVALID_TOKEN: &str = "invalid_token";
}

/// Client -> gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub id: String,
    /// Legacy single-turn input.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub intent: String,
    /// Tokens to keep free for the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve: Option<i64>,
    #[serde(default)]
    pub allow_tools: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub confirm_token: String,
}

impl RequestFrame {
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn run(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            frame_type: frame_type::RUN.to_string(),
            id: id.into(),
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn cancel(id: impl Into<String>) -> Self {
        Self {
            frame_type: frame_type::CANCEL.to_string(),
            id: id.into(),
            ..Default::default()
        }
    }

    /// The user turn of a run: `question` when given, else the last user
    /// entry of `messages`.
    pub fn user_turn(&self) -> Option<&str> {
        let question = self.question.trim();
        if !question.is_empty() {
            return Some(self.question.as_str());
        }
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User && !m.content.trim().is_empty())
            .map(|m| m.content.as_str())
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(|value| value.as_str())
    }
}

/// Gateway -> client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seq: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(rename = "code", default, skip_serializing_if = "String::is_empty")]
    pub error_code: String,
    #[serde(rename = "message", default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub confirm_token: String,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl ResponseFrame {
    fn new(frame_type: &str, id: &str) -> Self {
        Self {
            frame_type: frame_type.to_string(),
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn preview(id: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::new(frame_type::PREVIEW_DELTA, id)
        }
    }

    pub fn full(id: &str, seq: u64, text: impl Into<String>) -> Self {
        Self {
            seq,
            text: text.into(),
            ..Self::new(frame_type::FULL_DELTA, id)
        }
    }

    pub fn done(id: &str) -> Self {
        Self::new(frame_type::DONE, id)
    }

    pub fn error(id: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            error_code: code.to_string(),
            error_message: message.into(),
            ..Self::new(frame_type::ERROR, id)
        }
    }

    pub fn with_result(
        frame_type: &str,
        id: &str,
        result: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            result: Some(result),
            ..Self::new(frame_type, id)
        }
    }

    pub fn with_confirm_token(mut self, token: impl Into<String>) -> Self {
        self.confirm_token = token.into();
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.frame_type == frame_type::DONE || self.frame_type == frame_type::ERROR
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
