//! Callback-driven consumption of an [`LLMStream`].
//!
//! The handler sees every non-empty text fragment in arrival order.
//! Cancellation and a clean end of stream both return the text gathered so
//! far; stream failures and handler refusals return an error.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use agent_core::Message;

use crate::provider::{LLMProvider, LLMStream, Result, StreamOptions};
use crate::types::{LLMChunk, StreamResult, ToolCallDelta};

#[async_trait]
pub trait DeltaHandler: Send {
    /// Called once per non-empty fragment. An error abandons the stream and
    /// becomes the result of the call.
    async fn on_delta(&mut self, delta: &str) -> Result<()>;

    async fn on_tool_calls(&mut self, _calls: &[ToolCallDelta]) -> Result<()> {
        Ok(())
    }
}

/// Open a stream on `provider` and drive it to completion.
pub async fn stream_completion<H>(
    provider: &dyn LLMProvider,
    messages: &[Message],
    options: &StreamOptions,
    cancel_token: &CancellationToken,
    handler: &mut H,
) -> Result<StreamResult>
where
    H: DeltaHandler + ?Sized,
{
    let stream = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {
            return Ok(StreamResult {
                cancelled: true,
                ..Default::default()
            });
        }
        opened = provider.chat_stream(messages, options) => opened?,
    };

    let mut result = consume_stream(stream, cancel_token, handler).await?;
    if result.model.is_none() {
        result.model = Some(
            options
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
        );
    }
    Ok(result)
}

pub async fn consume_stream<H>(
    mut stream: LLMStream,
    cancel_token: &CancellationToken,
    handler: &mut H,
) -> Result<StreamResult>
where
    H: DeltaHandler + ?Sized,
{
    let mut result = StreamResult::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                result.cancelled = true;
                break;
            }
            next = stream.next() => next,
        };

        let Some(chunk) = next else {
            break;
        };

        match chunk? {
            LLMChunk::Token(token) => {
                if token.is_empty() {
                    continue;
                }
                result.text.push_str(&token);
                result.deltas += 1;
                handler.on_delta(&token).await?;
            }
            LLMChunk::ToolCalls(calls) => {
                if !calls.is_empty() {
                    handler.on_tool_calls(&calls).await?;
                }
            }
            LLMChunk::Finish {
                model,
                reason,
                usage,
            } => {
                if model.is_some() {
                    result.model = model;
                }
                if reason.is_some() {
                    result.finish_reason = reason;
                }
                if usage.is_some() {
                    result.usage = usage;
                }
            }
            LLMChunk::Done => break,
        }
    }

    Ok(result)
}
