//! Request and stream-chunk shapes of the OpenAI chat completions API, which
//! DeepSeek and most hosted gateways accept unchanged.

use agent_core::{tools::ToolDef, Message};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::{Result, StreamOptions};
use crate::types::{LLMChunk, TokenUsage, ToolCallDelta};

pub fn messages_to_openai_compat_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| json!({ "role": m.role, "content": m.content }))
        .collect()
}

pub fn tools_to_openai_compat_json(tools: &[ToolDef]) -> Vec<Value> {
    tools.iter().map(ToolDef::to_function_schema).collect()
}

/// Build a streaming chat request body.
pub fn build_openai_compat_body(model: &str, messages: &[Message], options: &StreamOptions) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages_to_openai_compat_json(messages),
        "stream": true,
    });

    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }

    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    if !options.tools.is_empty() {
        body["tools"] = json!(tools_to_openai_compat_json(&options.tools));
    }

    body
}

#[derive(Debug, Deserialize)]
pub struct OpenAICompatStreamChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    #[serde(default)]
    delta: OpenAICompatDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAICompatToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<OpenAICompatFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// Convert one stream chunk, in order: tool-call fragments, content, then
/// finish metadata. A chunk with nothing to report yields no chunks.
pub fn parse_openai_compat_chunk(chunk: OpenAICompatStreamChunk) -> Vec<LLMChunk> {
    let mut out = Vec::new();
    let choice = chunk.choices.into_iter().next();

    if let Some(choice) = &choice {
        if let Some(tool_calls) = &choice.delta.tool_calls {
            let calls: Vec<ToolCallDelta> = tool_calls
                .iter()
                .map(|tc| ToolCallDelta {
                    index: tc.index,
                    id: tc.id.clone(),
                    name: tc.function.as_ref().and_then(|f| f.name.clone()),
                    arguments: tc.function.as_ref().and_then(|f| f.arguments.clone()),
                })
                .collect();
            if !calls.is_empty() {
                out.push(LLMChunk::ToolCalls(calls));
            }
        }

        if let Some(content) = &choice.delta.content {
            if !content.is_empty() {
                out.push(LLMChunk::Token(content.clone()));
            }
        }
    }

    let reason = choice.and_then(|c| c.finish_reason);
    if reason.is_some() || chunk.usage.is_some() {
        out.push(LLMChunk::Finish {
            model: chunk.model,
            reason,
            usage: chunk.usage,
        });
    }

    out
}

/// Parse one SSE `data:` payload. `[DONE]` ends the stream; invalid JSON is an error.
pub fn parse_openai_compat_sse_data(data: &str) -> Result<Vec<LLMChunk>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data == "[DONE]" {
        return Ok(vec![LLMChunk::Done]);
    }

    let chunk: OpenAICompatStreamChunk = serde_json::from_str(data)?;
    Ok(parse_openai_compat_chunk(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_generation_options() {
        let options = StreamOptions {
            temperature: Some(0.3),
            max_tokens: Some(800),
            ..Default::default()
        };
        let body = build_openai_compat_body(
            "deepseek-chat",
            &[Message::system("be brief"), Message::user("Hello")],
            &options,
        );

        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 800);
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn body_includes_tools_as_functions() {
        let tool = ToolDef {
            name: "get_current_time".to_string(),
            title: String::new(),
            description: "time".to_string(),
            input_schema: json!({"type": "object"}),
            output_schema: None,
        };
        let options = StreamOptions::default().with_tools(vec![tool]);
        let body = build_openai_compat_body("gpt-4o", &[Message::user("time?")], &options);

        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_current_time");
    }

    #[test]
    fn parses_content_finish_and_done() {
        let token = parse_openai_compat_sse_data(
            r#"{"model":"deepseek-chat","choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(token, vec![LLMChunk::Token("Hi".to_string())]);

        let finish = parse_openai_compat_sse_data(
            r#"{"model":"deepseek-chat","choices":[{"delta":{"content":""},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":2,"total_tokens":7}}"#,
        )
        .unwrap();
        assert_eq!(
            finish,
            vec![LLMChunk::Finish {
                model: Some("deepseek-chat".to_string()),
                reason: Some("stop".to_string()),
                usage: Some(TokenUsage {
                    prompt_tokens: 5,
                    completion_tokens: 2,
                    total_tokens: 7
                }),
            }]
        );

        assert_eq!(parse_openai_compat_sse_data(" [DONE] ").unwrap(), vec![LLMChunk::Done]);
        assert!(parse_openai_compat_sse_data("").unwrap().is_empty());
    }

    #[test]
    fn role_only_chunk_is_skipped() {
        let chunk =
            parse_openai_compat_sse_data(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert!(chunk.is_empty());
    }

    #[test]
    fn content_and_finish_in_one_chunk_keep_both() {
        let chunks = parse_openai_compat_sse_data(
            r#"{"model":"deepseek-chat","choices":[{"delta":{"content":"Bye."},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#,
        )
        .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], LLMChunk::Token("Bye.".to_string()));
        match &chunks[1] {
            LLMChunk::Finish { model, reason, usage } => {
                assert_eq!(model.as_deref(), Some("deepseek-chat"));
                assert_eq!(reason.as_deref(), Some("stop"));
                assert_eq!(usage.as_ref().map(|u| u.total_tokens), Some(4));
            }
            other => panic!("expected finish, got {other:?}"),
        }
    }

    #[test]
    fn parses_tool_call_fragments() {
        let chunk = parse_openai_compat_sse_data(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_current_time","arguments":"{}"}}]}}]}"#,
        )
        .unwrap();

        assert_eq!(
            chunk,
            vec![LLMChunk::ToolCalls(vec![ToolCallDelta {
                index: 0,
                id: Some("call_1".to_string()),
                name: Some("get_current_time".to_string()),
                arguments: Some("{}".to_string()),
            }])]
        );
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_openai_compat_sse_data("{oops").is_err());
    }
}
