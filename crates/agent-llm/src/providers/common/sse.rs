//! Shared SSE -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Response;

use crate::provider::{LLMError, LLMStream, Result};
use crate::types::LLMChunk;

fn to_stream_error(err: LLMError) -> LLMError {
    match err {
        LLMError::Stream(msg) => LLMError::Stream(msg),
        other => LLMError::Stream(other.to_string()),
    }
}

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// `handler` receives the event name and data payload of each event and
/// returns the chunks to emit for it (`None` or an empty list skips the
/// event), or an error that surfaces as [`LLMError::Stream`].
pub fn llm_stream_from_sse<H, I>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str, &str) -> Result<I> + Send + 'static,
    I: IntoIterator<Item = LLMChunk> + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .flat_map(move |event| {
            let chunks: Vec<Result<LLMChunk>> = match event
                .map_err(|e| LLMError::Stream(e.to_string()))
                .and_then(|event| {
                    handler(event.event.as_str(), event.data.as_str()).map_err(to_stream_error)
                }) {
                Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(err)],
            };
            futures::stream::iter(chunks)
        });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sse_response(body: &'static str) -> (MockServer, Response) {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/sse", mock_server.uri()))
            .send()
            .await
            .expect("response");
        (mock_server, response)
    }

    #[tokio::test]
    async fn skips_events_the_handler_filters_out() {
        let (_server, response) =
            sse_response("event: token\ndata: hello\n\nevent: token\ndata: skip\n\n").await;

        let mut stream = llm_stream_from_sse(response, |event, data| {
            if data == "skip" {
                return Ok(None);
            }
            Ok(Some(LLMChunk::Token(format!("{event}:{data}"))))
        });

        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.expect("chunk"));
        }

        assert_eq!(out, vec![LLMChunk::Token("token:hello".to_string())]);
    }

    #[tokio::test]
    async fn handler_errors_become_stream_errors() {
        let (_server, response) = sse_response("data: boom\n\n").await;

        let mut stream =
            llm_stream_from_sse(response, |_event, _data| {
                Err::<Option<LLMChunk>, _>(LLMError::Api("boom".to_string()))
            });

        match stream.next().await {
            Some(Err(LLMError::Stream(msg))) => assert!(msg.contains("API error")),
            other => panic!("expected LLMError::Stream, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_event_may_yield_several_chunks() {
        let (_server, response) = sse_response("data: pair\n\n").await;

        let mut stream = llm_stream_from_sse(response, |_event, data| {
            Ok(vec![
                LLMChunk::Token(data.to_string()),
                LLMChunk::Finish {
                    model: None,
                    reason: Some("stop".to_string()),
                    usage: None,
                },
            ])
        });

        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.expect("chunk"));
        }

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], LLMChunk::Token("pair".to_string()));
        assert!(matches!(out[1], LLMChunk::Finish { .. }));
    }
}
