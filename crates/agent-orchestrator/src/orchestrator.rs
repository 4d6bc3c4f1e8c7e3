use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use agent_core::budget::{ContextBudgeter, SharedTokenizer, TokenUsageBreakdown};
use agent_core::protocol::{frame_type, RequestFrame, ResponseFrame};
use agent_core::tools::{ToolArguments, ToolCallResult, ToolCatalog, ToolError};
use agent_core::Session;
use agent_llm::{stream_completion, DeltaHandler, LLMError, LLMProvider, StreamOptions, StreamResult, ToolCallDelta};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::preview::PreviewGate;
use crate::registry::{ActiveRequestGuard, CancellationRegistry};
use crate::sink::FrameSink;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// A run that reached `agent/done`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub id: String,
    pub user_turn: String,
    pub answer: String,
    pub prompt_usage: TokenUsageBreakdown,
    pub stream: StreamResult,
}

/// Drives runs for one connection: prompt assembly, clipping, streaming,
/// frame emission and cancellation.
pub struct Orchestrator {
    llm: Arc<dyn LLMProvider>,
    budgeter: ContextBudgeter,
    tools: Option<Arc<dyn ToolCatalog>>,
    config: OrchestratorConfig,
    active: Arc<CancellationRegistry>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LLMProvider>, tokenizer: SharedTokenizer, config: OrchestratorConfig) -> Self {
        Self {
            llm,
            budgeter: ContextBudgeter::new(tokenizer, config.model.clone()),
            tools: None,
            config,
            active: Arc::new(CancellationRegistry::new()),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolCatalog>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.is_active(id.trim())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Stop the run registered under `id`. A miss is not an error: the run
    /// may already have finished.
    pub fn cancel(&self, id: &str) -> bool {
        let id = id.trim();
        let cancelled = self.active.cancel(id);
        if cancelled {
            log::info!("[{}] Run cancelled by client", id);
        } else {
            log::debug!("[{}] Cancel for inactive run ignored", id);
        }
        cancelled
    }

    pub fn cancel_all(&self) -> usize {
        self.active.cancel_all()
    }

    /// Claim `request.id` and register its cancel token under `parent`.
    ///
    /// Callers that run the request on another task call this before
    /// spawning it, so a cancel queued right behind the run finds it.
    pub fn begin(&self, request: &RequestFrame, parent: &CancellationToken) -> Result<ActiveRequestGuard> {
        let id = request.id.trim();
        if id.is_empty() {
            return Err(OrchestratorError::BadRequest("missing request id".to_string()));
        }
        self.active.register(id, parent.child_token()).ok_or_else(|| {
            log::warn!("[{}] Rejected run: id already active", id);
            OrchestratorError::DuplicateRequest(id.to_string())
        })
    }

    /// Execute one `agent/run` request against a snapshot of the session.
    ///
    /// Emits preview/full frames while streaming, then exactly one terminal
    /// frame unless the run was cancelled or the client went away.
    pub async fn run(
        &self,
        request: &RequestFrame,
        session: &Session,
        sink: &dyn FrameSink,
        parent: &CancellationToken,
    ) -> Result<RunOutcome> {
        let claim = self.begin(request, parent);
        self.run_claimed(claim, request, session, sink).await
    }

    /// Second half of [`Orchestrator::run`] for a request already passed
    /// through [`Orchestrator::begin`]. A failed claim is reported here.
    pub async fn run_claimed(
        &self,
        claim: Result<ActiveRequestGuard>,
        request: &RequestFrame,
        session: &Session,
        sink: &dyn FrameSink,
    ) -> Result<RunOutcome> {
        let guard = match claim {
            Ok(guard) => guard,
            Err(error) => return Err(self.report(request.id.trim(), sink, error).await),
        };
        let id = guard.id();
        let token = guard.token().clone();

        let started = Instant::now();
        let work = self.execute(id, request, session, sink, &token, started);
        let result = match tokio::time::timeout(self.config.request_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                log::warn!(
                    "[{}] Run timed out after {:?}",
                    id,
                    self.config.request_timeout
                );
                Err(OrchestratorError::TimedOut(self.config.request_timeout))
            }
        };

        match result {
            Ok(outcome) => {
                log::info!(
                    "[{}] Run completed in {:?}: {} deltas, {} chars",
                    id,
                    started.elapsed(),
                    outcome.stream.deltas,
                    outcome.answer.len()
                );
                Ok(outcome)
            }
            Err(error) => Err(self.report(id, sink, error).await),
        }
    }

    async fn execute(
        &self,
        id: &str,
        request: &RequestFrame,
        session: &Session,
        sink: &dyn FrameSink,
        token: &CancellationToken,
        started: Instant,
    ) -> Result<RunOutcome> {
        let user_turn = request
            .user_turn()
            .ok_or_else(|| OrchestratorError::BadRequest("run has no user turn".to_string()))?
            .to_string();

        let messages = if request.messages.is_empty() {
            session.build_messages(&user_turn)
        } else {
            session.build_messages_from(&request.messages, &user_turn)
        };

        let reserve = request.reserve.unwrap_or(self.config.default_reserve);
        let clipped = self
            .budgeter
            .clip(&messages, self.config.max_prompt_tokens, reserve)?;
        if clipped.was_clipped() {
            log::info!(
                "[{}] Prompt clipped: dropped {} messages, truncated: {}, {} / {} tokens",
                id,
                clipped.messages_dropped,
                clipped.truncation_occurred,
                clipped.token_usage.total_tokens,
                clipped.token_usage.budget_limit
            );
        }

        let mut options = StreamOptions {
            model: Some(self.config.model.clone()),
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_output_tokens,
            tools: Vec::new(),
        };
        if request.allow_tools {
            if let Some(tools) = &self.tools {
                options = options.with_tools(tools.list_tools());
            }
        }

        let mut emitter = FrameEmitter {
            id,
            sink,
            preview: PreviewGate::starting_at(started, self.config.preview_delay),
            seq: 0,
        };

        log::debug!(
            "[{}] Streaming {} messages ({} tokens)",
            id,
            clipped.messages.len(),
            clipped.token_usage.total_tokens
        );

        let stream = match stream_completion(
            self.llm.as_ref(),
            &clipped.messages,
            &options,
            token,
            &mut emitter,
        )
        .await
        {
            Ok(stream) => stream,
            Err(LLMError::Aborted(reason)) => return Err(OrchestratorError::SinkClosed(reason)),
            Err(_) if token.is_cancelled() => return Err(OrchestratorError::Cancelled),
            Err(error) => return Err(error.into()),
        };

        if stream.cancelled || token.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        sink.send(ResponseFrame::done(id))
            .await
            .map_err(|error| OrchestratorError::SinkClosed(error.to_string()))?;

        Ok(RunOutcome {
            id: id.to_string(),
            user_turn,
            answer: stream.text.clone(),
            prompt_usage: clipped.token_usage,
            stream,
        })
    }

    /// Answer a `tools/list` request.
    pub async fn list_tools(&self, request: &RequestFrame, sink: &dyn FrameSink) -> Result<()> {
        let tools = self
            .tools
            .as_ref()
            .map(|catalog| catalog.list_tools())
            .unwrap_or_default();

        let mut result = serde_json::Map::new();
        result.insert(
            "tools".to_string(),
            serde_json::to_value(&tools).unwrap_or_default(),
        );

        let frame = ResponseFrame::with_result(frame_type::TOOLS_LIST_RESULT, &request.id, result)
            .with_confirm_token(request.confirm_token.clone());
        sink.send(frame)
            .await
            .map_err(|error| OrchestratorError::SinkClosed(error.to_string()))
    }

    /// Answer a `tools/call` request. The tool name and arguments travel in
    /// `context.name` and `context.arguments`.
    pub async fn call_tool(&self, request: &RequestFrame, sink: &dyn FrameSink) -> Result<ToolCallResult> {
        match self.invoke_tool(request).await {
            Ok(result) => {
                let frame = ResponseFrame::with_result(
                    frame_type::TOOLS_CALL_RESULT,
                    &request.id,
                    result.to_json_map(),
                )
                .with_confirm_token(request.confirm_token.clone());
                sink.send(frame)
                    .await
                    .map_err(|error| OrchestratorError::SinkClosed(error.to_string()))?;
                Ok(result)
            }
            Err(error) => Err(self.report(&request.id, sink, error).await),
        }
    }

    async fn invoke_tool(&self, request: &RequestFrame) -> Result<ToolCallResult> {
        let name = request
            .context_str("name")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| OrchestratorError::BadRequest("tools/call needs context.name".to_string()))?;

        let args = match request.context.get("arguments") {
            None | Some(serde_json::Value::Null) => ToolArguments::new(),
            Some(serde_json::Value::Object(map)) => map.clone(),
            Some(serde_json::Value::String(raw)) if raw.trim().is_empty() => ToolArguments::new(),
            Some(serde_json::Value::String(raw)) => serde_json::from_str(raw).map_err(|error| {
                OrchestratorError::BadRequest(format!("invalid tool arguments: {error}"))
            })?,
            Some(_) => {
                return Err(OrchestratorError::BadRequest(
                    "tool arguments must be an object".to_string(),
                ))
            }
        };

        let catalog = self
            .tools
            .as_ref()
            .ok_or_else(|| OrchestratorError::UnknownTool(name.to_string()))?;

        log::info!("[{}] Calling tool '{}'", request.id, name);
        catalog.call_tool(name, args).await.map_err(|error| match error {
            ToolError::NotFound(name) => OrchestratorError::UnknownTool(name),
            ToolError::InvalidArguments(message) => OrchestratorError::BadRequest(message),
            ToolError::Execution(message) => OrchestratorError::ToolFailed(message),
        })
    }

    /// Send the terminal error frame for `error` when the client should see
    /// one, and hand the error back.
    async fn report(&self, id: &str, sink: &dyn FrameSink, error: OrchestratorError) -> OrchestratorError {
        if !error.is_reportable() {
            log::debug!("[{}] Run ended without terminal frame: {}", id, error);
            return error;
        }

        log::warn!("[{}] Run failed ({}): {}", id, error.code(), error);
        if let Err(send_error) = sink
            .send(ResponseFrame::error(id, error.code(), error.to_string()))
            .await
        {
            log::debug!("[{}] Could not deliver error frame: {}", id, send_error);
        }
        error
    }
}

/// Turns provider deltas into preview/full frames for one run.
struct FrameEmitter<'a> {
    id: &'a str,
    sink: &'a dyn FrameSink,
    preview: PreviewGate,
    seq: u64,
}

#[async_trait]
impl<'a> DeltaHandler for FrameEmitter<'a> {
    async fn on_delta(&mut self, delta: &str) -> agent_llm::Result<()> {
        if let Some(text) = self.preview.push(delta) {
            self.sink
                .send(ResponseFrame::preview(self.id, text))
                .await
                .map_err(|error| LLMError::Aborted(error.to_string()))?;
        }

        self.seq += 1;
        self.sink
            .send(ResponseFrame::full(self.id, self.seq, delta))
            .await
            .map_err(|error| LLMError::Aborted(error.to_string()))
    }

    async fn on_tool_calls(&mut self, calls: &[ToolCallDelta]) -> agent_llm::Result<()> {
        for call in calls {
            let result = match serde_json::to_value(call) {
                Ok(serde_json::Value::Object(map)) => map,
                _ => continue,
            };
            self.sink
                .send(ResponseFrame::with_result(
                    frame_type::TOOLS_CALL_DELTA,
                    self.id,
                    result,
                ))
                .await
                .map_err(|error| LLMError::Aborted(error.to_string()))?;
        }
        Ok(())
    }
}
