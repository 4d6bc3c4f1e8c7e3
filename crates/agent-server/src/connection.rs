//! One client connection: the read loop, frame dispatch, session ownership
//! and the heartbeat.
//!
//! The read loop is the only place the [`Session`] is touched. Runs execute
//! as their own tasks against a snapshot of it and hand finished exchanges
//! back over a channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_ws::{Message, ProtocolError};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::protocol::{frame_type, RequestFrame};
use agent_core::Session;
use agent_orchestrator::{Orchestrator, RunOutcome};

use crate::config::GatewayConfig;
use crate::logging::Timer;
use crate::writer::Outbound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            client_timeout: config.client_timeout(),
        }
    }
}

/// Time since the client last sent anything, pongs included.
struct Liveness {
    started: Instant,
    last_seen_ms: AtomicU64,
}

impl Liveness {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_seen_ms.store(now, Ordering::Relaxed);
    }

    fn idle(&self) -> Duration {
        let now = self.started.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_seen_ms.load(Ordering::Relaxed)))
    }
}

pub struct Connection<O: Outbound + 'static> {
    orchestrator: Arc<Orchestrator>,
    outbound: Arc<O>,
    session: Session,
    token: CancellationToken,
    completed_tx: mpsc::UnboundedSender<RunOutcome>,
    completed_rx: mpsc::UnboundedReceiver<RunOutcome>,
}

impl<O: Outbound + 'static> Connection<O> {
    pub fn new(orchestrator: Orchestrator, session: Session, outbound: Arc<O>) -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator: Arc::new(orchestrator),
            outbound,
            session,
            token: CancellationToken::new(),
            completed_tx,
            completed_rx,
        }
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Run until the client goes away, the transport fails or the heartbeat
    /// gives up. Every run started on this connection is cancelled on exit.
    pub async fn serve<S>(mut self, inbound: S, settings: ConnectionSettings)
    where
        S: Stream<Item = Result<Message, ProtocolError>>,
    {
        let mut inbound = std::pin::pin!(inbound);
        let liveness = Arc::new(Liveness::new());
        actix_web::rt::spawn(heartbeat(
            Arc::clone(&self.outbound),
            Arc::clone(&liveness),
            settings,
            self.token.clone(),
        ));

        log::info!("Client connected");

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                Some(outcome) = self.completed_rx.recv() => self.record(outcome),
                incoming = inbound.next() => {
                    let message = match incoming {
                        Some(Ok(message)) => message,
                        Some(Err(error)) => {
                            log::warn!("WebSocket protocol error: {}", error);
                            break;
                        }
                        None => break,
                    };
                    liveness.touch();
                    if !self.handle_message(message).await {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Text(text) => self.dispatch(&text),
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => self.dispatch(text),
                Err(error) => log::warn!("Dropping non-UTF-8 binary frame: {}", error),
            },
            Message::Ping(payload) => return self.outbound.pong(&payload).await.is_ok(),
            Message::Pong(_) | Message::Nop => {}
            Message::Continuation(_) => log::warn!("Dropping fragmented frame"),
            Message::Close(reason) => {
                log::info!("Client closed connection: {:?}", reason);
                return false;
            }
        }
        true
    }

    fn dispatch(&mut self, raw: &str) {
        let frame = match RequestFrame::decode(raw) {
            Ok(frame) => frame,
            Err(error) => {
                log::warn!("Dropping malformed frame: {}", error);
                return;
            }
        };

        let kind = frame.frame_type.clone();
        match kind.as_str() {
            frame_type::RUN => self.spawn_run(frame),
            frame_type::CANCEL => {
                self.orchestrator.cancel(&frame.id);
            }
            frame_type::RESET => {
                self.session.reset();
                log::info!("[{}] Session reset", frame.id);
            }
            frame_type::SYSTEM => {
                self.session.set_system_prompt(Some(frame.question));
                log::info!(
                    "[{}] System prompt {}",
                    frame.id,
                    if self.session.system_prompt.is_some() { "updated" } else { "cleared" }
                );
            }
            frame_type::TOOLS_LIST => {
                let orchestrator = Arc::clone(&self.orchestrator);
                let outbound = Arc::clone(&self.outbound);
                actix_web::rt::spawn(async move {
                    if let Err(error) = orchestrator.list_tools(&frame, outbound.as_ref()).await {
                        log::debug!("[{}] tools/list failed: {}", frame.id, error);
                    }
                });
            }
            frame_type::TOOLS_CALL => {
                let orchestrator = Arc::clone(&self.orchestrator);
                let outbound = Arc::clone(&self.outbound);
                actix_web::rt::spawn(async move {
                    let timer = Timer::new(format!("tool call {}", frame.id));
                    if let Err(error) = orchestrator.call_tool(&frame, outbound.as_ref()).await {
                        log::debug!("[{}] tools/call failed: {}", frame.id, error);
                    }
                    timer.debug(&frame.id);
                });
            }
            other => log::warn!("[{}] Dropping frame with unknown type '{}'", frame.id, other),
        }
    }

    fn spawn_run(&self, frame: RequestFrame) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let outbound = Arc::clone(&self.outbound);
        let snapshot = self.session.clone();
        let completed = self.completed_tx.clone();

        log::info!("[{}] Run requested", frame.id);
        // Claim the id here so a cancel already queued behind this frame finds it.
        let claim = orchestrator.begin(&frame, &self.token);
        actix_web::rt::spawn(async move {
            let timer = Timer::new(format!("run {}", frame.id));
            match orchestrator
                .run_claimed(claim, &frame, &snapshot, outbound.as_ref())
                .await
            {
                Ok(outcome) => {
                    timer.debug(&outcome.id);
                    let _ = completed.send(outcome);
                }
                Err(error) => log::debug!("[{}] Run ended: {}", frame.id, error),
            }
        });
    }

    fn record(&mut self, outcome: RunOutcome) {
        if self.session.record_exchange(outcome.user_turn, outcome.answer) {
            log::debug!(
                "[{}] History now holds {} messages",
                outcome.id,
                self.session.history.len()
            );
        }
    }

    async fn shutdown(self) {
        self.token.cancel();
        let cancelled = self.orchestrator.cancel_all();
        if cancelled > 0 {
            log::info!("Cancelled {} in-flight runs on disconnect", cancelled);
        }
        self.outbound.close().await;
        log::info!("Client disconnected");
    }
}

async fn heartbeat<O: Outbound + 'static>(
    outbound: Arc<O>,
    liveness: Arc<Liveness>,
    settings: ConnectionSettings,
    token: CancellationToken,
) {
    let start = tokio::time::Instant::now() + settings.heartbeat_interval;
    let mut ticker = tokio::time::interval_at(start, settings.heartbeat_interval);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let idle = liveness.idle();
                if idle > settings.client_timeout {
                    log::info!("Closing connection idle for {:?}", idle);
                    token.cancel();
                    break;
                }
                if outbound.ping().await.is_err() {
                    log::debug!("Heartbeat ping failed; closing connection");
                    token.cancel();
                    break;
                }
            }
        }
    }
}
