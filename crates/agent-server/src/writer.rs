//! Serialized outbound writes for one WebSocket connection.

use async_trait::async_trait;
use tokio::sync::Mutex;

use agent_core::protocol::ResponseFrame;
use agent_orchestrator::{FrameSink, SinkError};

/// Everything the connection loop writes: frames plus transport control.
#[async_trait]
pub trait Outbound: FrameSink {
    async fn ping(&self) -> Result<(), SinkError>;
    async fn pong(&self, payload: &[u8]) -> Result<(), SinkError>;
    async fn close(&self);
}

/// Owns the actix-ws session behind one lock, so runs and the heartbeat
/// never write concurrently. Once a write fails the session is dropped and
/// every later write reports [`SinkError::Closed`].
pub struct WsOutbound {
    session: Mutex<Option<actix_ws::Session>>,
}

impl WsOutbound {
    pub fn new(session: actix_ws::Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl FrameSink for WsOutbound {
    async fn send(&self, frame: ResponseFrame) -> Result<(), SinkError> {
        let payload = frame.encode()?;
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(SinkError::Closed)?;
        if session.text(payload).await.is_err() {
            *guard = None;
            return Err(SinkError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Outbound for WsOutbound {
    async fn ping(&self) -> Result<(), SinkError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(SinkError::Closed)?;
        if session.ping(b"ping").await.is_err() {
            *guard = None;
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    async fn pong(&self, payload: &[u8]) -> Result<(), SinkError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(SinkError::Closed)?;
        if session.pong(payload).await.is_err() {
            *guard = None;
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    async fn close(&self) {
        if let Some(session) = self.session.lock().await.take() {
            let _ = session.close(None).await;
        }
    }
}
