use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use agent_core::protocol::ResponseFrame;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("connection closed")]
    Closed,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound half of a client connection. Implementations serialize writes,
/// so concurrent runs never interleave partial frames.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, frame: ResponseFrame) -> Result<(), SinkError>;
}

/// Sink backed by an mpsc channel; the receiver side owns the transport.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ResponseFrame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ResponseFrame>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResponseFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, frame: ResponseFrame) -> Result<(), SinkError> {
        self.tx.send(frame).await.map_err(|_| SinkError::Closed)
    }
}
