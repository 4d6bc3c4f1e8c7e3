pub mod config;
pub mod error;
pub mod orchestrator;
pub mod preview;
pub mod registry;
pub mod sink;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use preview::PreviewGate;
pub use registry::{ActiveRequestGuard, CancellationRegistry};
pub use sink::{ChannelSink, FrameSink, SinkError};
