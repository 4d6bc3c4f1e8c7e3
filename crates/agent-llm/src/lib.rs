pub mod provider;
pub mod providers;
pub mod stream;
pub mod types;

pub use provider::{LLMError, LLMProvider, LLMStream, Result, StreamOptions};
pub use providers::OpenAIProvider;
pub use stream::{consume_stream, stream_completion, DeltaHandler};
pub use types::{LLMChunk, StreamResult, TokenUsage, ToolCallDelta};
