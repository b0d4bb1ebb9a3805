//! Generation transport contract (§6.1): a model-agnostic streaming
//! interface the agentic loop consumes.

mod bridge;
mod openai;

pub use bridge::{parse_transcript, ROLE_HEADERS};
pub use openai::OpenAiTransport;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ImageInput {
    pub mime_type: String,
    pub base64: String,
}

/// Fixed option shape passed to every `generate`/`generate_stream` call.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub server_name: Option<String>,
    pub agent_id: Option<String>,
    pub system_prompt: Option<String>,
    pub images: Vec<ImageInput>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub content: String,
    pub usage: Option<Usage>,
}

/// One tagged event from a streaming generation. `ToolCall`/`ToolCallUpdate`
/// are only meaningful when the loop runs in `agent_manages_tools` mode
/// against a transport with native tool-calling support.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Delta { text: String },
    ToolCall { id: String, name: String, arguments: String },
    ToolCallUpdate { id: String, arguments_delta: String },
    Complete { usage: Option<Usage> },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(String),
    #[error("transport returned an unparseable response: {0}")]
    Decode(String),
}

/// A lazy, cancellable sequence of tagged events terminated by exactly one
/// terminal event (`Complete`) per call — the §9 redesign away from
/// callback-threaded streaming.
pub type EventStream<'a> = BoxStream<'a, Result<StreamEvent, TransportError>>;

#[async_trait]
pub trait GenerationTransport: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<GenerateResult, TransportError>;

    async fn generate_stream<'a>(
        &'a self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<EventStream<'a>, TransportError>;
}
