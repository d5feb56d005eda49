// Gemini backend: the capability the HTTP front ends translate onto

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

mod client;
mod types;

pub use client::{GeminiClient, DEFAULT_BASE_URL};
pub use types::{
    Candidate, Content, FinishReason, FunctionCallingConfig, FunctionCallingMode,
    FunctionDeclaration, GenerateContentResponse, GenerationConfig, Part, Schema, SchemaType,
    Tool, ToolConfig, UsageMetadata,
};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode Gemini response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("embedding count mismatch: sent {sent} inputs, received {received} embeddings")]
    EmbeddingCount { sent: usize, received: usize },
}

/// Lazy, finite sequence of partial results. `None` is the "no more results"
/// signal; an `Err` item ends the stream as failed.
pub type ResponseStream = BoxStream<'static, Result<GenerateContentResponse, BackendError>>;

/// A fully translated generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    /// Prior turns, oldest first. Roles are kept as the client sent them.
    pub history: Vec<Content>,
    /// Parts of the final user turn.
    pub input: Vec<Part>,
    pub generation_config: GenerationConfig,
    pub tools: Vec<Tool>,
    pub tool_config: Option<ToolConfig>,
}

/// Backend operations used by the handlers. Shared read-only across requests.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_content(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateContentResponse, BackendError>;

    async fn stream_generate_content(
        &self,
        request: GenerateRequest,
    ) -> Result<ResponseStream, BackendError>;

    /// Embeds every input, returning one vector per input in input order.
    async fn batch_embed_contents(
        &self,
        model: &str,
        inputs: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, BackendError>;
}
