/// The LLM seam: a prompt goes in, the model's text answer comes out.
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("LLM API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode LLM response: {0}")]
    Decode(String),

    #[error("chat completion response is empty")]
    Empty,

    #[error("request cancelled")]
    Cancelled,
}

/// Anything that can answer a single-turn chat prompt.
///
/// Implementations must be callable from many tasks at once; the pipelines
/// share one instance across every job.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}
