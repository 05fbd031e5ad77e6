//! Model gateway abstraction
//!
//! The orchestration core talks to the language-model backend only through
//! [`ModelGateway`]. The production implementation is [`OllamaClient`].

mod error;
mod ollama;
mod types;

pub use error::LlmError;
#[cfg(test)]
pub use error::LlmErrorKind;
pub use ollama::OllamaClient;
pub use types::*;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Lazily produced chat response fragments, terminated by end-of-stream
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>>;

/// Lazily produced generate response fragments
pub type GenerateStream = Pin<Box<dyn Stream<Item = Result<GenerateChunk, LlmError>> + Send>>;

/// Request/response and streaming operations against a model backend
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Models installed on the backend
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;

    /// Single-prompt completion
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError>;

    /// Single-prompt completion, streamed
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<GenerateStream, LlmError>;

    /// Chat completion over a message history
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Chat completion, streamed as partial message fragments
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, LlmError>;
}

/// Logging wrapper for model gateways
pub struct LoggingGateway {
    inner: Arc<dyn ModelGateway>,
}

impl LoggingGateway {
    pub fn new(inner: Arc<dyn ModelGateway>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ModelGateway for LoggingGateway {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let result = self.inner.list_models().await;
        match &result {
            Ok(models) => tracing::debug!(count = models.len(), "Listed models"),
            Err(e) => tracing::error!(error = %e.message, kind = ?e.kind, "Listing models failed"),
        }
        result
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let start = Instant::now();
        let result = self.inner.generate(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => tracing::info!(
                model = %request.model,
                duration_ms = %duration.as_millis(),
                chars = text.len(),
                "Generate request completed"
            ),
            Err(e) => tracing::error!(
                model = %request.model,
                duration_ms = %duration.as_millis(),
                error = %e.message,
                kind = ?e.kind,
                "Generate request failed"
            ),
        }
        result
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<GenerateStream, LlmError> {
        let start = Instant::now();
        let stream = match self.inner.generate_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(model = %request.model, error = %e.message, kind = ?e.kind, "Generate stream failed to open");
                return Err(e);
            }
        };

        let model = request.model.clone();
        Ok(Box::pin(stream.inspect(move |item| match item {
            Ok(chunk) if chunk.done => tracing::info!(
                model = %model,
                duration_ms = %start.elapsed().as_millis(),
                input_tokens = chunk.prompt_eval_count,
                output_tokens = chunk.eval_count,
                "Generate stream completed"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(
                model = %model,
                duration_ms = %start.elapsed().as_millis(),
                error = %e.message,
                kind = ?e.kind,
                "Generate stream failed"
            ),
        })))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let start = Instant::now();
        let result = self.inner.chat(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    tool_calls = response.message.tool_calls().len(),
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Chat request failed"
                );
            }
        }

        result
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, LlmError> {
        let start = Instant::now();
        let stream = match self.inner.chat_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    error = %e.message,
                    kind = ?e.kind,
                    "Chat stream failed to open"
                );
                return Err(e);
            }
        };
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            last_role = request.messages.last().map_or("none", Message::role),
            "Chat stream opened"
        );

        let model = request.model.clone();
        Ok(Box::pin(stream.inspect(move |item| match item {
            Ok(chunk) if chunk.done => tracing::info!(
                model = %model,
                duration_ms = %start.elapsed().as_millis(),
                input_tokens = chunk.prompt_eval_count,
                output_tokens = chunk.eval_count,
                "Chat stream completed"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(
                model = %model,
                duration_ms = %start.elapsed().as_millis(),
                error = %e.message,
                kind = ?e.kind,
                "Chat stream failed"
            ),
        })))
    }
}
