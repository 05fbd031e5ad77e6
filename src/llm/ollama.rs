//! Ollama HTTP gateway
//!
//! Streaming endpoints answer with newline-delimited JSON; a line carrying an
//! `error` key terminates the stream with that error.

use super::types::{
    ChatRequest, ChatResponse, GenerateChunk, GenerateRequest, Message, ModelInfo, ToolDefinition,
    Usage,
};
use super::{ChatStream, GenerateStream, LlmError, ModelGateway};
use crate::config::OllamaConfig;
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

/// Client for a local or remote Ollama server
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<Response, LlmError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, LlmError> {
        let response = self.post(path, body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| LlmError::decode(format!("Failed to parse response: {e} - body: {text}")))
    }
}

#[async_trait]
impl ModelGateway for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::decode(format!("Failed to parse model list: {e}")))?;
        Ok(tags.models)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let body = WireGenerateRequest::new(request, false);
        let chunk: GenerateChunk = self.post_json("/api/generate", &body).await?;
        Ok(chunk.response)
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<GenerateStream, LlmError> {
        let body = WireGenerateRequest::new(request, true);
        let response = self.post("/api/generate", &body).await?;
        Ok(decode_ndjson(byte_stream(response)))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = WireChatRequest::new(request, false);
        let wire: WireChatResponse = self.post_json("/api/chat", &body).await?;
        Ok(ChatResponse {
            message: wire.message,
            usage: Usage {
                input_tokens: wire.prompt_eval_count,
                output_tokens: wire.eval_count,
            },
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, LlmError> {
        let body = WireChatRequest::new(request, true);
        let response = self.post("/api/chat", &body).await?;
        Ok(decode_ndjson(byte_stream(response)))
    }
}

fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        LlmError::network(format!("Connection failed: {e}"))
    } else {
        LlmError::unknown(format!("Request failed: {e}"))
    }
}

async fn check_status(response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |e| e.error);
    Err(LlmError::from_status(status.as_u16(), &message))
}

fn byte_stream(response: Response) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
    response.bytes_stream().map_err(std::io::Error::other)
}

/// Split a byte stream into lines and decode each non-blank line as `T`
fn decode_ndjson<S, T>(bytes: S) -> Pin<Box<dyn Stream<Item = Result<T, LlmError>> + Send>>
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    T: DeserializeOwned + Send + 'static,
{
    let lines = FramedRead::new(StreamReader::new(bytes), LinesCodec::new());
    Box::pin(lines.filter_map(|line| async move {
        match line {
            Err(e) => Some(Err(LlmError::network(format!("Stream interrupted: {e}")))),
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(parse_line(&line)),
        }
    }))
}

fn parse_line<T: DeserializeOwned>(line: &str) -> Result<T, LlmError> {
    match serde_json::from_str::<StreamLine<T>>(line) {
        Ok(StreamLine::Failure { error }) => Err(LlmError::server_error(error)),
        Ok(StreamLine::Chunk(chunk)) => Ok(chunk),
        Err(e) => Err(LlmError::decode(format!("Malformed stream line: {e} - line: {line}"))),
    }
}

// Wire types

#[derive(Deserialize)]
#[serde(untagged)]
enum StreamLine<T> {
    Failure { error: String },
    Chunk(T),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a Map<String, Value>>,
}

impl<'a> WireChatRequest<'a> {
    fn new(request: &'a ChatRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            stream,
            think: request.think,
            options: request.options.as_ref(),
        }
    }
}

#[derive(Deserialize)]
struct WireChatResponse {
    message: Message,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Serialize)]
struct WireGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

impl<'a> WireGenerateRequest<'a> {
    fn new(request: &'a GenerateRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            prompt: &request.prompt,
            stream,
            think: request.think,
        }
    }
}
