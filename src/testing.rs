//! Mock implementations for testing
//!
//! These mocks drive the turn engine and the controllers without network I/O.

use crate::llm::{
    Arguments, ChatChunk, ChatRequest, ChatResponse, ChatStream, GenerateChunk, GenerateRequest,
    GenerateStream, LlmError, Message, ModelGateway, ModelInfo, ToolCall, ToolDefinition, Usage,
};
use crate::tools::{ToolExecutor, ToolOutput, ToolSet};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;

// ============================================================================
// Mock Model Gateway
// ============================================================================

/// One scripted backend reply
pub enum Scripted {
    /// A complete assistant message; streamed as content, tool-call and done chunks
    Message(Message),
    /// Exact chunk sequence for `chat_stream`
    Chunks(Vec<Result<ChatChunk, LlmError>>),
    /// Fail the request
    Error(LlmError),
}

/// Gateway that answers from a queue of scripted replies
pub struct MockGateway {
    replies: Mutex<VecDeque<Scripted>>,
    /// Reply used once the queue is empty
    fallback: Option<Message>,
    /// Record of all chat requests made
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every unscripted request with `text`
    pub fn with_fallback_text(mut self, text: &str) -> Self {
        self.fallback = Some(Message::assistant(text));
        self
    }

    pub fn queue(&self, reply: Scripted) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn queue_text(&self, text: &str) {
        self.queue(Scripted::Message(Message::assistant(text)));
    }

    pub fn queue_tool_calls(&self, content: &str, calls: Vec<ToolCall>) {
        self.queue(Scripted::Message(Message::assistant_with_tools(content, calls)));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.queue(Scripted::Error(error));
    }

    /// Get recorded chat requests
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn chat_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    fn next(&self) -> Scripted {
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            self.fallback.clone().map_or_else(
                || Scripted::Error(LlmError::network("No mock response queued")),
                Scripted::Message,
            )
        })
    }
}

fn message_chunks(message: &Message) -> Vec<Result<ChatChunk, LlmError>> {
    let mut chunks = Vec::new();
    let content: Vec<char> = message.content().chars().collect();
    let (head, tail) = content.split_at(content.len() / 2);
    for part in [head, tail] {
        if !part.is_empty() {
            chunks.push(Ok(ChatChunk::text(part.iter().collect::<String>())));
        }
    }
    for call in message.tool_calls() {
        chunks.push(Ok(ChatChunk::tool_calls(vec![call.clone()])));
    }
    chunks.push(Ok(ChatChunk::done()));
    chunks
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(vec![ModelInfo {
            name: "mock-model".to_string(),
            size: 0,
            modified_at: None,
        }])
    }

    async fn generate(&self, _request: &GenerateRequest) -> Result<String, LlmError> {
        match self.next() {
            Scripted::Message(message) => Ok(message.content().to_string()),
            Scripted::Chunks(_) => Err(LlmError::unknown("chunks scripted for generate")),
            Scripted::Error(e) => Err(e),
        }
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<GenerateStream, LlmError> {
        let text = self.generate(request).await?;
        let chunks = vec![
            Ok(GenerateChunk {
                response: text,
                ..GenerateChunk::default()
            }),
            Ok(GenerateChunk {
                done: true,
                ..GenerateChunk::default()
            }),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.next() {
            Scripted::Message(message) => Ok(ChatResponse {
                message,
                usage: Usage::default(),
            }),
            Scripted::Chunks(_) => Err(LlmError::unknown("chunks scripted for a non-streamed chat")),
            Scripted::Error(e) => Err(e),
        }
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = match self.next() {
            Scripted::Message(message) => message_chunks(&message),
            Scripted::Chunks(chunks) => chunks,
            Scripted::Error(e) => return Err(e),
        };
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

// ============================================================================
// Recording Tool Executor
// ============================================================================

/// Tool executor that records calls instead of running them
pub struct RecordingExecutor {
    set: ToolSet,
    outputs: HashMap<String, String>,
    /// Record of tool executions
    pub executions: Mutex<Vec<(String, Arguments)>>,
}

impl RecordingExecutor {
    pub fn new(set: ToolSet) -> Self {
        Self {
            set,
            outputs: HashMap::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Answer calls to `name` with `output`
    pub fn with_output(mut self, name: &str, output: &str) -> Self {
        self.outputs.insert(name.to_string(), output.to_string());
        self
    }

    pub fn recorded_executions(&self) -> Vec<(String, Arguments)> {
        self.executions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(&self, name: &str, arguments: &Arguments) -> ToolOutput {
        self.executions
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        ToolOutput::success(
            self.outputs
                .get(name)
                .cloned()
                .unwrap_or_else(|| format!("{name} ok")),
        )
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.set.definitions()
    }
}

/// `end_conversation` call as the model would emit it
pub fn end_call() -> ToolCall {
    ToolCall::from_json("end_conversation", json!({"reason": "done talking"}))
}

// ============================================================================
// Log Capture
// ============================================================================

/// Formatted log output collected in memory
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// Route this thread's JSON log output into memory until the guard drops
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}
