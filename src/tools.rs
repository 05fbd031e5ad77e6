//! Tool registry and dispatcher
//!
//! Tools are a closed set ([`ToolName`]). A call is validated against the
//! static schema, decoded into a typed [`ToolInput`] and matched exhaustively.
//! Every outcome, including validation failures, is plain text for the model.

mod edit;
mod file_ops;
mod input;
mod sandbox;
mod schema;
mod weather;
mod web;

pub use input::{ToolInput, ToolInputError};
pub use sandbox::Sandbox;
pub use schema::{ToolName, ToolSet};

use crate::llm::{Arguments, ToolDefinition};
use crate::memory::MemoryStore;
use async_trait::async_trait;
use serde::Serialize;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// Executes tool calls on behalf of the turn engine
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one call. Never fails: errors are reported in the output text.
    async fn execute(&self, name: &str, arguments: &Arguments) -> ToolOutput;

    /// Definitions offered to the model
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Whether `end_conversation` is offered, so the engine should answer it
    fn offers_end_conversation(&self) -> bool {
        self.definitions()
            .iter()
            .any(|d| d.name == ToolName::EndConversation.as_str())
    }
}

/// Per-persona resources the tools act on
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub sandbox: Sandbox,
    pub memory: MemoryStore,
    pub http: reqwest::Client,
}

impl ToolContext {
    pub fn new(sandbox: Sandbox, memory: MemoryStore) -> Self {
        Self {
            sandbox,
            memory,
            http: http_client(USER_AGENT),
        }
    }
}

const USER_AGENT: &str = concat!("persona-agent/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the web tools; a builder failure falls back to the
/// default client
fn http_client(user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, user_agent, "Failed to build HTTP client, using defaults");
            reqwest::Client::default()
        })
}

/// Dispatches calls within one [`ToolSet`]
pub struct ToolDispatcher {
    ctx: ToolContext,
    set: ToolSet,
}

impl ToolDispatcher {
    pub fn new(ctx: ToolContext, set: ToolSet) -> Self {
        Self { ctx, set }
    }

    /// Validate and run one tool call
    pub async fn dispatch(&self, name: &str, arguments: &Arguments) -> ToolOutput {
        let input = match ToolName::from_name(name)
            .filter(|tool| self.set.contains(*tool))
            .ok_or_else(|| ToolInputError::Unknown(name.to_string()))
            .and_then(|tool| ToolInput::parse(tool, arguments))
        {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Rejected tool call");
                return ToolOutput::error(e.to_string());
            }
        };

        let start = std::time::Instant::now();
        let output = self.run(input).await;
        tracing::debug!(
            tool = %name,
            success = output.success,
            duration_ms = %start.elapsed().as_millis(),
            "Tool executed"
        );
        output
    }

    async fn run(&self, input: ToolInput) -> ToolOutput {
        let sandbox = &self.ctx.sandbox;
        match input {
            ToolInput::ReadFile(i) => file_ops::read_file(sandbox, i).await,
            ToolInput::WriteFile(i) => file_ops::write_file(sandbox, i).await,
            ToolInput::AppendFile(i) => file_ops::append_file(sandbox, i).await,
            ToolInput::EditFile(i) => file_ops::edit_file(sandbox, i).await,
            ToolInput::DeleteFile(i) => file_ops::delete_file(sandbox, &i.path).await,
            ToolInput::ListFiles(i) => file_ops::list_files(sandbox, &i.path).await,
            ToolInput::Mkdir(i) => file_ops::mkdir(sandbox, &i.path).await,
            ToolInput::GrepFile(i) => file_ops::grep_file(sandbox, i).await,
            ToolInput::FileInfo(i) => file_ops::file_info(sandbox, &i.path).await,
            ToolInput::ReadMemory(i) => match self.ctx.memory.read_named(&i.category) {
                Ok(content) => ToolOutput::success(content),
                Err(e) => ToolOutput::error(e.to_string()),
            },
            ToolInput::UpdateMemory(i) => {
                match self.ctx.memory.update(&i.category, &i.content, &i.mode) {
                    Ok(status) => ToolOutput::success(status),
                    Err(e) => ToolOutput::error(e.to_string()),
                }
            }
            ToolInput::WebSearch(i) => web::web_search(&self.ctx.http, i).await,
            ToolInput::WebFetch(i) => web::web_fetch(&self.ctx.http, &i.url).await,
            ToolInput::HttpRequest(i) => web::http_request(&self.ctx.http, i).await,
            ToolInput::GetWeather(i) => ToolOutput::success(weather::get_weather(&i.city)),
            ToolInput::EndConversation(i) => end_conversation_ack(i.reason.as_deref()),
        }
    }
}

#[async_trait]
impl ToolExecutor for ToolDispatcher {
    async fn execute(&self, name: &str, arguments: &Arguments) -> ToolOutput {
        self.dispatch(name, arguments).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.set.definitions()
    }
}

/// Fixed acknowledgement for an end-of-conversation request
pub fn end_conversation_ack(reason: Option<&str>) -> ToolOutput {
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    match reason {
        Some(reason) => ToolOutput::success(format!(
            "You asked to end the conversation. Reason: {reason}"
        )),
        None => ToolOutput::success("You asked to end the conversation."),
    }
}
