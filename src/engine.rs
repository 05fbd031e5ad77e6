//! Turn engine
//!
//! Drives one logical turn: send the history to the model, run any requested
//! tool calls in order, fold each result back into the history, and repeat
//! until the model answers without tool calls.

mod observer;

pub use observer::{ConsoleObserver, TurnObserver};
#[cfg(test)]
pub use observer::SilentObserver;

use crate::llm::{
    parse_arguments, Arguments, ChatChunk, ChatRequest, LlmError, Message, ModelGateway, ToolCall,
    ToolCallFragment,
};
use crate::tools::{end_conversation_ack, ToolExecutor, ToolName};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Non-system messages kept from one turn to the next
pub const CONTEXT_TAIL: usize = 9;

/// Per-request model settings
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    pub stream: bool,
    pub think: Option<bool>,
    /// Backend sampling options such as `temperature`
    pub options: Option<Map<String, Value>>,
}

/// A tool call as executed, with the text fed back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedToolCall {
    pub name: String,
    pub arguments: Arguments,
    pub result: String,
}

/// Result of one completed turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Final utterance (the assistant message without tool calls)
    pub content: String,
    /// Every tool call executed during the turn, in order
    pub tool_calls: Vec<ExecutedToolCall>,
}

impl TurnOutcome {
    /// Whether the persona asked to end the conversation during this turn
    pub fn requested_end(&self) -> bool {
        self.tool_calls
            .iter()
            .any(|call| call.name == ToolName::EndConversation.as_str())
    }
}

/// Runs turns against one model with fixed options
pub struct TurnEngine<'a> {
    gateway: &'a dyn ModelGateway,
    observer: &'a dyn TurnObserver,
    model: String,
    options: TurnOptions,
}

impl<'a> TurnEngine<'a> {
    pub fn new(
        gateway: &'a dyn ModelGateway,
        observer: &'a dyn TurnObserver,
        model: impl Into<String>,
        options: TurnOptions,
    ) -> Self {
        Self {
            gateway,
            observer,
            model: model.into(),
            options,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn observer(&self) -> &dyn TurnObserver {
        self.observer
    }

    /// Drive one turn to completion.
    ///
    /// `user_content`, if given, is appended as a user message first. Gateway
    /// failures abort the turn; tool failures become tool message text.
    pub async fn run_turn(
        &self,
        history: &mut Vec<Message>,
        user_content: Option<String>,
        tools: &dyn ToolExecutor,
        label: &str,
    ) -> Result<TurnOutcome, LlmError> {
        if let Some(content) = user_content {
            history.push(Message::user(content));
        }

        let definitions = tools.definitions();
        let answers_end = tools.offers_end_conversation();
        let mut executed = Vec::new();

        loop {
            let request = ChatRequest {
                model: self.model.clone(),
                messages: history.clone(),
                tools: definitions.clone(),
                think: self.options.think,
                options: self.options.options.clone(),
            };

            let message = if self.options.stream {
                self.receive_streamed(&request, label).await?
            } else {
                let response = self.gateway.chat(&request).await?;
                self.observer.on_message(label, &response.message);
                response.message
            };

            let calls = message.tool_calls().to_vec();
            let content = message.content().to_string();
            history.push(message);

            if calls.is_empty() {
                tracing::debug!(label, tool_calls = executed.len(), "Turn completed");
                return Ok(TurnOutcome {
                    content,
                    tool_calls: executed,
                });
            }

            for call in calls {
                self.observer.on_tool_call(&call);
                let output = if answers_end && call.name == ToolName::EndConversation.as_str() {
                    let reason = call.arguments.get("reason").and_then(Value::as_str);
                    end_conversation_ack(reason)
                } else {
                    tools.execute(&call.name, &call.arguments).await
                };
                self.observer.on_tool_result(&call.name, &output);

                history.push(Message::tool(output.output.clone()));
                executed.push(ExecutedToolCall {
                    name: call.name,
                    arguments: call.arguments,
                    result: output.output,
                });
            }
        }
    }

    /// Drain the whole stream, then return the assembled message
    async fn receive_streamed(&self, request: &ChatRequest, label: &str) -> Result<Message, LlmError> {
        let mut stream = self.gateway.chat_stream(request).await?;
        let mut assembler = MessageAssembler::default();
        self.observer.on_stream_start(label);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.message.content.is_empty() {
                self.observer.on_content_delta(&chunk.message.content);
            }
            if let Some(thinking) = chunk.message.thinking.as_deref().filter(|t| !t.is_empty()) {
                self.observer.on_thinking_delta(thinking);
            }
            let done = chunk.done;
            assembler.push(chunk);
            if done {
                break;
            }
        }

        let message = assembler.finish();
        self.observer.on_stream_end(label, &message);
        Ok(message)
    }
}

/// Merges streamed fragments into one assistant message.
///
/// A tool-call fragment carrying an `index` already seen, with an empty or
/// matching name, is merged into that call. Object arguments are added to the
/// call's map; text arguments are joined and parsed once in [`finish`].
/// Any other fragment starts a new call.
///
/// [`finish`]: MessageAssembler::finish
#[derive(Debug, Default)]
pub struct MessageAssembler {
    content: String,
    thinking: String,
    tool_calls: Vec<PendingCall>,
}

/// A tool call still being assembled from stream fragments
#[derive(Debug, Default)]
struct PendingCall {
    name: String,
    index: Option<u32>,
    arguments: Arguments,
    /// Argument text pieces joined in arrival order
    raw: String,
}

impl PendingCall {
    fn absorb(&mut self, fragment: ToolCallFragment) {
        if self.name.is_empty() {
            self.name = fragment.name;
        }
        match fragment.arguments {
            Value::Object(map) => self.arguments.extend(map),
            Value::String(text) => self.raw.push_str(&text),
            Value::Null => {}
            other => tracing::warn!(
                tool = %self.name,
                arguments = %other,
                "Ignoring tool-call arguments that are neither object nor text"
            ),
        }
    }

    fn finish(self) -> ToolCall {
        let mut arguments = self.arguments;
        arguments.extend(parse_arguments(&self.name, &self.raw));
        ToolCall {
            name: self.name,
            arguments,
            index: self.index,
        }
    }
}

impl MessageAssembler {
    pub fn push(&mut self, chunk: ChatChunk) {
        let fragment = chunk.message;
        self.content.push_str(&fragment.content);
        if let Some(thinking) = fragment.thinking {
            self.thinking.push_str(&thinking);
        }
        for call in fragment.tool_calls {
            self.merge_call(call);
        }
    }

    fn merge_call(&mut self, fragment: ToolCallFragment) {
        let slot = fragment.index.and_then(|index| {
            self.tool_calls.iter_mut().find(|existing| {
                existing.index == Some(index)
                    && (fragment.name.is_empty()
                        || existing.name.is_empty()
                        || existing.name == fragment.name)
            })
        });
        match slot {
            Some(existing) => existing.absorb(fragment),
            None => {
                let mut call = PendingCall {
                    index: fragment.index,
                    ..PendingCall::default()
                };
                call.absorb(fragment);
                self.tool_calls.push(call);
            }
        }
    }

    pub fn finish(self) -> Message {
        Message::Assistant {
            content: self.content,
            tool_calls: self.tool_calls.into_iter().map(PendingCall::finish).collect(),
            thinking: (!self.thinking.is_empty()).then_some(self.thinking),
        }
    }
}

/// Fresh history for the next turn: `system_prompt` followed by the last
/// [`CONTEXT_TAIL`] non-system messages of `history`
pub fn rebuild_history(system_prompt: String, history: &[Message]) -> Vec<Message> {
    let tail: Vec<&Message> = history.iter().filter(|m| !m.is_system()).collect();
    let skip = tail.len().saturating_sub(CONTEXT_TAIL);

    let mut rebuilt = Vec::with_capacity(CONTEXT_TAIL + 1);
    rebuilt.push(Message::system(system_prompt));
    rebuilt.extend(tail.into_iter().skip(skip).cloned());
    rebuilt
}
