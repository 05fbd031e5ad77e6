//! Common types for model gateway interactions
//!
//! Messages and tool calls serialize directly to the backend's chat wire
//! format: `{"role": ..., "content": ..., "tool_calls": [{"function": {...}}]}`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Tool-call arguments, keyed by parameter name
pub type Arguments = Map<String, Value>;

/// Message in a conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        #[serde(default)]
        content: String,
    },
    User {
        #[serde(default)]
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(
            default,
            skip_serializing_if = "Vec::is_empty",
            deserialize_with = "null_as_default"
        )]
        tool_calls: Vec<ToolCall>,
        /// Think-mode reasoning channel
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thinking: Option<String>,
    },
    Tool {
        #[serde(default)]
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    #[cfg(test)]
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
            thinking: None,
        }
    }

    #[cfg(test)]
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
            thinking: None,
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
        }
    }

    /// Text content of the message
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content } => content,
        }
    }

    /// Tool calls requested by an assistant message (empty for every other role)
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }

    /// Wire name of the role
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }
}

/// A structured tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireToolCall", into = "WireToolCall")]
pub struct ToolCall {
    pub name: String,
    pub arguments: Arguments,
    /// Position among the calls of one response, when the backend reports it
    pub index: Option<u32>,
}

#[cfg(test)]
impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
            index: None,
        }
    }

    /// Build from a JSON object literal; non-objects yield empty arguments
    pub fn from_json(name: impl Into<String>, arguments: Value) -> Self {
        let name = name.into();
        let arguments = arguments_from_value(&name, arguments);
        Self::new(name, arguments)
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<u32>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl From<WireToolCall> for ToolCall {
    fn from(wire: WireToolCall) -> Self {
        Self {
            arguments: arguments_from_value(&wire.function.name, wire.function.arguments),
            name: wire.function.name,
            index: wire.function.index,
        }
    }
}

impl From<ToolCall> for WireToolCall {
    fn from(call: ToolCall) -> Self {
        Self {
            function: WireFunctionCall {
                index: call.index,
                name: call.name,
                arguments: Value::Object(call.arguments),
            },
        }
    }
}

/// Normalize backend-supplied arguments into a mapping.
///
/// Some backends encode arguments as a JSON string rather than an object.
fn arguments_from_value(tool: &str, value: Value) -> Arguments {
    match value {
        Value::Object(map) => map,
        Value::String(raw) => parse_arguments(tool, &raw),
        Value::Null => Map::new(),
        other => {
            tracing::warn!(tool, arguments = %other, "Tool-call arguments are not an object");
            Map::new()
        }
    }
}

/// Parse argument text, logging and dropping anything that is not a JSON object
pub(crate) fn parse_arguments(tool: &str, raw: &str) -> Arguments {
    if raw.trim().is_empty() {
        return Map::new();
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(tool, error = %e, raw, "Tool-call arguments are not a JSON object");
        Map::new()
    })
}

/// A tool call as it arrives in one streamed chunk.
///
/// `arguments` is kept as sent: an object, or a piece of JSON text that only
/// parses once joined with the other pieces of the same `index`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "WireToolCall")]
pub struct ToolCallFragment {
    pub name: String,
    pub index: Option<u32>,
    pub arguments: Value,
}

impl From<WireToolCall> for ToolCallFragment {
    fn from(wire: WireToolCall) -> Self {
        Self {
            name: wire.function.name,
            index: wire.function.index,
            arguments: wire.function.arguments,
        }
    }
}

#[cfg(test)]
impl From<ToolCall> for ToolCallFragment {
    fn from(call: ToolCall) -> Self {
        Self {
            name: call.name,
            index: call.index,
            arguments: Value::Object(call.arguments),
        }
    }
}

/// Tool definition offered to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// Parameter schema of a tool; `required` drives argument validation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSchema {
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl Serialize for ToolDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": self.parameters.properties,
                    "required": self.parameters.required,
                }
            }
        })
        .serialize(serializer)
    }
}

/// Chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub think: Option<bool>,
    /// Backend sampling options (temperature and friends)
    pub options: Option<Map<String, Value>>,
}

/// Non-streamed chat response
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Usage,
}

/// One fragment of a streamed chat response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: MessageFragment,
    #[serde(default)]
    pub done: bool,
    /// Prompt tokens, reported on the final chunk
    #[serde(default)]
    pub prompt_eval_count: u64,
    /// Generated tokens, reported on the final chunk
    #[serde(default)]
    pub eval_count: u64,
}

#[cfg(test)]
impl ChatChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: MessageFragment {
                content: content.into(),
                ..MessageFragment::default()
            },
            ..Self::default()
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            message: MessageFragment {
                tool_calls: tool_calls.into_iter().map(ToolCallFragment::from).collect(),
                ..MessageFragment::default()
            },
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// Partial assistant message carried by a [`ChatChunk`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageFragment {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_calls: Vec<ToolCallFragment>,
}

/// Single-prompt generate request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub think: Option<bool>,
}

/// One fragment of a streamed generate response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub eval_count: u64,
}

/// Installed model as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Treat an explicit `null` like an absent field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_tool_call_wire_format() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall::from_json("read_file", json!({"path": "notes.md"}))],
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "read_file", "arguments": {"path": "notes.md"}}}]
            })
        );
    }

    #[test]
    fn test_plain_messages_omit_optional_keys() {
        let value = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(value, json!({"role": "assistant", "content": "hi"}));
        let value = serde_json::to_value(Message::tool("done")).unwrap();
        assert_eq!(value, json!({"role": "tool", "content": "done"}));
    }

    #[test]
    fn test_string_encoded_arguments_are_parsed() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{"function": {"name": "mkdir", "arguments": "{\"path\": \"a/b\"}"}}]
        }))
        .unwrap();
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments.get("path"), Some(&json!("a/b")));
    }

    #[test]
    fn test_null_tool_calls_and_missing_content() {
        let msg: Message =
            serde_json::from_value(json!({"role": "assistant", "tool_calls": null})).unwrap();
        assert_eq!(msg, Message::assistant(""));
    }

    #[test]
    fn test_tool_definition_wire_format() {
        let mut properties = Map::new();
        properties.insert("city".into(), json!({"type": "string"}));
        let def = ToolDefinition {
            name: "get_weather".into(),
            description: "Weather lookup".into(),
            parameters: ParameterSchema {
                properties,
                required: vec!["city".into()],
            },
        };
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "get_weather");
        assert_eq!(value["function"]["parameters"]["type"], "object");
        assert_eq!(value["function"]["parameters"]["required"], json!(["city"]));
    }

    #[test]
    fn test_chunk_with_indexed_tool_call() {
        let chunk: ChatChunk = serde_json::from_value(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"index": 1, "name": "grep_file", "arguments": {"path": "a"}}}]
            },
            "done": false
        }))
        .unwrap();
        assert_eq!(chunk.message.tool_calls[0].index, Some(1));
        assert!(!chunk.done);
    }

    #[test]
    fn test_chunk_keeps_partial_argument_text() {
        let chunk: ChatChunk = serde_json::from_value(json!({
            "message": {
                "tool_calls": [{"function": {"index": 0, "name": "write_file", "arguments": "{\"path\": "}}]
            }
        }))
        .unwrap();
        assert_eq!(chunk.message.tool_calls[0].arguments, json!("{\"path\": "));
    }

    #[test]
    fn test_unparseable_argument_text_yields_empty_arguments() {
        assert!(parse_arguments("mkdir", "{\"path\": ").is_empty());
        assert!(parse_arguments("mkdir", "  ").is_empty());
        assert_eq!(
            parse_arguments("mkdir", "{\"path\": \"a\"}").get("path"),
            Some(&json!("a"))
        );
    }
}
