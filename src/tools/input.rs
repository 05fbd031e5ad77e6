//! Typed tool inputs
//!
//! Arguments are validated once against the static `required` list, then
//! deserialized into the per-tool input struct.

use super::schema::ToolName;
use crate::llm::Arguments;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Validated arguments of one tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    ReadFile(ReadFileInput),
    WriteFile(WriteInput),
    AppendFile(WriteInput),
    EditFile(EditFileInput),
    DeleteFile(PathInput),
    ListFiles(PathInput),
    Mkdir(PathInput),
    GrepFile(GrepInput),
    FileInfo(PathInput),
    ReadMemory(ReadMemoryInput),
    UpdateMemory(UpdateMemoryInput),
    WebSearch(WebSearchInput),
    WebFetch(WebFetchInput),
    HttpRequest(HttpRequestInput),
    GetWeather(WeatherInput),
    EndConversation(EndConversationInput),
}

/// Rejected tool call, rendered verbatim as the tool result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolInputError {
    #[error("Error: unknown tool: {0}")]
    Unknown(String),
    #[error("Error: {tool} is missing required parameter(s): {}", missing.join(", "))]
    MissingParameters {
        tool: &'static str,
        missing: Vec<String>,
    },
    #[error("Error: invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathInput {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadFileInput {
    pub path: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub offset: Option<usize>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteInput {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditFileInput {
    pub path: String,
    pub search: String,
    pub replace: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GrepInput {
    pub path: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadMemoryInput {
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateMemoryInput {
    pub category: String,
    pub content: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebSearchInput {
    pub query: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebFetchInput {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpRequestInput {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// JSON object, or a pre-encoded string
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherInput {
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EndConversationInput {
    #[serde(default)]
    pub reason: Option<String>,
}

impl ToolInput {
    /// Check required parameters, then decode the typed input.
    ///
    /// Missing parameters are reported all at once, before any decoding.
    pub fn parse(tool: ToolName, arguments: &Arguments) -> Result<Self, ToolInputError> {
        let missing: Vec<String> = tool
            .definition()
            .parameters
            .required
            .iter()
            .filter(|key| !arguments.contains_key(key.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ToolInputError::MissingParameters {
                tool: tool.as_str(),
                missing,
            });
        }

        let value = Value::Object(arguments.clone());
        let parsed = match tool {
            ToolName::ReadFile => serde_json::from_value(value).map(ToolInput::ReadFile),
            ToolName::WriteFile => serde_json::from_value(value).map(ToolInput::WriteFile),
            ToolName::AppendFile => serde_json::from_value(value).map(ToolInput::AppendFile),
            ToolName::EditFile => serde_json::from_value(value).map(ToolInput::EditFile),
            ToolName::DeleteFile => serde_json::from_value(value).map(ToolInput::DeleteFile),
            ToolName::ListFiles => serde_json::from_value(value).map(ToolInput::ListFiles),
            ToolName::Mkdir => serde_json::from_value(value).map(ToolInput::Mkdir),
            ToolName::GrepFile => serde_json::from_value(value).map(ToolInput::GrepFile),
            ToolName::FileInfo => serde_json::from_value(value).map(ToolInput::FileInfo),
            ToolName::ReadMemory => serde_json::from_value(value).map(ToolInput::ReadMemory),
            ToolName::UpdateMemory => serde_json::from_value(value).map(ToolInput::UpdateMemory),
            ToolName::WebSearch => serde_json::from_value(value).map(ToolInput::WebSearch),
            ToolName::WebFetch => serde_json::from_value(value).map(ToolInput::WebFetch),
            ToolName::HttpRequest => serde_json::from_value(value).map(ToolInput::HttpRequest),
            ToolName::GetWeather => serde_json::from_value(value).map(ToolInput::GetWeather),
            ToolName::EndConversation => {
                serde_json::from_value(value).map(ToolInput::EndConversation)
            }
        };

        parsed.map_err(|e| ToolInputError::InvalidArguments {
            tool: tool.as_str(),
            reason: e.to_string(),
        })
    }
}

/// Optional non-negative integer that also accepts numeric strings ("5")
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(usize),
        Text(String),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Number(n)) => Ok(Some(n)),
        Some(Count::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a non-negative integer, got {text:?}"))),
    }
}

/// Arguments object from a JSON literal
#[cfg(test)]
pub fn arguments(value: Value) -> Arguments {
    match value {
        Value::Object(map) => map,
        _ => Arguments::new(),
    }
}
