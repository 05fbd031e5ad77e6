//! Static tool table
//!
//! One [`ToolName`] per callable tool; definitions are built once and shared.

use crate::llm::{ParameterSchema, ToolDefinition};
use crate::memory::MemoryCategory;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Closed set of tools known to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ReadFile,
    WriteFile,
    AppendFile,
    EditFile,
    DeleteFile,
    ListFiles,
    Mkdir,
    GrepFile,
    FileInfo,
    ReadMemory,
    UpdateMemory,
    WebSearch,
    WebFetch,
    HttpRequest,
    GetWeather,
    EndConversation,
}

impl ToolName {
    pub const ALL: [ToolName; 16] = [
        ToolName::ReadFile,
        ToolName::WriteFile,
        ToolName::AppendFile,
        ToolName::EditFile,
        ToolName::DeleteFile,
        ToolName::ListFiles,
        ToolName::Mkdir,
        ToolName::GrepFile,
        ToolName::FileInfo,
        ToolName::ReadMemory,
        ToolName::UpdateMemory,
        ToolName::WebSearch,
        ToolName::WebFetch,
        ToolName::HttpRequest,
        ToolName::GetWeather,
        ToolName::EndConversation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ReadFile => "read_file",
            ToolName::WriteFile => "write_file",
            ToolName::AppendFile => "append_file",
            ToolName::EditFile => "edit_file",
            ToolName::DeleteFile => "delete_file",
            ToolName::ListFiles => "list_files",
            ToolName::Mkdir => "mkdir",
            ToolName::GrepFile => "grep_file",
            ToolName::FileInfo => "file_info",
            ToolName::ReadMemory => "read_memory",
            ToolName::UpdateMemory => "update_memory",
            ToolName::WebSearch => "web_search",
            ToolName::WebFetch => "web_fetch",
            ToolName::HttpRequest => "http_request",
            ToolName::GetWeather => "get_weather",
            ToolName::EndConversation => "end_conversation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// Static definition offered to the model
    pub fn definition(self) -> &'static ToolDefinition {
        static TABLE: OnceLock<Vec<ToolDefinition>> = OnceLock::new();
        let table = TABLE.get_or_init(|| Self::ALL.into_iter().map(build_definition).collect());
        // ALL lists the variants in declaration order
        &table[self as usize]
    }
}

/// Which tools a dispatcher exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSet {
    /// File, memory and web tools for the autonomous loop
    Autonomous,
    /// File and memory tools plus `end_conversation`
    Conversation,
    /// Memory tools only, for post-conversation reflection
    Reflection,
    /// Weather lookup plus file tools
    Demo,
}

const FILE_TOOLS: [ToolName; 9] = [
    ToolName::ReadFile,
    ToolName::WriteFile,
    ToolName::AppendFile,
    ToolName::EditFile,
    ToolName::DeleteFile,
    ToolName::ListFiles,
    ToolName::Mkdir,
    ToolName::GrepFile,
    ToolName::FileInfo,
];

const MEMORY_TOOLS: [ToolName; 2] = [ToolName::ReadMemory, ToolName::UpdateMemory];

const WEB_TOOLS: [ToolName; 3] = [
    ToolName::WebSearch,
    ToolName::WebFetch,
    ToolName::HttpRequest,
];

impl ToolSet {
    pub fn tools(self) -> Vec<ToolName> {
        match self {
            ToolSet::Autonomous => [&FILE_TOOLS[..], &MEMORY_TOOLS, &WEB_TOOLS].concat(),
            ToolSet::Conversation => {
                [&FILE_TOOLS[..], &MEMORY_TOOLS, &[ToolName::EndConversation]].concat()
            }
            ToolSet::Reflection => MEMORY_TOOLS.to_vec(),
            ToolSet::Demo => [&[ToolName::GetWeather][..], &FILE_TOOLS].concat(),
        }
    }

    pub fn contains(self, tool: ToolName) -> bool {
        self.tools().contains(&tool)
    }

    pub fn definitions(self) -> Vec<ToolDefinition> {
        self.tools()
            .into_iter()
            .map(|tool| tool.definition().clone())
            .collect()
    }
}

fn string_param(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn integer_param(description: &str) -> Value {
    json!({"type": "integer", "description": description})
}

fn schema(properties: &[(&str, Value)], required: &[&str]) -> ParameterSchema {
    let properties: Map<String, Value> = properties
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect();
    ParameterSchema {
        properties,
        required: required.iter().map(|s| (*s).to_string()).collect(),
    }
}

fn build_definition(tool: ToolName) -> ToolDefinition {
    const PATH: &str = "Path relative to the workspace";
    let categories: Vec<&str> = MemoryCategory::ALL.iter().map(|c| c.as_str()).collect();
    let writable: Vec<&str> = MemoryCategory::ALL
        .iter()
        .filter(|c| c.is_writable())
        .map(|c| c.as_str())
        .collect();

    let (description, parameters) = match tool {
        ToolName::ReadFile => (
            "Read a file. Use offset/limit to read a window of lines (like head/tail).",
            schema(
                &[
                    ("path", string_param(PATH)),
                    ("offset", integer_param("First line to read, 0-based (default: start of file)")),
                    ("limit", integer_param("Number of lines to read (default: all)")),
                ],
                &["path"],
            ),
        ),
        ToolName::WriteFile => (
            "Write content to a file, replacing it. Also creates new files.",
            schema(
                &[
                    ("path", string_param(PATH)),
                    ("content", string_param("Content to write")),
                ],
                &["path", "content"],
            ),
        ),
        ToolName::AppendFile => (
            "Append content to the end of a file.",
            schema(
                &[
                    ("path", string_param(PATH)),
                    ("content", string_param("Content to append")),
                ],
                &["path", "content"],
            ),
        ),
        ToolName::EditFile => (
            "Edit part of a file: replace the exact text `search` with `replace`. The search text must occur exactly once.",
            schema(
                &[
                    ("path", string_param(PATH)),
                    ("search", string_param("Exact text to replace")),
                    ("replace", string_param("Replacement text")),
                ],
                &["path", "search", "replace"],
            ),
        ),
        ToolName::DeleteFile => (
            "Delete a file or an empty directory.",
            schema(&[("path", string_param(PATH))], &["path"]),
        ),
        ToolName::ListFiles => (
            "List the entries of a directory. Directories end with '/'.",
            schema(&[("path", string_param("Directory path relative to the workspace"))], &["path"]),
        ),
        ToolName::Mkdir => (
            "Create a directory, including missing parents.",
            schema(&[("path", string_param(PATH))], &["path"]),
        ),
        ToolName::GrepFile => (
            "Search a file and return the matching lines with their line numbers.",
            schema(
                &[
                    ("path", string_param(PATH)),
                    ("pattern", string_param("Text to search for (substring match)")),
                ],
                &["path", "pattern"],
            ),
        ),
        ToolName::FileInfo => (
            "Show file information: size, line count and modification time.",
            schema(&[("path", string_param(PATH))], &["path"]),
        ),
        ToolName::ReadMemory => (
            "Read a memory document. identity = your persona, user = what you know about the user, knowledge = things you learned, journal = chronological log, projects = your goals.",
            schema(
                &[(
                    "category",
                    json!({"type": "string", "enum": categories, "description": "Memory category"}),
                )],
                &["category"],
            ),
        ),
        ToolName::UpdateMemory => (
            "Update a memory document. identity is read-only.",
            schema(
                &[
                    (
                        "category",
                        json!({"type": "string", "enum": writable, "description": "Writable memory category"}),
                    ),
                    ("content", string_param("Content to write")),
                    (
                        "mode",
                        json!({"type": "string", "enum": ["replace", "append"], "description": "replace = overwrite the document, append = add to the end"}),
                    ),
                ],
                &["category", "content", "mode"],
            ),
        ),
        ToolName::WebSearch => (
            "Search the web with DuckDuckGo. Returns title, URL and snippet for each result.",
            schema(
                &[
                    ("query", string_param("Search query")),
                    ("max_results", integer_param("Maximum number of results (default 5)")),
                ],
                &["query"],
            ),
        ),
        ToolName::WebFetch => (
            "Fetch a web page and return its readable text.",
            schema(&[("url", string_param("URL to fetch"))], &["url"]),
        ),
        ToolName::HttpRequest => (
            "Send an arbitrary HTTP request, e.g. an API call. Returns the status code and body.",
            schema(
                &[
                    (
                        "method",
                        json!({"type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"], "description": "HTTP method"}),
                    ),
                    ("url", string_param("Request URL")),
                    (
                        "headers",
                        json!({"type": "object", "description": "Request headers, e.g. {\"Authorization\": \"Bearer xxx\"}"}),
                    ),
                    (
                        "body",
                        json!({"type": "object", "description": "JSON request body for POST/PUT/PATCH"}),
                    ),
                ],
                &["method", "url"],
            ),
        ),
        ToolName::GetWeather => (
            "Get the weather for a city.",
            schema(
                &[("city", string_param("City name, e.g. Tokyo, Osaka, New York"))],
                &["city"],
            ),
        ),
        ToolName::EndConversation => (
            "End the conversation. It only ends once your partner also calls this on their next turn.",
            schema(&[("reason", string_param("Why you want to end the conversation"))], &[]),
        ),
    };

    ToolDefinition {
        name: tool.as_str().to_string(),
        description: description.to_string(),
        parameters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_follow_variant_order() {
        for tool in ToolName::ALL {
            assert_eq!(tool.definition().name, tool.as_str());
            assert_eq!(ToolName::from_name(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::from_name("bash"), None);
    }

    #[test]
    fn test_tool_sets() {
        assert!(ToolSet::Conversation.contains(ToolName::EndConversation));
        assert!(!ToolSet::Autonomous.contains(ToolName::EndConversation));
        assert!(ToolSet::Autonomous.contains(ToolName::WebFetch));
        assert_eq!(
            ToolSet::Reflection.tools(),
            vec![ToolName::ReadMemory, ToolName::UpdateMemory]
        );
        assert!(ToolSet::Demo.contains(ToolName::GetWeather));
        assert!(!ToolSet::Conversation.contains(ToolName::WebSearch));
    }

    #[test]
    fn test_update_memory_offers_only_writable_categories() {
        let def = ToolName::UpdateMemory.definition();
        let categories = &def.parameters.properties["category"]["enum"];
        assert!(!categories
            .as_array()
            .unwrap()
            .contains(&Value::from("identity")));
        assert_eq!(def.parameters.required, vec!["category", "content", "mode"]);
    }
}
