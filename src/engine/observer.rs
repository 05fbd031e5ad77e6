//! Turn progress reporting

use crate::llm::{Message, ToolCall};
use crate::tools::ToolOutput;
use std::io::Write;

/// Receives progress events from the turn engine and controllers
///
/// Every method defaults to doing nothing.
pub trait TurnObserver: Send + Sync {
    /// Free-form status line from a controller (headers, log location)
    fn on_notice(&self, _text: &str) {}

    /// A streamed response is about to start
    fn on_stream_start(&self, _label: &str) {}

    /// A fragment of streamed response text
    fn on_content_delta(&self, _delta: &str) {}

    /// A fragment of streamed think-mode reasoning
    fn on_thinking_delta(&self, _delta: &str) {}

    /// The streamed response has been fully assembled
    fn on_stream_end(&self, _label: &str, _message: &Message) {}

    /// A non-streamed assistant message arrived
    fn on_message(&self, _label: &str, _message: &Message) {}

    fn on_tool_call(&self, _call: &ToolCall) {}

    fn on_tool_result(&self, _name: &str, _output: &ToolOutput) {}
}

/// Discards every event
#[cfg(test)]
pub struct SilentObserver;

#[cfg(test)]
impl TurnObserver for SilentObserver {}

/// Prints the transcript to stdout
pub struct ConsoleObserver;

impl ConsoleObserver {
    fn print(text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout should not abort the run
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

impl TurnObserver for ConsoleObserver {
    fn on_notice(&self, text: &str) {
        Self::print(&format!("{text}\n"));
    }

    fn on_stream_start(&self, label: &str) {
        Self::print(&format!("{label}: "));
    }

    fn on_content_delta(&self, delta: &str) {
        Self::print(delta);
    }

    fn on_thinking_delta(&self, delta: &str) {
        Self::print(&format!("\x1b[2m{delta}\x1b[0m"));
    }

    fn on_stream_end(&self, _label: &str, _message: &Message) {
        Self::print("\n");
    }

    fn on_message(&self, label: &str, message: &Message) {
        if let Message::Assistant {
            thinking: Some(thinking),
            ..
        } = message
        {
            if !thinking.is_empty() {
                Self::print(&format!("\x1b[2m({label} thinking) {thinking}\x1b[0m\n"));
            }
        }
        if !message.content().is_empty() {
            Self::print(&format!("{label}: {}\n", message.content()));
        }
    }

    fn on_tool_call(&self, call: &ToolCall) {
        let arguments = serde_json::Value::Object(call.arguments.clone());
        Self::print(&format!("  [{}({arguments})]\n", call.name));
    }

    fn on_tool_result(&self, _name: &str, output: &ToolOutput) {
        Self::print(&format!("  -> {}\n", output.output));
    }
}
