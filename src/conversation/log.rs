//! Append-only conversation log
//!
//! Newline-delimited JSON, one record per event, flushed after every write.

use crate::engine::ExecutedToolCall;
use crate::state_machine::EndReason;
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("conversation log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("conversation log {path} line {line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One line of the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time: String,
    #[serde(flatten)]
    pub event: LogEvent,
}

impl LogRecord {
    /// Stamp `event` with the current local time
    pub fn now(event: LogEvent) -> Self {
        Self {
            time: Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    Start {
        #[serde(rename = "personaA", alias = "persona_a")]
        persona_a: String,
        #[serde(rename = "personaB", alias = "persona_b")]
        persona_b: String,
        model: String,
    },
    Turn {
        turn: u32,
        persona: String,
        content: String,
        #[serde(rename = "toolCalls", alias = "tool_calls", default)]
        tool_calls: Vec<ExecutedToolCall>,
    },
    End {
        reason: EndReason,
        #[serde(
            rename = "maxTurns",
            alias = "max_turns",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        max_turns: Option<u32>,
    },
    Reflection {
        persona: String,
        content: String,
        #[serde(rename = "toolCalls", alias = "tool_calls", default)]
        tool_calls: Vec<ExecutedToolCall>,
    },
}

/// Writer over one log file
#[derive(Debug)]
pub struct ConversationLog {
    path: PathBuf,
    file: File,
}

impl ConversationLog {
    /// Create a new log named after the two personas and the current time
    pub fn create(logs_dir: &Path, persona_a: &str, persona_b: &str) -> Result<Self, LogError> {
        fs::create_dir_all(logs_dir).map_err(|source| LogError::Io {
            path: logs_dir.to_path_buf(),
            source,
        })?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = logs_dir.join(format!("{persona_a}_x_{persona_b}_{stamp}.jsonl"));
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    /// Reopen an existing log for appending
    pub fn open_append(path: &Path) -> Result<Self, LogError> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| LogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to disk before returning
    pub fn append(&mut self, event: LogEvent) -> Result<(), LogError> {
        let mut line = serde_json::to_string(&LogRecord::now(event))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| LogError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Read every record of a log.
///
/// A final line that does not parse is a torn write and is dropped with a
/// warning; a bad line anywhere else is an error.
pub fn read_records(path: &Path) -> Result<Vec<LogRecord>, LogError> {
    let io_error = |source| LogError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;

    let mut lines = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error)?;
        if !line.trim().is_empty() {
            lines.push((index + 1, line));
        }
    }

    let last = lines.len().saturating_sub(1);
    let mut records = Vec::with_capacity(lines.len());
    for (position, (line_no, line)) in lines.iter().enumerate() {
        match serde_json::from_str::<LogRecord>(line) {
            Ok(record) => records.push(record),
            Err(source) if position == last => {
                tracing::warn!(path = %path.display(), line = line_no, error = %source, "Ignoring torn final log line");
            }
            Err(source) => {
                return Err(LogError::Malformed {
                    path: path.to_path_buf(),
                    line: *line_no,
                    source,
                })
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn executed(name: &str) -> ExecutedToolCall {
        ExecutedToolCall {
            name: name.to_string(),
            arguments: json!({"reason": "tired"}).as_object().cloned().unwrap(),
            result: "ok".to_string(),
        }
    }

    #[test]
    fn test_wire_field_names() {
        let record = LogRecord {
            time: "2024-01-01T00:00:00.000+09:00".into(),
            event: LogEvent::Turn {
                turn: 3,
                persona: "bob".into(),
                content: "こんにちは".into(),
                tool_calls: vec![executed("end_conversation")],
            },
        };
        let value: Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["event"], "turn");
        assert_eq!(value["turn"], 3);
        assert_eq!(value["toolCalls"][0]["name"], "end_conversation");
        assert_eq!(value["toolCalls"][0]["arguments"]["reason"], "tired");

        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("こんにちは"));

        let start = serde_json::to_value(LogEvent::Start {
            persona_a: "a".into(),
            persona_b: "b".into(),
            model: "m".into(),
        })
        .unwrap();
        assert_eq!(start, json!({"event": "start", "personaA": "a", "personaB": "b", "model": "m"}));

        let end = serde_json::to_value(LogEvent::End {
            reason: EndReason::BothEnded,
            max_turns: None,
        })
        .unwrap();
        assert_eq!(end, json!({"event": "end", "reason": "both_ended"}));
    }

    #[test]
    fn test_snake_case_aliases_accepted() {
        let line = r#"{"time":"t","event":"start","persona_a":"a","persona_b":"b","model":"m"}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();
        assert!(matches!(record.event, LogEvent::Start { ref persona_a, .. } if persona_a == "a"));

        let line = r#"{"time":"t","event":"end","reason":"max_turns","max_turns":20}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();
        assert_eq!(
            record.event,
            LogEvent::End {
                reason: EndReason::MaxTurns,
                max_turns: Some(20)
            }
        );
    }

    #[test]
    fn test_append_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = ConversationLog::create(dir.path(), "amy", "bob").unwrap();
        let name = log.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("amy_x_bob_") && name.ends_with(".jsonl"));

        log.append(LogEvent::Start {
            persona_a: "amy".into(),
            persona_b: "bob".into(),
            model: "m".into(),
        })
        .unwrap();
        // Visible on disk without dropping the writer
        assert_eq!(read_records(log.path()).unwrap().len(), 1);

        let mut reopened = ConversationLog::open_append(log.path()).unwrap();
        reopened
            .append(LogEvent::Reflection {
                persona: "amy".into(),
                content: "noted".into(),
                tool_calls: vec![],
            })
            .unwrap();
        let records = read_records(log.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[1].event, LogEvent::Reflection { .. }));
    }

    #[test]
    fn test_torn_final_line_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(
            &path,
            "{\"time\":\"t\",\"event\":\"start\",\"personaA\":\"a\",\"personaB\":\"b\",\"model\":\"m\"}\n\n{\"time\":\"t\",\"ev",
        )
        .unwrap();
        assert_eq!(read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_middle_line_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(
            &path,
            "not json\n{\"time\":\"t\",\"event\":\"end\",\"reason\":\"both_ended\"}\n",
        )
        .unwrap();
        assert!(matches!(
            read_records(&path),
            Err(LogError::Malformed { line: 1, .. })
        ));
    }
}
