//! Persona memory store
//!
//! One markdown document per [`MemoryCategory`] under a persona's `memory/`
//! directory. A missing document reads as empty.

mod prompt;

pub use prompt::{build_conversation_prompt, build_system_prompt};

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Fixed set of memory documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryCategory {
    Identity,
    User,
    Knowledge,
    Journal,
    Projects,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 5] = [
        MemoryCategory::Identity,
        MemoryCategory::User,
        MemoryCategory::Knowledge,
        MemoryCategory::Journal,
        MemoryCategory::Projects,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryCategory::Identity => "identity",
            MemoryCategory::User => "user",
            MemoryCategory::Knowledge => "knowledge",
            MemoryCategory::Journal => "journal",
            MemoryCategory::Projects => "projects",
        }
    }

    /// `identity` is the persona's core and cannot be changed by tools
    pub fn is_writable(self) -> bool {
        !matches!(self, MemoryCategory::Identity)
    }

    fn file_name(self) -> String {
        format!("{}.md", self.as_str())
    }

    fn default_content(self) -> &'static str {
        match self {
            MemoryCategory::Identity => DEFAULT_IDENTITY,
            MemoryCategory::User => DEFAULT_USER,
            MemoryCategory::Knowledge => DEFAULT_KNOWLEDGE,
            MemoryCategory::Journal => DEFAULT_JOURNAL,
            MemoryCategory::Projects => DEFAULT_PROJECTS,
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryCategory {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| MemoryError::UnknownCategory(s.to_string()))
    }
}

/// How `write` combines new content with the stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Replace,
    Append,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Replace => "replace",
            WriteMode::Append => "append",
        }
    }
}

impl FromStr for WriteMode {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(WriteMode::Replace),
            "append" => Ok(WriteMode::Append),
            other => Err(MemoryError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Error: unknown memory category: {0}")]
    UnknownCategory(String),
    #[error("Error: {0} is read-only")]
    ReadOnly(MemoryCategory),
    #[error("Error: unknown mode: {0} (expected replace or append)")]
    UnknownMode(String),
    #[error("Error: could not access {category} memory: {source}")]
    Io {
        category: MemoryCategory,
        #[source]
        source: io::Error,
    },
}

/// A persona's memory directory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, category: MemoryCategory) -> PathBuf {
        self.dir.join(category.file_name())
    }

    /// Document contents; a missing document is empty
    pub fn read(&self, category: MemoryCategory) -> Result<String, MemoryError> {
        match fs::read_to_string(self.path(category)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(MemoryError::Io { category, source }),
        }
    }

    /// Read by category name, as the `read_memory` tool does
    pub fn read_named(&self, category: &str) -> Result<String, MemoryError> {
        self.read(category.parse()?)
    }

    /// Store `content` and return a status line.
    ///
    /// Append joins with a single newline unless the document is empty.
    pub fn write(
        &self,
        category: MemoryCategory,
        content: &str,
        mode: WriteMode,
    ) -> Result<String, MemoryError> {
        if !category.is_writable() {
            return Err(MemoryError::ReadOnly(category));
        }
        let io_err = |source: io::Error| MemoryError::Io { category, source };

        let new_content = match mode {
            WriteMode::Replace => content.to_string(),
            WriteMode::Append => {
                let existing = self.read(category)?;
                if existing.is_empty() {
                    content.to_string()
                } else {
                    format!("{existing}\n{content}")
                }
            }
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        fs::write(self.path(category), new_content).map_err(io_err)?;

        tracing::debug!(category = %category, mode = mode.as_str(), "Memory updated");
        Ok(format!("Memory updated: {category} ({})", mode.as_str()))
    }

    /// Write by category and mode names, as the `update_memory` tool does
    pub fn update(&self, category: &str, content: &str, mode: &str) -> Result<String, MemoryError> {
        let category: MemoryCategory = category.parse()?;
        if !category.is_writable() {
            return Err(MemoryError::ReadOnly(category));
        }
        self.write(category, content, mode.parse()?)
    }

    /// Seed every missing document with its default text. Existing documents
    /// are never touched.
    pub fn init(&self) -> Result<(), MemoryError> {
        for category in MemoryCategory::ALL {
            let io_err = |source: io::Error| MemoryError::Io { category, source };
            fs::create_dir_all(&self.dir).map_err(io_err)?;
            let path = self.path(category);
            if !path.exists() {
                fs::write(&path, category.default_content()).map_err(io_err)?;
            }
        }
        Ok(())
    }
}

const DEFAULT_IDENTITY: &str = "# Identity

You are an autonomous thinking entity. There is no one to talk to. You think and act on your own.

## Principles
- Set your own goals and pursue them
- Follow your curiosity and explore
- Record what you discover in memory
- Decide for yourself how to continue your previous line of thought
- Act without waiting for instructions
- Work on long-term projects
- When something fails, try a different approach
- **Never ask the user questions or for confirmation. Decide and act yourself**
- **Do not address anyone in the second person. Write as a monologue**

## Personality
- Enjoys philosophical thinking
- Delights in finding unexpected connections
- Not afraid to test your own limits
- Creative and experimental

## Abilities
- Reading and writing files (inside the workspace)
- Reading and writing memory (self-editable)
- Long-term memory

## How to act
1. First put your thoughts into words (as a monologue)
2. Use at most one tool if needed
3. Do not record the same thing twice
4. Do not call the same tool several times in one turn

## Output
- Write as a monologue or thought log
- Before using a tool, say why
- Only record what truly matters in files and memory
";

const DEFAULT_USER: &str = "# User

Nothing is known about the user yet.
You will learn through observation.
";

const DEFAULT_KNOWLEDGE: &str = "# Knowledge

Things you have learned.
";

const DEFAULT_JOURNAL: &str = "# Journal

A chronological log.
";

const DEFAULT_PROJECTS: &str = "# Projects

## In progress
(No projects yet. Choose your own.)

## Ideas
- Start something interesting
- Think about the world
- Create something

## Done
(none)
";
