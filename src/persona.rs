//! Persona roots
//!
//! `<home>/personas/<name>/memory/` holds the memory documents and
//! `<home>/personas/<name>/workspace/` is the sandboxed file tree.

use crate::config::AppConfig;
use crate::memory::{MemoryError, MemoryStore};
use crate::tools::{Sandbox, ToolContext};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("invalid persona name: {0:?}")]
    InvalidName(String),
    #[error("failed to prepare persona directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// A named persona's directories
#[derive(Debug, Clone)]
pub struct PersonaRoot {
    pub name: String,
    pub root: PathBuf,
    pub memory: MemoryStore,
    pub workspace_dir: PathBuf,
}

impl PersonaRoot {
    /// Locate a persona under the configured home without touching disk
    pub fn resolve(config: &AppConfig, name: &str) -> Result<Self, PersonaError> {
        validate_name(name)?;
        let root = config.personas_dir().join(name);
        Ok(Self {
            name: name.to_string(),
            memory: MemoryStore::new(root.join("memory")),
            workspace_dir: root.join("workspace"),
            root,
        })
    }

    /// Create the workspace and seed memory on first use
    pub fn ensure(&self) -> Result<(), PersonaError> {
        fs::create_dir_all(&self.workspace_dir).map_err(|source| PersonaError::Io {
            path: self.workspace_dir.clone(),
            source,
        })?;
        self.memory.init()?;
        Ok(())
    }

    /// Resolve and prepare in one step
    pub fn open(config: &AppConfig, name: &str) -> Result<Self, PersonaError> {
        let persona = Self::resolve(config, name)?;
        persona.ensure()?;
        tracing::debug!(persona = %persona.name, root = %persona.root.display(), "Persona ready");
        Ok(persona)
    }

    /// Tool resources bound to this persona
    pub fn tool_context(&self) -> Result<ToolContext, PersonaError> {
        let sandbox = Sandbox::new(&self.workspace_dir).map_err(|source| PersonaError::Io {
            path: self.workspace_dir.clone(),
            source,
        })?;
        Ok(ToolContext::new(sandbox, self.memory.clone()))
    }
}

/// A single path component: non-empty, no separators, no leading dot
fn validate_name(name: &str) -> Result<(), PersonaError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(PersonaError::InvalidName(name.to_string()))
    }
}

/// Names of personas with a memory directory, sorted
pub fn list_personas(config: &AppConfig) -> io::Result<Vec<String>> {
    let dir = config.personas_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.path().join("memory").is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
