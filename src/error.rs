//! Errors that abort a run

use crate::conversation::{LogError, ResumeError};
use crate::llm::LlmError;
use crate::memory::MemoryError;
use crate::persona::PersonaError;
use crate::state_machine::TransitionError;
use thiserror::Error;

/// Failure of a controller or command.
///
/// Tool-level failures never show up here; they are fed back to the model.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("model backend error: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Persona(#[from] PersonaError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error("cannot resume conversation: {0}")]
    Resume(#[from] ResumeError),
    #[error("conversation state error: {0}")]
    Transition(#[from] TransitionError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("a conversation needs two different personas, got {0} twice")]
    SamePersona(String),
    #[error("no models installed on the backend")]
    NoModels,
}
