//! Rebuild conversation bookkeeping from a log

use super::log::{LogEvent, LogRecord};
use crate::state_machine::{
    transition, ConversationState, EndReason, Event, Speaker, TransitionError,
};
use crate::tools::ToolName;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResumeError {
    #[error("log is empty")]
    Empty,
    #[error("first log record is not a start record")]
    MissingStart,
    #[error("log contains a second start record")]
    DuplicateStart,
    #[error("expected turn {expected}, found turn {got}")]
    TurnGap { expected: u32, got: u32 },
    #[error("turn {turn} was spoken by {got}, expected {expected}")]
    SpeakerMismatch {
        turn: u32,
        expected: String,
        got: String,
    },
    #[error("turn {0} recorded after the conversation ended")]
    TurnAfterEnd(u32),
    #[error("reflection by unknown persona {0}")]
    UnknownReflection(String),
}

/// Where a logged conversation stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub persona_a: String,
    pub persona_b: String,
    pub model: String,
    /// State after replaying every logged turn
    pub state: ConversationState,
    /// Reason from the `end` record, if one was written
    pub recorded_end: Option<EndReason>,
    /// Personas whose reflection is already logged
    pub reflected: Vec<String>,
    /// Content of the last logged turn
    pub last_utterance: Option<String>,
}

impl ResumePoint {
    pub fn persona(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::A => &self.persona_a,
            Speaker::B => &self.persona_b,
        }
    }

    /// Personas still owing a reflection, A first
    pub fn pending_reflections(&self) -> Vec<Speaker> {
        [Speaker::A, Speaker::B]
            .into_iter()
            .filter(|s| !self.reflected.iter().any(|r| r == self.persona(*s)))
            .collect()
    }
}

/// Replay the logged turns through the consensus state machine
pub fn derive_resume_point(records: &[LogRecord]) -> Result<ResumePoint, ResumeError> {
    let (first, rest) = records.split_first().ok_or(ResumeError::Empty)?;
    let LogEvent::Start {
        persona_a,
        persona_b,
        model,
    } = &first.event
    else {
        return Err(ResumeError::MissingStart);
    };

    let mut point = ResumePoint {
        persona_a: persona_a.clone(),
        persona_b: persona_b.clone(),
        model: model.clone(),
        state: ConversationState::new(),
        recorded_end: None,
        reflected: Vec::new(),
        last_utterance: None,
    };

    for record in rest {
        match &record.event {
            LogEvent::Start { .. } => return Err(ResumeError::DuplicateStart),
            LogEvent::Turn {
                turn,
                persona,
                content,
                tool_calls,
            } => {
                if point.recorded_end.is_some() {
                    return Err(ResumeError::TurnAfterEnd(*turn));
                }
                let expected = point.persona(Speaker::for_turn(*turn));
                if persona != expected {
                    return Err(ResumeError::SpeakerMismatch {
                        turn: *turn,
                        expected: expected.to_string(),
                        got: persona.clone(),
                    });
                }
                let ended = tool_calls
                    .iter()
                    .any(|c| c.name == ToolName::EndConversation.as_str());
                let result = transition(&point.state, Event::TurnCompleted { turn: *turn, ended })
                    .map_err(|e| match e {
                        TransitionError::OutOfOrder { expected, got } => {
                            ResumeError::TurnGap { expected, got }
                        }
                        TransitionError::AlreadyClosed(_) => ResumeError::TurnAfterEnd(*turn),
                    })?;
                point.state = result.new_state;
                point.last_utterance = Some(content.clone());
            }
            LogEvent::End { reason, .. } => {
                point.recorded_end = Some(*reason);
            }
            LogEvent::Reflection { persona, .. } => {
                if persona != &point.persona_a && persona != &point.persona_b {
                    return Err(ResumeError::UnknownReflection(persona.clone()));
                }
                point.reflected.push(persona.clone());
            }
        }
    }

    Ok(point)
}
