//! Conversation state types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two personas speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    A,
    B,
}

impl Speaker {
    /// Persona A takes even turns, B odd ones
    pub fn for_turn(turn: u32) -> Self {
        if turn % 2 == 0 {
            Speaker::A
        } else {
            Speaker::B
        }
    }
}

/// Why a conversation closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    BothEnded,
    MaxTurns,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::BothEnded => "both_ended",
            EndReason::MaxTurns => "max_turns",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvState {
    /// Conversation running; `pending_end` is set when the previous turn
    /// called `end_conversation`
    Open { pending_end: bool },
    Closed { reason: EndReason },
}

/// Bookkeeping for one conversation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationState {
    /// Index of the turn about to be played
    pub next_turn: u32,
    pub phase: ConvState,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            next_turn: 0,
            phase: ConvState::Open { pending_end: false },
        }
    }

    pub fn speaker(&self) -> Speaker {
        Speaker::for_turn(self.next_turn)
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        matches!(self.phase, ConvState::Closed { .. })
    }

    pub fn pending_end(&self) -> bool {
        matches!(self.phase, ConvState::Open { pending_end: true })
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_alternates() {
        assert_eq!(Speaker::for_turn(0), Speaker::A);
        assert_eq!(Speaker::for_turn(1), Speaker::B);
        assert_eq!(Speaker::for_turn(7), Speaker::B);
    }

    #[test]
    fn test_end_reason_wire_names() {
        assert_eq!(
            serde_json::to_string(&EndReason::BothEnded).unwrap(),
            "\"both_ended\""
        );
        assert_eq!(EndReason::MaxTurns.to_string(), "max_turns");
    }
}
