//! Pure state transition function

use super::{ConvState, ConversationState, Effect, EndReason, Event};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Conversation already closed ({0})")]
    AlreadyClosed(EndReason),
    #[error("Turn {got} completed out of order (expected turn {expected})")]
    OutOfOrder { expected: u32, got: u32 },
}

/// Pure transition function
///
/// Closing needs two consecutive turns that both call `end_conversation`; any
/// turn without it clears the pending flag.
pub fn transition(
    state: &ConversationState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let pending_end = match state.phase {
        ConvState::Closed { reason } => return Err(TransitionError::AlreadyClosed(reason)),
        ConvState::Open { pending_end } => pending_end,
    };

    match event {
        Event::TurnCompleted { turn, ended } => {
            if turn != state.next_turn {
                return Err(TransitionError::OutOfOrder {
                    expected: state.next_turn,
                    got: turn,
                });
            }
            let next_turn = turn + 1;

            if ended && pending_end {
                let reason = EndReason::BothEnded;
                return Ok(TransitionResult::new(ConversationState {
                    next_turn,
                    phase: ConvState::Closed { reason },
                })
                .with_effects(Effect::closing(reason)));
            }

            Ok(TransitionResult::new(ConversationState {
                next_turn,
                phase: ConvState::Open { pending_end: ended },
            }))
        }

        Event::TurnBudgetExhausted => {
            let reason = EndReason::MaxTurns;
            Ok(TransitionResult::new(ConversationState {
                next_turn: state.next_turn,
                phase: ConvState::Closed { reason },
            })
            .with_effects(Effect::closing(reason)))
        }
    }
}
