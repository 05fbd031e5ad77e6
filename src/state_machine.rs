//! Conversation consensus state machine
//!
//! Pure transitions over the two-persona conversation: the controller feeds
//! in completed turns and executes the returned effects.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvState, ConversationState, EndReason, Speaker};
pub use transition::{transition, TransitionError};
