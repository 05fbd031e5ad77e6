//! Events that drive the conversation

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A persona finished turn `turn`; `ended` is whether it called `end_conversation`
    TurnCompleted { turn: u32, ended: bool },
    /// The turn budget is spent
    TurnBudgetExhausted,
}
