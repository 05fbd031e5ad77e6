//! Effects produced by state transitions

use super::EndReason;

/// Effects to be executed by the controller after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Append the `end` record to the log
    RecordEnd { reason: EndReason },
    /// Run one reflection turn per persona
    BeginReflection,
}

impl Effect {
    /// The effects that close a conversation, in order
    pub fn closing(reason: EndReason) -> [Effect; 2] {
        [Effect::RecordEnd { reason }, Effect::BeginReflection]
    }
}
