//! Property-based tests for the consensus state machine

use super::*;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

/// Feed `ended` flags as consecutive turns, stopping at closure.
/// Returns the final state and the effects of every transition.
fn run(ended: &[bool]) -> (ConversationState, Vec<Effect>) {
    let mut state = ConversationState::new();
    let mut effects = Vec::new();
    for (turn, &ended) in (0u32..).zip(ended) {
        if state.is_closed() {
            break;
        }
        let result = transition(&state, Event::TurnCompleted { turn, ended })
            .expect("open state accepts the next turn");
        state = result.new_state;
        effects.extend(result.effects);
    }
    (state, effects)
}

/// Index of the first turn completing a pair of consecutive ends
fn first_close(ended: &[bool]) -> Option<usize> {
    ended.windows(2).position(|w| w[0] && w[1]).map(|i| i + 1)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_turns() -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(any::<bool>(), 0..40)
}

fn open_state(next_turn: u32, pending_end: bool) -> ConversationState {
    ConversationState {
        next_turn,
        phase: ConvState::Open { pending_end },
    }
}

fn arb_open_state() -> impl Strategy<Value = ConversationState> {
    (0u32..100, any::<bool>()).prop_map(|(next_turn, pending_end)| open_state(next_turn, pending_end))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Closes exactly at the first pair of consecutive ends, and never before
    #[test]
    fn prop_closes_only_after_two_consecutive_ends(ended in arb_turns()) {
        let (state, effects) = run(&ended);
        match first_close(&ended) {
            Some(turn) => {
                prop_assert_eq!(state.phase, ConvState::Closed { reason: EndReason::BothEnded });
                prop_assert_eq!(state.next_turn as usize, turn + 1);
                prop_assert_eq!(effects, Effect::closing(EndReason::BothEnded).to_vec());
            }
            None => {
                prop_assert!(!state.is_closed());
                prop_assert!(effects.is_empty());
                prop_assert_eq!(state.next_turn as usize, ended.len());
            }
        }
    }

    /// While open, the pending flag equals "the previous turn ended"
    #[test]
    fn prop_pending_end_tracks_previous_turn(ended in arb_turns()) {
        let (state, _) = run(&ended);
        if !state.is_closed() {
            prop_assert_eq!(state.pending_end(), ended.last().copied().unwrap_or(false));
        }
    }

    /// Speakers alternate with the turn index
    #[test]
    fn prop_speaker_alternates(state in arb_open_state(), ended in any::<bool>()) {
        let result = transition(&state, Event::TurnCompleted { turn: state.next_turn, ended }).unwrap();
        prop_assert_ne!(result.new_state.speaker(), state.speaker());
    }

    /// Budget exhaustion always closes with max_turns and keeps the turn index
    #[test]
    fn prop_budget_exhaustion_closes(state in arb_open_state()) {
        let result = transition(&state, Event::TurnBudgetExhausted).unwrap();
        prop_assert_eq!(result.new_state.phase, ConvState::Closed { reason: EndReason::MaxTurns });
        prop_assert_eq!(result.new_state.next_turn, state.next_turn);
        prop_assert_eq!(result.effects, Effect::closing(EndReason::MaxTurns).to_vec());
    }

    /// A closed conversation accepts nothing
    #[test]
    fn prop_closed_is_terminal(turn in 0u32..100, ended in any::<bool>()) {
        let closed = transition(&open_state(turn, false), Event::TurnBudgetExhausted)
            .unwrap()
            .new_state;
        let turn_rejected = transition(&closed, Event::TurnCompleted { turn, ended }).is_err();
        let budget_rejected = transition(&closed, Event::TurnBudgetExhausted).is_err();
        prop_assert!(turn_rejected);
        prop_assert!(budget_rejected);
    }
}
