//! Autonomous loop for a single persona
//!
//! Each iteration rebuilds the system prompt from on-disk memory, so memory
//! the persona wrote during one turn is visible in the next.

use crate::engine::{rebuild_history, TurnEngine};
use crate::error::RunError;
use crate::llm::Message;
use crate::memory::build_system_prompt;
use crate::persona::PersonaRoot;
use crate::tools::{ToolDispatcher, ToolSet};
use chrono::Local;
use rand::seq::SliceRandom;

pub const DEFAULT_MAX_TURNS: u32 = 100;

/// Injected between iterations; the empty one only marks a turn boundary
const NUDGES: [&str; 3] = ["Keep going.", "...", ""];

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn nudge() -> &'static str {
    NUDGES.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

fn iteration_prompt(iteration: u32) -> String {
    if iteration == 0 {
        return format!("[{}] Autonomous mode started.", timestamp());
    }
    match nudge() {
        "" => format!("[{}]", timestamp()),
        nudge => format!("[{}] {nudge}", timestamp()),
    }
}

/// Run `max_turns` turns for `persona`, returning the number completed
pub async fn run_autonomous(
    engine: &TurnEngine<'_>,
    persona: &PersonaRoot,
    max_turns: u32,
) -> Result<u32, RunError> {
    let tools = ToolDispatcher::new(persona.tool_context()?, ToolSet::Autonomous);
    let mut history: Vec<Message> = Vec::new();

    tracing::info!(persona = %persona.name, model = engine.model(), max_turns, "Autonomous mode started");
    engine
        .observer()
        .on_notice(&format!("=== {} autonomous mode ({max_turns} turns) ===", persona.name));

    for iteration in 0..max_turns {
        let prompt = build_system_prompt(&persona.memory)?;
        history = rebuild_history(prompt, &history);

        let outcome = engine
            .run_turn(
                &mut history,
                Some(iteration_prompt(iteration)),
                &tools,
                &persona.name,
            )
            .await?;
        tracing::debug!(
            persona = %persona.name,
            turn = iteration,
            tool_calls = outcome.tool_calls.len(),
            "Autonomous turn finished"
        );
    }

    tracing::info!(persona = %persona.name, turns = max_turns, "Autonomous mode finished");
    Ok(max_turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::engine::{SilentObserver, TurnOptions, CONTEXT_TAIL};
    use crate::llm::ToolCall;
    use crate::testing::MockGateway;
    use serde_json::json;

    fn persona(dir: &tempfile::TempDir) -> PersonaRoot {
        let config =
            AppConfig::from_env(dir.path()).with_overrides(Some(dir.path().to_path_buf()), None);
        PersonaRoot::open(&config, "solo").unwrap()
    }

    fn engine(gateway: &MockGateway) -> TurnEngine<'_> {
        TurnEngine::new(gateway, &SilentObserver, "mock-model", TurnOptions::default())
    }

    #[tokio::test]
    async fn test_runs_exactly_max_turns() {
        let dir = tempfile::tempdir().unwrap();
        let persona = persona(&dir);
        let gateway = MockGateway::new().with_fallback_text("thinking out loud");

        let turns = run_autonomous(&engine(&gateway), &persona, 5).await.unwrap();

        assert_eq!(turns, 5);
        assert_eq!(gateway.chat_calls(), 5);
        let requests = gateway.recorded_requests();
        assert!(requests[0]
            .messages
            .last()
            .unwrap()
            .content()
            .ends_with("Autonomous mode started."));
        for request in &requests {
            assert_eq!(request.messages.iter().filter(|m| m.is_system()).count(), 1);
            assert!(request.messages[0].is_system());
            assert!(request.messages.len() <= CONTEXT_TAIL + 2);
        }
    }

    #[tokio::test]
    async fn test_memory_edit_visible_next_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let persona = persona(&dir);
        let gateway = MockGateway::new().with_fallback_text("ok");
        gateway.queue_tool_calls(
            "",
            vec![ToolCall::from_json(
                "update_memory",
                json!({"category": "projects", "content": "Build a birdhouse", "mode": "replace"}),
            )],
        );
        gateway.queue_text("saved");

        run_autonomous(&engine(&gateway), &persona, 2).await.unwrap();

        let requests = gateway.recorded_requests();
        assert!(!requests[0].messages[0].content().contains("Build a birdhouse"));
        // Third request is the second iteration
        assert!(requests[2].messages[0].content().contains("Build a birdhouse"));
    }

    #[tokio::test]
    async fn test_backend_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let persona = persona(&dir);
        let gateway = MockGateway::new();
        gateway.queue_text("one");

        let err = run_autonomous(&engine(&gateway), &persona, 3).await.unwrap_err();
        assert!(matches!(err, RunError::Llm(_)));
        assert_eq!(gateway.chat_calls(), 2);
    }

    #[test]
    fn test_iteration_prompts() {
        assert!(iteration_prompt(0).ends_with("] Autonomous mode started."));
        for _ in 0..20 {
            let prompt = iteration_prompt(1);
            assert!(prompt.starts_with('['));
            assert!(
                prompt.ends_with(']')
                    || prompt.ends_with("] Keep going.")
                    || prompt.ends_with("] ...")
            );
        }
    }
}
