//! Two-persona conversation controller
//!
//! Alternates turns between persona A (even turns) and persona B (odd turns),
//! closes on mutual `end_conversation` consensus or when the turn budget is
//! spent, then gives each persona one reflection turn. Every event is logged
//! before the next one starts, so a crashed run can be resumed from its log.

mod log;
mod resume;

pub use log::{read_records, ConversationLog, LogError, LogEvent};
pub use resume::{derive_resume_point, ResumeError};

use crate::config::AppConfig;
use crate::engine::{rebuild_history, TurnEngine, TurnObserver, TurnOptions, TurnOutcome};
use crate::error::RunError;
use crate::llm::{Message, ModelGateway};
use crate::memory::build_conversation_prompt;
use crate::persona::PersonaRoot;
use crate::state_machine::{
    transition, ConvState, ConversationState, Effect, EndReason, Event, Speaker,
};
use crate::tools::{ToolDispatcher, ToolSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_TURNS: u32 = 20;

const REFLECTION_PROMPT: &str =
    "(The conversation has ended. Reflect on it and record anything you want to remember in your memory.)";

fn opening_line(other: &str) -> String {
    format!("(The conversation with {other} has started. You speak first.)")
}

/// How a conversation run finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOutcome {
    pub log_path: PathBuf,
    pub reason: EndReason,
    /// Turns played in total, including those from before a resume
    pub turns: u32,
}

/// One side of the conversation with its own running history
struct Participant {
    persona: PersonaRoot,
    other: String,
    tools: ToolDispatcher,
    reflection_tools: ToolDispatcher,
    history: Vec<Message>,
}

impl Participant {
    fn open(config: &AppConfig, name: &str, other: &str) -> Result<Self, RunError> {
        let persona = PersonaRoot::open(config, name)?;
        let ctx = persona.tool_context()?;
        Ok(Self {
            tools: ToolDispatcher::new(ctx.clone(), ToolSet::Conversation),
            reflection_tools: ToolDispatcher::new(ctx, ToolSet::Reflection),
            other: other.to_string(),
            history: Vec::new(),
            persona,
        })
    }

    /// Refresh the system prompt from memory and trim to the context tail
    fn refresh(&mut self) -> Result<(), RunError> {
        let prompt = build_conversation_prompt(&self.persona.memory, &self.other)?;
        self.history = rebuild_history(prompt, &self.history);
        Ok(())
    }

    async fn speak(
        &mut self,
        engine: &TurnEngine<'_>,
        user_content: String,
    ) -> Result<TurnOutcome, RunError> {
        self.refresh()?;
        let outcome = engine
            .run_turn(
                &mut self.history,
                Some(user_content),
                &self.tools,
                &self.persona.name,
            )
            .await?;
        Ok(outcome)
    }

    async fn reflect(&mut self, engine: &TurnEngine<'_>) -> Result<TurnOutcome, RunError> {
        self.refresh()?;
        let label = format!("{} (reflection)", self.persona.name);
        let outcome = engine
            .run_turn(
                &mut self.history,
                Some(REFLECTION_PROMPT.to_string()),
                &self.reflection_tools,
                &label,
            )
            .await?;
        Ok(outcome)
    }
}

fn slot(speaker: Speaker) -> usize {
    match speaker {
        Speaker::A => 0,
        Speaker::B => 1,
    }
}

/// Runs conversations between two personas of one data root
pub struct ConversationController<'a> {
    config: &'a AppConfig,
    gateway: &'a dyn ModelGateway,
    observer: &'a dyn TurnObserver,
    options: TurnOptions,
    max_turns: u32,
}

impl<'a> ConversationController<'a> {
    pub fn new(
        config: &'a AppConfig,
        gateway: &'a dyn ModelGateway,
        observer: &'a dyn TurnObserver,
        options: TurnOptions,
        max_turns: u32,
    ) -> Self {
        Self {
            config,
            gateway,
            observer,
            options,
            max_turns,
        }
    }

    /// Start a new conversation, A speaking first
    pub async fn start(
        &self,
        persona_a: &str,
        persona_b: &str,
        model: &str,
    ) -> Result<ConversationOutcome, RunError> {
        if persona_a == persona_b {
            return Err(RunError::SamePersona(persona_a.to_string()));
        }
        let mut participants = [
            Participant::open(self.config, persona_a, persona_b)?,
            Participant::open(self.config, persona_b, persona_a)?,
        ];

        let mut log = ConversationLog::create(&self.config.logs_dir(), persona_a, persona_b)?;
        log.append(LogEvent::Start {
            persona_a: persona_a.to_string(),
            persona_b: persona_b.to_string(),
            model: model.to_string(),
        })?;
        tracing::info!(persona_a, persona_b, model, log = %log.path().display(), "Conversation started");
        self.observer
            .on_notice(&format!("=== {persona_a} x {persona_b} ({model}) ==="));
        self.observer
            .on_notice(&format!("Log: {}", log.path().display()));

        let engine = TurnEngine::new(self.gateway, self.observer, model, self.options.clone());
        self.drive(
            &engine,
            &mut log,
            &mut participants,
            ConversationState::new(),
            None,
            None,
            vec![Speaker::A, Speaker::B],
        )
        .await
    }

    /// Continue a logged conversation, appending to the same file.
    ///
    /// `model` overrides the model named in the log's start record.
    pub async fn resume(
        &self,
        log_path: &Path,
        model: Option<&str>,
    ) -> Result<ConversationOutcome, RunError> {
        let records = read_records(log_path)?;
        let point = derive_resume_point(&records)?;
        let model = model.unwrap_or(&point.model);

        let mut participants = [
            Participant::open(self.config, &point.persona_a, &point.persona_b)?,
            Participant::open(self.config, &point.persona_b, &point.persona_a)?,
        ];
        let mut log = ConversationLog::open_append(log_path)?;
        tracing::info!(
            persona_a = %point.persona_a,
            persona_b = %point.persona_b,
            model,
            turn = point.state.next_turn,
            pending_end = point.state.pending_end(),
            "Resuming conversation"
        );
        self.observer.on_notice(&format!(
            "=== {} x {} ({model}), resuming at turn {} ===",
            point.persona_a, point.persona_b, point.state.next_turn
        ));

        let engine = TurnEngine::new(self.gateway, self.observer, model, self.options.clone());
        let reflections = point.pending_reflections();
        self.drive(
            &engine,
            &mut log,
            &mut participants,
            point.state,
            point.last_utterance,
            point.recorded_end,
            reflections,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        engine: &TurnEngine<'_>,
        log: &mut ConversationLog,
        participants: &mut [Participant; 2],
        state: ConversationState,
        last_utterance: Option<String>,
        recorded_end: Option<EndReason>,
        reflections: Vec<Speaker>,
    ) -> Result<ConversationOutcome, RunError> {
        let (state, reason, effects) = match (recorded_end, state.phase) {
            (Some(reason), _) => (state, reason, vec![Effect::BeginReflection]),
            (None, ConvState::Closed { reason }) => {
                (state, reason, Effect::closing(reason).to_vec())
            }
            (None, ConvState::Open { .. }) => {
                self.play_turns(engine, log, participants, state, last_utterance)
                    .await?
            }
        };

        for effect in effects {
            match effect {
                Effect::RecordEnd { reason } => {
                    let max_turns = (reason == EndReason::MaxTurns).then_some(self.max_turns);
                    log.append(LogEvent::End { reason, max_turns })?;
                    tracing::info!(%reason, turns = state.next_turn, "Conversation ended");
                    self.observer
                        .on_notice(&format!("=== Conversation ended ({reason}) ==="));
                }
                Effect::BeginReflection => {
                    for &speaker in &reflections {
                        let participant = &mut participants[slot(speaker)];
                        let outcome = participant.reflect(engine).await?;
                        log.append(LogEvent::Reflection {
                            persona: participant.persona.name.clone(),
                            content: outcome.content,
                            tool_calls: outcome.tool_calls,
                        })?;
                    }
                }
            }
        }

        Ok(ConversationOutcome {
            log_path: log.path().to_path_buf(),
            reason,
            turns: state.next_turn,
        })
    }

    /// Alternate turns until the state machine closes
    async fn play_turns(
        &self,
        engine: &TurnEngine<'_>,
        log: &mut ConversationLog,
        participants: &mut [Participant; 2],
        mut state: ConversationState,
        mut last_utterance: Option<String>,
    ) -> Result<(ConversationState, EndReason, Vec<Effect>), RunError> {
        loop {
            let event = if state.next_turn >= self.max_turns {
                Event::TurnBudgetExhausted
            } else {
                let turn = state.next_turn;
                let participant = &mut participants[slot(state.speaker())];
                let user_content = last_utterance
                    .take()
                    .unwrap_or_else(|| opening_line(&participant.other));

                let outcome = participant.speak(engine, user_content).await?;
                let ended = outcome.requested_end();
                tracing::debug!(turn, persona = %participant.persona.name, ended, "Turn finished");

                log.append(LogEvent::Turn {
                    turn,
                    persona: participant.persona.name.clone(),
                    content: outcome.content.clone(),
                    tool_calls: outcome.tool_calls,
                })?;
                last_utterance = Some(outcome.content);
                Event::TurnCompleted { turn, ended }
            };

            let result = transition(&state, event)?;
            state = result.new_state;
            if let ConvState::Closed { reason } = state.phase {
                return Ok((state, reason, result.effects));
            }
        }
    }
}
