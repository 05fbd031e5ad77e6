//! Command-line surface for the `persona-agent` binary
//!
//! Uses clap derive macros for argument parsing; each subcommand maps to one
//! entry point of the orchestration core.

use crate::autonomous::{self, run_autonomous};
use crate::config::AppConfig;
use crate::conversation::{self, ConversationController, ConversationOutcome};
use crate::engine::{ConsoleObserver, TurnEngine, TurnObserver, TurnOptions};
use crate::error::RunError;
use crate::llm::{GenerateRequest, Message, ModelGateway};
use crate::memory::build_system_prompt;
use crate::persona::{list_personas, PersonaRoot};
use crate::tools::{ToolDispatcher, ToolSet};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use serde_json::{json, Map};
use std::io::Write;
use std::path::PathBuf;

const DEFAULT_PERSONA: &str = "assistant";

/// Run local-model personas with memory, tools and two-persona conversations.
#[derive(Debug, Parser)]
#[command(name = "persona-agent", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data root holding `personas/` and `logs/` [default: current directory]
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Ollama base URL [default: http://localhost:11434]
    #[arg(long, global = true)]
    pub ollama_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List models installed on the backend.
    Models,

    /// Complete a single prompt without tools.
    Generate {
        prompt: String,
        #[command(flatten)]
        model: ModelArgs,
    },

    /// List personas.
    Personas,

    /// Create a persona and seed its memory.
    Create {
        name: String,
    },

    /// Ask one question with the demo tool set (weather and files).
    Ask {
        prompt: String,
        /// Persona whose memory and workspace are used.
        #[arg(short, long, default_value = DEFAULT_PERSONA)]
        persona: String,
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Let a persona act on its own for a number of turns.
    Agent {
        #[arg(short, long, default_value = DEFAULT_PERSONA)]
        persona: String,
        #[arg(long, default_value_t = autonomous::DEFAULT_MAX_TURNS)]
        max_turns: u32,
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Start a conversation between two personas.
    Converse {
        persona_a: String,
        persona_b: String,
        #[arg(long, default_value_t = conversation::DEFAULT_MAX_TURNS)]
        max_turns: u32,
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Resume a conversation from its log file.
    Resume {
        log: PathBuf,
        /// Total turn budget, counting turns already in the log.
        #[arg(long, default_value_t = conversation::DEFAULT_MAX_TURNS)]
        max_turns: u32,
        #[command(flatten)]
        model: ModelArgs,
    },
}

/// Model selection and request flags shared by the model-driven commands
#[derive(Debug, Clone, Default, Args)]
pub struct ModelArgs {
    /// Model name [default: first installed model, or the log's model on resume]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Enable think mode.
    #[arg(long, conflicts_with = "no_think")]
    pub think: bool,

    /// Disable think mode.
    #[arg(long)]
    pub no_think: bool,

    /// Stream responses as they are produced.
    #[arg(long)]
    pub stream: bool,

    /// Sampling temperature (0.0-2.0).
    #[arg(short, long)]
    pub temperature: Option<f64>,
}

impl ModelArgs {
    pub fn think(&self) -> Option<bool> {
        match (self.think, self.no_think) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    pub fn turn_options(&self) -> TurnOptions {
        let options = self.temperature.map(|t| {
            let mut map = Map::new();
            map.insert("temperature".to_string(), json!(t));
            map
        });
        TurnOptions {
            stream: self.stream,
            think: self.think(),
            options,
        }
    }

    /// The requested model, else the first installed one
    pub async fn resolve_model(&self, gateway: &dyn ModelGateway) -> Result<String, RunError> {
        if let Some(model) = &self.model {
            return Ok(model.clone());
        }
        let models = gateway.list_models().await?;
        let first = models.into_iter().next().ok_or(RunError::NoModels)?;
        tracing::info!(model = %first.name, "Using first installed model");
        Ok(first.name)
    }
}

#[allow(clippy::cast_precision_loss)] // display only
fn gigabytes(bytes: u64) -> f64 {
    bytes as f64 / 1_000_000_000.0
}

/// Execute one parsed command
pub async fn run(
    command: Command,
    config: &AppConfig,
    gateway: &dyn ModelGateway,
) -> Result<(), RunError> {
    let observer = ConsoleObserver;

    match command {
        Command::Models => {
            let models = gateway.list_models().await?;
            if models.is_empty() {
                println!("(no models installed)");
            }
            for model in models {
                println!(
                    "{:<40} {:>7.2} GB  {}",
                    model.name,
                    gigabytes(model.size),
                    model.modified_at.as_deref().unwrap_or("")
                );
            }
        }

        Command::Generate { prompt, model } => {
            let request = GenerateRequest {
                model: model.resolve_model(gateway).await?,
                prompt,
                think: model.think(),
            };
            generate(gateway, &request, model.stream, &mut std::io::stdout().lock()).await?;
        }

        Command::Personas => {
            let names = list_personas(config).map_err(|source| RunError::Io {
                context: format!("failed to list {}", config.personas_dir().display()),
                source,
            })?;
            if names.is_empty() {
                println!("(no personas)");
            }
            for name in names {
                println!("{name}");
            }
        }

        Command::Create { name } => {
            let persona = PersonaRoot::open(config, &name)?;
            println!("Persona {} ready at {}", persona.name, persona.root.display());
        }

        Command::Ask {
            prompt,
            persona,
            model,
        } => {
            let persona = PersonaRoot::open(config, &persona)?;
            let engine = TurnEngine::new(
                gateway,
                &observer,
                model.resolve_model(gateway).await?,
                model.turn_options(),
            );
            let tools = ToolDispatcher::new(persona.tool_context()?, ToolSet::Demo);
            let mut history = vec![Message::system(build_system_prompt(&persona.memory)?)];
            engine
                .run_turn(&mut history, Some(prompt), &tools, &persona.name)
                .await?;
        }

        Command::Agent {
            persona,
            max_turns,
            model,
        } => {
            let persona = PersonaRoot::open(config, &persona)?;
            let engine = TurnEngine::new(
                gateway,
                &observer,
                model.resolve_model(gateway).await?,
                model.turn_options(),
            );
            let turns = run_autonomous(&engine, &persona, max_turns).await?;
            observer.on_notice(&format!("=== {turns} turns completed ==="));
        }

        Command::Converse {
            persona_a,
            persona_b,
            max_turns,
            model,
        } => {
            let name = model.resolve_model(gateway).await?;
            let controller = ConversationController::new(
                config,
                gateway,
                &observer,
                model.turn_options(),
                max_turns,
            );
            let outcome = controller.start(&persona_a, &persona_b, &name).await?;
            report(&observer, &outcome);
        }

        Command::Resume {
            log,
            max_turns,
            model,
        } => {
            let controller = ConversationController::new(
                config,
                gateway,
                &observer,
                model.turn_options(),
                max_turns,
            );
            let outcome = controller.resume(&log, model.model.as_deref()).await?;
            report(&observer, &outcome);
        }
    }

    Ok(())
}

/// Print a completion to `out`, streamed piece by piece when asked
async fn generate(
    gateway: &dyn ModelGateway,
    request: &GenerateRequest,
    stream: bool,
    out: &mut impl Write,
) -> Result<(), RunError> {
    let write_failed = |source: std::io::Error| RunError::Io {
        context: "failed to write generated text".to_string(),
        source,
    };

    if !stream {
        let text = gateway.generate(request).await?;
        writeln!(out, "{text}").map_err(write_failed)?;
        return Ok(());
    }

    let mut chunks = gateway.generate_stream(request).await?;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if let Some(thinking) = chunk.thinking.as_deref().filter(|t| !t.is_empty()) {
            write!(out, "\x1b[2m{thinking}\x1b[0m").map_err(write_failed)?;
        }
        write!(out, "{}", chunk.response).map_err(write_failed)?;
        out.flush().map_err(write_failed)?;
        if chunk.done {
            break;
        }
    }
    writeln!(out).map_err(write_failed)
}

fn report(observer: &dyn TurnObserver, outcome: &ConversationOutcome) {
    observer.on_notice(&format!(
        "=== {} turns, ended by {}; log at {} ===",
        outcome.turns,
        outcome.reason,
        outcome.log_path.display()
    ));
}
