//! Persona agent - local-model personas with memory and tools
//!
//! Drives tool-calling turns against an Ollama backend for one persona at a
//! time, or for two personas talking to each other until both agree to stop.

mod autonomous;
mod cli;
mod config;
mod conversation;
mod engine;
mod error;
mod llm;
mod memory;
mod persona;
mod state_machine;
mod tools;

#[cfg(test)]
mod testing;

use clap::Parser;
use cli::Cli;
use config::AppConfig;
use llm::{LoggingGateway, OllamaClient};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; stdout is reserved for the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_agent=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            tracing::error!(error = %e, "Cannot determine working directory");
            return ExitCode::FAILURE;
        }
    };
    let config = AppConfig::from_env(&cwd).with_overrides(cli.home, cli.ollama_url.as_deref());
    tracing::debug!(home = %config.home.display(), ollama = %config.ollama.base_url, "Configuration loaded");

    let client = match OllamaClient::new(&config.ollama) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build backend client");
            return ExitCode::FAILURE;
        }
    };
    let gateway = LoggingGateway::new(Arc::new(client));

    match cli::run(cli.command, &config, &gateway).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
