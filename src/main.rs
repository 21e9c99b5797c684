//! # chat-guardian CLI (`guardian`)
//!
//! The `guardian` binary starts the HTTP chat service and provides one-shot
//! commands for exercising the pipeline from a terminal.
//!
//! ## Usage
//!
//! ```bash
//! guardian --config ./config/guardian.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `guardian serve` | Start the HTTP server (`POST /chat`, `GET /health`, `GET /models/info`) |
//! | `guardian ask "<question>"` | Run one question through retrieve → generate → validate |
//! | `guardian check "<text>"` | Evaluate a text against the guardrail rules |
//!
//! The config file is optional — without one the service runs on built-in
//! defaults (mock backend, demo corpus, demo rule set). Environment
//! variables (`LLM_MODEL_TYPE`, `LOCAL_MODEL_PATH`, `API_MODEL_NAME`,
//! `PORT`) override the config once at startup.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use chat_guardian::chat::ChatOrchestrator;
use chat_guardian::config::{apply_env_overrides, load_config, Config};
use chat_guardian::guardrails::GuardrailEngine;
use chat_guardian::models::Message;
use chat_guardian::server::run_server;

/// chat-guardian CLI — a retrieval-augmented chat service with response
/// guardrails.
#[derive(Parser)]
#[command(
    name = "guardian",
    about = "chat-guardian — a retrieval-augmented chat service with response guardrails",
    version,
    long_about = "chat-guardian answers conversations by retrieving relevant context from a \
    document index, generating a reply through a pluggable model backend (mock, local, or API), \
    and passing the result through rule-based safety and quality checks before returning it \
    with cited sources."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/guardian.toml`. Falls back to built-in
    /// defaults when the file does not exist.
    #[arg(long, global = true, default_value = "./config/guardian.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Seeds the demo knowledge base, constructs the configured generation
    /// backend, and serves until terminated.
    Serve,

    /// Ask one question through the full pipeline.
    ///
    /// Retrieves context, generates a reply, applies the guardrails, and
    /// prints the answer with its cited sources.
    Ask {
        /// The question to answer.
        question: String,

        /// Token budget for generation (overrides the configured default).
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Evaluate a text against the guardrail rules.
    ///
    /// Prints the validation report as JSON, followed by the text the
    /// remediation policy would return.
    Check {
        /// The text to evaluate.
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        println!(
            "No config file at {}, using built-in defaults",
            cli.config.display()
        );
        Config::default()
    };
    apply_env_overrides(&mut config)?;

    match cli.command {
        Commands::Serve => {
            let orchestrator = Arc::new(ChatOrchestrator::from_config(&config).await?);
            run_server(&config, orchestrator).await
        }

        Commands::Ask {
            question,
            max_tokens,
        } => {
            let orchestrator = ChatOrchestrator::from_config(&config).await?;
            let budget = max_tokens.unwrap_or(config.generation.max_tokens);

            let response = orchestrator
                .handle(&[Message::user(question)], budget)
                .await?;

            println!("{}", response.message.content);
            if let Some(sources) = &response.sources {
                if !sources.is_empty() {
                    println!();
                    println!("Sources:");
                    for source in sources {
                        println!("  [{}] {}", source.id, source.content);
                    }
                }
            }
            Ok(())
        }

        Commands::Check { text } => {
            let engine = GuardrailEngine::new(config.guardrails.clone());
            let report = engine.report(&text);

            println!("{}", serde_json::to_string_pretty(&report)?);
            println!();
            println!("{}", engine.validate(&text));
            Ok(())
        }
    }
}
