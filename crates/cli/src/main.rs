//! Rada CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: write a default config and a sample archetype file
//! - `ask`: ask one archetype (single message or interactive)
//! - `council`: run the RADA council on a question
//! - `archetypes`: list configured archetypes
//! - `doctor`: diagnose configuration and credentials

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "rada",
    about = "Rada - archetype conversations and council discussions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.rada/config.toml)
    #[arg(long, global = true, env = "RADA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and a sample archetype file
    Onboard,

    /// Ask a single archetype
    Ask {
        /// Archetype key
        archetype: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation id for contextual answers
        #[arg(short, long)]
        conversation: Option<String>,

        #[command(flatten)]
        params: commands::ask::ParamArgs,
    },

    /// Run a council discussion
    Council {
        /// The question put to the council
        question: String,

        /// Participants (repeatable, at most 3; defaults to the first three)
        #[arg(short = 'w', long = "with")]
        participants: Vec<String>,

        /// Conversation id for contextual answers
        #[arg(short, long)]
        conversation: Option<String>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured archetypes
    Archetypes,

    /// Diagnose configuration and credentials
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path)?,
        Commands::Ask {
            archetype,
            message,
            conversation,
            params,
        } => commands::ask::run(config_path, &archetype, message, conversation, params).await?,
        Commands::Council {
            question,
            participants,
            conversation,
            json,
        } => {
            commands::council::run(config_path, &question, participants, conversation, json)
                .await?
        }
        Commands::Archetypes => commands::archetypes::run(config_path)?,
        Commands::Doctor => commands::doctor::run(config_path)?,
    }

    Ok(())
}
