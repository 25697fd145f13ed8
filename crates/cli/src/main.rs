//! Rose CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: write the default config
//! - `chat`: interactive conversation
//! - `turn`: one turn from text or an audio file
//! - `status`: configuration and API key summary
//! - `end`: forget a session

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "rose", about = "Rose, a voice-first AI companion", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration to ~/.rose/config.toml
    Onboard,

    /// Talk with Rose interactively
    Chat {
        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Run a single turn
    Turn {
        #[arg(short, long)]
        session: String,

        /// Text message
        #[arg(short, long, conflicts_with = "audio", required_unless_present = "audio")]
        message: Option<String>,

        /// Recorded voice message
        #[arg(short, long)]
        audio: Option<PathBuf>,
    },

    /// Show configuration status
    Status,

    /// End a session and discard its history
    End {
        #[arg(short, long)]
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { session } => commands::chat::run(session).await?,
        Commands::Turn {
            session,
            message,
            audio,
        } => commands::turn::run(session, message, audio).await?,
        Commands::Status => commands::status::run().await?,
        Commands::End { session } => commands::end::run(session).await?,
    }

    Ok(())
}
