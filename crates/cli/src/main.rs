//! ojisan CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize the config file
//! - `chat`    — Interactive conversation or single-sentence mode

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ojisan",
    about = "📱 おじさん構文ジェネレーター — transforms sentences into ojisan-speak",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configuration file
    Onboard,

    /// Converse with the persona
    Chat {
        /// Transform a single sentence instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Override the configured model (server-side id, preset alias, or GGUF path)
        #[arg(long)]
        model: Option<String>,

        /// Run the model in-process instead of over HTTP (requires the "local" build)
        #[arg(long)]
        local: bool,

        /// Write the conversation history as JSON on exit
        #[arg(long, value_name = "PATH")]
        transcript: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
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
        Commands::Chat {
            message,
            model,
            local,
            transcript,
        } => commands::chat::run(message, model, local, transcript).await?,
    }

    Ok(())
}
