//! EveryoneTagger - Telegram bot to tag everyone in a group
//!
//! Remembers who has posted in each group and mentions them all on `/all`.

mod api;
mod bot;
mod config;
mod models;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "everyone-tagger")]
#[command(about = "Telegram bot that tags everyone in a group", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path of the chats store (overrides CHATS_FILE and config.toml)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (requires the TOKEN environment variable)
    Run,

    /// List known chats from the store
    Chats,

    /// Forget everything stored about a chat
    Forget {
        /// Chat ID (group IDs are negative)
        #[arg(allow_negative_numbers = true)]
        chat_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Run => {
            let config = config::Config::load(cli.data_file)?;
            tracing::info!("Loaded configuration, store at {}", config.data_file.display());
            bot::run(config).await?;
        }
        Commands::Chats => {
            let path = config::Config::data_file_only(cli.data_file)?;
            store::list_chats(&path)?;
        }
        Commands::Forget { chat_id } => {
            let path = config::Config::data_file_only(cli.data_file)?;
            store::forget_chat(&path, chat_id)?;
        }
    }

    Ok(())
}
