//! Binary for the Discord roleplay bot.

use anyhow::Result;
use clap::Parser;
use discord_bot::{load_config, register_commands, run_bot, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => run_bot(load_config(token)?).await,
        Commands::RegisterCommands { token } => register_commands(load_config(token)?).await,
    }
}
