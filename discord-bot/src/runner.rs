//! Wiring: session store, language model and Discord transport around the roleplay handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use dbot_core::{init_tracing, Platform};
use dbot_discord::{DiscordHttp, Gateway};
use llm_client::{mask_token, LlmConfig, OpenAILlmClient};
use roleplay::{command_specs, Roleplay, RoleplayHandler};
use storage::SqliteSessionStore;
use tracing::{error, info, instrument};

use crate::config::BotConfig;

/// Main entry: validate config, init logging, open the store, register commands, then run the
/// gateway until Ctrl-C. The store is closed on the way out.
#[instrument(skip(config))]
pub async fn run_bot(config: BotConfig) -> Result<()> {
    config.validate()?;
    init_tracing(config.log_file())?;

    info!(
        database_url = %config.database_url(),
        model = %config.llm.model(),
        api_key = %mask_token(config.llm.api_key()),
        "Initializing bot"
    );

    let store = Arc::new(
        SqliteSessionStore::open(config.database_url())
            .await
            .context("open session store")?,
    );
    let http = Arc::new(
        DiscordHttp::connect(config.bot_token(), config.discord_api_url())
            .await
            .context("resolve bot identity")?,
    );
    let llm = Arc::new(OpenAILlmClient::from_config(&config.llm));

    if let Err(e) = http.register_commands(&command_specs()).await {
        error!(error = %e, "Failed to register commands; existing registrations stay in effect");
    }

    let roleplay = Arc::new(Roleplay::new(
        store.clone(),
        http.clone(),
        llm,
        config.roleplay.clone(),
    ));
    let handler = Arc::new(RoleplayHandler::new(roleplay));

    let gateway_url = match http.gateway_url().await {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, "Failed to look up gateway URL, using default");
            dbot_discord::DEFAULT_GATEWAY_URL.to_string()
        }
    };
    let gateway = Gateway::new(config.bot_token(), &gateway_url, handler);

    info!(bot = %http.bot_user().name, "Bot started successfully");

    let outcome = tokio::select! {
        result = gateway.run() => result.context("gateway stopped"),
        signal = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            signal.context("listen for shutdown signal")
        }
    };

    store.close().await;
    info!("Session store closed");
    outcome
}

/// Registers the slash commands and exits.
pub async fn register_commands(config: BotConfig) -> Result<()> {
    config.base().validate()?;
    let http = DiscordHttp::connect(config.bot_token(), config.discord_api_url())
        .await
        .context("resolve bot identity")?;
    let count = http
        .register_commands(&command_specs())
        .await
        .context("register commands")?;
    println!("Registered {count} commands for application {}", http.application_id());
    Ok(())
}
