//! Base config: Discord connection, logging, database. Loaded from env.

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_DATABASE_URL: &str = "./roleplay.db";
pub const DEFAULT_LOG_FILE: &str = "logs/discord-bot.log";
pub const DEFAULT_COMMAND_PREFIX: &str = "!";

/// Base config: Discord-related, logging, database only.
#[derive(Debug, Clone)]
pub struct BaseConfig {
    /// DISCORD_TOKEN
    pub bot_token: String,
    /// DISCORD_API_URL
    pub discord_api_url: String,
    /// COMMAND_PREFIX; empty disables text commands
    pub command_prefix: String,
    /// Log file path
    pub log_file: String,
    /// Session store database URL (SQLite file path or `sqlite:` URL)
    pub database_url: String,
}

impl BaseConfig {
    /// Load from environment variables. `token` overrides DISCORD_TOKEN if provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?,
        };
        let discord_api_url = env::var("DISCORD_API_URL")
            .unwrap_or_else(|_| dbot_discord::DEFAULT_API_URL.to_string());
        let command_prefix =
            env::var("COMMAND_PREFIX").unwrap_or_else(|_| DEFAULT_COMMAND_PREFIX.to_string());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        Ok(Self {
            bot_token,
            discord_api_url,
            command_prefix,
            log_file,
            database_url,
        })
    }

    /// Validate config (e.g. discord_api_url must be a valid URL, token non-empty).
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is empty");
        }
        if reqwest::Url::parse(&self.discord_api_url).is_err() {
            anyhow::bail!(
                "DISCORD_API_URL is set but not a valid URL: {}",
                self.discord_api_url
            );
        }
        Ok(())
    }
}
