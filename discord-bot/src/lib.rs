//! # discord-bot
//!
//! Roleplay bot binary support: [`BotConfig`] from env, the [`Cli`], and [`run_bot`], which wires
//! the SQLite session store, the OpenAI-compatible model client and the Discord transport
//! around [`roleplay::RoleplayHandler`].

pub mod cli;
pub mod config;
pub mod runner;

pub use cli::{load_config, Cli, Commands};
pub use config::{BaseConfig, BotConfig};
pub use runner::{register_commands, run_bot};
