//! Bot configuration: BaseConfig (Discord + log + DB) plus the LLM and roleplay settings.

mod base;
mod bot_config;


pub use base::BaseConfig;
pub use bot_config::BotConfig;
