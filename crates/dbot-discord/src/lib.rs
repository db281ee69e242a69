//! # dbot-discord
//!
//! Discord transport layer: [`DiscordHttp`] implements [`dbot_core::Platform`] over the REST API,
//! [`Gateway`] feeds gateway events to a [`dbot_core::EventHandler`], and
//! [`DiscordHttp::register_commands`] publishes slash commands.
//! No session, storage, or model logic lives here.

mod commands;
mod gateway;
mod model;
mod rest;

pub use commands::command_payload;
pub use gateway::{parse_event, Gateway, GatewayError, GatewayEvent, DEFAULT_GATEWAY_URL, INTENTS};
pub use rest::{DiscordHttp, DEFAULT_API_URL};
