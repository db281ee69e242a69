//! # Roleplay
//!
//! Session lifecycle and message relay for roleplay channels.
//!
//! - [`Roleplay`] runs the `roleplay-start` / `roleplay-stop` / `roleplay-edit` commands and relays
//!   messages posted in a session channel to the language model, publishing the reply under the
//!   session persona through a channel webhook.
//! - [`RoleplayHandler`] adapts [`Roleplay`] to [`dbot_core::EventHandler`]: it parses slash and
//!   prefix commands, dispatches them, and reports every error back to the invoker.
//!
//! ## External interactions
//!
//! - **Chat platform** through [`dbot_core::Platform`].
//! - **Session store** through [`storage::SessionStore`].
//! - **Language model** through [`llm_client::LlmClient`].

pub mod commands;
pub mod config;
pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod transcript;
pub mod window;

pub use commands::{command_specs, RoleplayCommand};
pub use config::RoleplayConfig;
pub use error::RoleplayError;
pub use handler::RoleplayHandler;
pub use orchestrator::{RelayOutcome, Roleplay};
