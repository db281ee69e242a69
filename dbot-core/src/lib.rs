//! # dbot-core
//!
//! Core types and traits for the roleplay bot: ids, [`User`], [`ChannelMessage`], [`Webhook`],
//! the [`Platform`] trait (everything the bot asks of the chat platform), the [`EventHandler`]
//! trait (everything the platform hands to the bot), command descriptors, and tracing
//! initialization. Transport-agnostic; implemented by dbot-discord and consumed by roleplay.

pub mod command;
pub mod error;
pub mod logger;
pub mod platform;
pub mod types;

pub use command::{
    CommandInvocation, CommandOptionKind, CommandOptionSpec, CommandSpec, OptionValue,
};
pub use error::{PlatformError, PlatformResult};
pub use logger::init_tracing;
pub use platform::{NewTextChannel, PermissionOverwrite, OverwriteTarget, Platform};
pub use types::{
    ChannelId, ChannelMessage, CommandContext, EventHandler, GuildId, MessageId, ReplyTarget,
    User, UserId, Webhook, WebhookId,
};
