//! Core types: ids, user, channel message, webhook, command context, and the EventHandler trait.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::CommandInvocation;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

snowflake_id!(
    /// A platform user (human or bot).
    UserId
);
snowflake_id!(
    /// A server ("guild").
    GuildId
);
snowflake_id!(ChannelId);
snowflake_id!(MessageId);
snowflake_id!(WebhookId);

/// User identity as the bot sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Unique account name.
    pub name: String,
    /// Display name shown in the client, when set.
    pub global_name: Option<String>,
    pub bot: bool,
}

impl User {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            name: name.into(),
            global_name: None,
            bot: false,
        }
    }

    /// Name shown in the client: the global display name if set, else the account name.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.name)
    }

    /// Inline mention markup that pings the user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// One message from a channel's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// `None` for direct messages.
    pub guild_id: Option<GuildId>,
    pub author: User,
    pub content: String,
    /// Set when the message was published through a webhook.
    pub webhook_id: Option<WebhookId>,
}

/// A channel-scoped impersonation target: publishes under an arbitrary name and avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,
    pub channel_id: ChannelId,
    pub name: Option<String>,
    /// User that created the webhook; `None` when the platform does not expose it.
    pub owner_id: Option<UserId>,
    /// Execution token; only visible to the owner.
    pub token: Option<String>,
}

impl Webhook {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == Some(user_id)
    }
}

/// Where the reply to a command goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// Slash command not yet acknowledged: reply through the interaction callback.
    Interaction { id: String, token: String },
    /// Slash command already acknowledged with a deferred response; `ephemeral` is the
    /// visibility the deferral fixed for the original response.
    Deferred { token: String, ephemeral: bool },
    /// Prefix command typed in a channel: reply as a plain channel message.
    Channel(ChannelId),
}

/// Who invoked a command, where, and how to answer.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub user: User,
    /// `None` when invoked outside a server.
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub reply: ReplyTarget,
}

/// Receives inbound platform events. The transport spawns one task per event, so
/// implementations must tolerate concurrent calls.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// A named command with typed options was invoked.
    async fn on_command(&self, ctx: CommandContext, invocation: CommandInvocation);

    /// A message was posted in a channel the bot can read.
    async fn on_message(&self, message: ChannelMessage);
}
