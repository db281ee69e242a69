//! The chat platform as seen by the bot.
//!
//! [`Platform`] is transport-agnostic; dbot-discord implements it over the Discord REST API and
//! tests implement it in memory.

use std::path::Path;

use async_trait::async_trait;

use crate::error::PlatformResult;
use crate::types::{
    ChannelId, ChannelMessage, CommandContext, GuildId, MessageId, ReplyTarget, User, UserId,
    Webhook,
};

/// Whose permissions an overwrite changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteTarget {
    /// The server-wide default role.
    Everyone,
    Member(UserId),
}

/// Explicit allow (`true`) or deny (`false`) of read and write access for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub read: bool,
    pub write: bool,
}

impl PermissionOverwrite {
    pub fn read_only(target: OverwriteTarget) -> Self {
        Self {
            target,
            read: true,
            write: false,
        }
    }

    pub fn read_write(target: OverwriteTarget) -> Self {
        Self {
            target,
            read: true,
            write: true,
        }
    }
}

/// Parameters for a new text channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTextChannel {
    pub name: String,
    pub category_id: Option<ChannelId>,
    pub overwrites: Vec<PermissionOverwrite>,
    /// Minimum seconds between two messages of the same member; 0 disables.
    pub slowmode_secs: u32,
}

/// Operations the bot needs from the chat platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// The bot's own account.
    fn bot_user(&self) -> User;

    /// Acknowledges a command before slow work starts, so the platform keeps the reply slot
    /// open. Returns the target later replies must use; targets without a deadline come back
    /// unchanged.
    async fn acknowledge(&self, ctx: &CommandContext, ephemeral: bool)
        -> PlatformResult<ReplyTarget>;

    /// Answers the invoker of a command. `ephemeral` is a hint; targets that cannot hide
    /// replies post them normally.
    async fn respond(&self, ctx: &CommandContext, text: &str, ephemeral: bool)
        -> PlatformResult<()>;

    /// Whether the channel still exists. Must return `Ok(false)` rather than an error for a
    /// deleted channel.
    async fn channel_exists(&self, channel_id: ChannelId) -> PlatformResult<bool>;

    /// Finds a category channel in the guild by exact name.
    async fn find_category(&self, guild_id: GuildId, name: &str)
        -> PlatformResult<Option<ChannelId>>;

    async fn create_category(&self, guild_id: GuildId, name: &str) -> PlatformResult<ChannelId>;

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        channel: &NewTextChannel,
    ) -> PlatformResult<ChannelId>;

    async fn delete_channel(&self, channel_id: ChannelId) -> PlatformResult<()>;

    /// Posts as the bot; returns the new message id.
    async fn send_message(&self, channel_id: ChannelId, text: &str) -> PlatformResult<MessageId>;

    /// Edits a message the bot itself authored.
    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        text: &str,
    ) -> PlatformResult<()>;

    /// Up to `limit` most recent messages, newest first.
    async fn message_history(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> PlatformResult<Vec<ChannelMessage>>;

    /// Shows the "bot is typing" indicator.
    async fn trigger_typing(&self, channel_id: ChannelId) -> PlatformResult<()>;

    async fn channel_webhooks(&self, channel_id: ChannelId) -> PlatformResult<Vec<Webhook>>;

    async fn create_webhook(&self, channel_id: ChannelId, name: &str) -> PlatformResult<Webhook>;

    async fn delete_webhook(&self, webhook: &Webhook) -> PlatformResult<()>;

    /// Publishes through the webhook under `username` with an optional avatar.
    async fn execute_webhook(
        &self,
        webhook: &Webhook,
        content: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> PlatformResult<MessageId>;

    /// Edits a message previously published through the webhook.
    async fn edit_webhook_message(
        &self,
        webhook: &Webhook,
        message_id: MessageId,
        content: &str,
    ) -> PlatformResult<()>;

    /// Sends a direct message with a file attachment. Returns
    /// [`crate::PlatformError::Forbidden`] when the user does not accept DMs.
    async fn send_direct_file(
        &self,
        user_id: UserId,
        content: &str,
        file: &Path,
    ) -> PlatformResult<()>;
}
