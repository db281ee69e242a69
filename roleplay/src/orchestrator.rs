//! Session orchestration.
//!
//! Per (user, guild): no session → active session → (exporting) → no session. Commands reply
//! to the invoker themselves on success; on failure they return a [`RoleplayError`] and the
//! caller reports it.

use std::sync::Arc;

use dbot_core::{
    ChannelId, ChannelMessage, CommandContext, GuildId, MessageId, NewTextChannel,
    OverwriteTarget, PermissionOverwrite, Platform, User, Webhook,
};
use llm_client::LlmClient;
use storage::{Session, SessionStore, StorageError};
use tracing::{debug, error, info, instrument, warn};

use crate::config::RoleplayConfig;
use crate::error::RoleplayError;
use crate::transcript::{transcript_entries, ExportFile};
use crate::window::{build_request, truncate_reply};

pub const START_ACK: &str = "Roleplay created! I have pinged you in that channel";
pub const STOP_ACK: &str = "Roleplay deleted!";
pub const EDIT_ACK: &str = "My last reply has been updated.";
pub const EXPORT_CAPTION: &str = "Here is your exported roleplay chat history.";

/// What the relay did with an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Posted by the bot or one of its persona webhooks.
    OwnMessage,
    NotInGuild,
    /// The guild has never had a session started in it.
    GuildNotEnrolled,
    /// The author has no session in this channel.
    NoSession,
    Published(MessageId),
}

pub struct Roleplay {
    store: Arc<dyn SessionStore>,
    platform: Arc<dyn Platform>,
    llm: Arc<dyn LlmClient>,
    config: RoleplayConfig,
}

impl Roleplay {
    pub fn new(
        store: Arc<dyn SessionStore>,
        platform: Arc<dyn Platform>,
        llm: Arc<dyn LlmClient>,
        config: RoleplayConfig,
    ) -> Self {
        Self {
            store,
            platform,
            llm,
            config,
        }
    }

    /// Text-command prefix; `None` when prefix commands are disabled.
    pub fn command_prefix(&self) -> Option<&str> {
        self.config
            .command_prefix
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    /// Acknowledges a command before it runs and returns the context replies must use. When
    /// the acknowledgement fails the original context is kept.
    pub async fn acknowledge(&self, ctx: CommandContext, ephemeral: bool) -> CommandContext {
        match self.platform.acknowledge(&ctx, ephemeral).await {
            Ok(reply) => CommandContext { reply, ..ctx },
            Err(e) => {
                warn!(user_id = %ctx.user.id, error = %e, "Failed to acknowledge command");
                ctx
            }
        }
    }

    /// Replies to the invoker. A failed reply is logged, never propagated: by the time a
    /// command replies its store mutation is already committed.
    pub async fn reply(&self, ctx: &CommandContext, text: &str, ephemeral: bool) {
        if let Err(e) = self.platform.respond(ctx, text, ephemeral).await {
            warn!(user_id = %ctx.user.id, error = %e, "Failed to reply to command");
        }
    }

    /// Creates a session channel for the invoker and records the session.
    #[instrument(skip_all, fields(user_id = %ctx.user.id, guild_id = ?ctx.guild_id))]
    pub async fn start(
        &self,
        ctx: &CommandContext,
        scenario: &str,
        persona_name: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<Session, RoleplayError> {
        let guild_id = ctx.guild_id.ok_or(RoleplayError::GuildOnly)?;
        let user = &ctx.user;

        self.store
            .ensure_guild(guild_id, self.config.guild_credential.as_deref())
            .await?;

        if let Some(existing) = self.store.get_session(user.id, guild_id).await? {
            if self.platform.channel_exists(existing.channel_id).await? {
                return Err(RoleplayError::DuplicateSession);
            }
            info!(
                channel_id = %existing.channel_id,
                "Reclaiming session whose channel no longer exists"
            );
            self.store.delete_session(user.id, guild_id).await?;
        }

        let bot = self.platform.bot_user();
        let category_id = self.ensure_category(guild_id).await?;
        let channel = NewTextChannel {
            name: channel_name_for(&user.name),
            category_id: Some(category_id),
            overwrites: vec![
                PermissionOverwrite::read_only(OverwriteTarget::Everyone),
                PermissionOverwrite::read_write(OverwriteTarget::Member(user.id)),
                PermissionOverwrite::read_write(OverwriteTarget::Member(bot.id)),
            ],
            slowmode_secs: self.config.slowmode_secs,
        };
        let channel_id = self.platform.create_text_channel(guild_id, &channel).await?;

        let session = Session::new(
            user.id,
            guild_id,
            channel_id,
            scenario,
            non_empty(image_url).unwrap_or(&self.config.default_image_url),
            non_empty(persona_name).unwrap_or(bot.display_name()),
        );

        if let Err(e) = self.store.create_session(&session).await {
            // Nothing references the new channel; do not leave it behind.
            if let Err(del) = self.platform.delete_channel(channel_id).await {
                warn!(channel_id = %channel_id, error = %del, "Failed to remove orphaned channel");
            }
            return Err(match e {
                StorageError::AlreadyExists(_) => RoleplayError::DuplicateSession,
                other => other.into(),
            });
        }

        info!(
            channel_id = %channel_id,
            persona = %session.persona_name,
            "Roleplay session started"
        );

        self.reply(ctx, START_ACK, false).await;
        let intro = format!(
            "{}, welcome to your roleplay session! Here's the description based on your prompt: {}",
            user.mention(),
            scenario
        );
        if let Err(e) = self.platform.send_message(channel_id, &intro).await {
            warn!(channel_id = %channel_id, error = %e, "Failed to post introduction");
        }

        Ok(session)
    }

    /// Ends the invoker's session, optionally sending them the transcript first.
    #[instrument(skip_all, fields(user_id = %ctx.user.id, guild_id = ?ctx.guild_id, export = export))]
    pub async fn stop(&self, ctx: &CommandContext, export: bool) -> Result<(), RoleplayError> {
        let guild_id = ctx.guild_id.ok_or(RoleplayError::GuildOnly)?;
        let session = self.active_session(&ctx.user, guild_id, "stop").await?;

        if export {
            self.export_transcript(&ctx.user, &session).await?;
        }

        self.store.delete_session(ctx.user.id, guild_id).await?;
        self.reply(ctx, STOP_ACK, false).await;

        self.remove_persona_webhooks(session.channel_id).await;
        if let Err(e) = self.platform.delete_channel(session.channel_id).await {
            warn!(channel_id = %session.channel_id, error = %e, "Failed to delete session channel");
        }

        info!(channel_id = %session.channel_id, "Roleplay session stopped");
        Ok(())
    }

    /// Replaces the text of the bot's most recent message in the session channel.
    #[instrument(skip_all, fields(user_id = %ctx.user.id, guild_id = ?ctx.guild_id))]
    pub async fn edit(&self, ctx: &CommandContext, new_reply: &str) -> Result<(), RoleplayError> {
        let guild_id = ctx.guild_id.ok_or(RoleplayError::GuildOnly)?;
        let session = self.active_session(&ctx.user, guild_id, "edit").await?;
        let channel_id = session.channel_id;

        let hooks = self.persona_webhooks(channel_id).await?;
        let bot_id = self.platform.bot_user().id;
        let history = self
            .platform
            .message_history(channel_id, self.config.edit_scan_limit)
            .await?;

        let target = history
            .iter()
            .find(|m| {
                m.author.id == bot_id
                    || m.webhook_id
                        .is_some_and(|id| hooks.iter().any(|hook| hook.id == id))
            })
            .ok_or(RoleplayError::BotMessageNotFound)?;

        let via_hook = target
            .webhook_id
            .and_then(|id| hooks.iter().find(|hook| hook.id == id));
        match via_hook {
            Some(hook) => {
                self.platform
                    .edit_webhook_message(hook, target.id, new_reply)
                    .await?
            }
            None => {
                self.platform
                    .edit_message(channel_id, target.id, new_reply)
                    .await?
            }
        }

        self.store
            .update_last_reply(ctx.user.id, guild_id, new_reply)
            .await?;
        info!(channel_id = %channel_id, message_id = %target.id, "Edited last reply");

        self.reply(ctx, EDIT_ACK, true).await;
        Ok(())
    }

    /// Answers a message posted in a session channel as the session persona.
    ///
    /// Model failures are reported in the channel before being returned.
    #[instrument(skip_all, fields(channel_id = %message.channel_id, user_id = %message.author.id))]
    pub async fn relay(&self, message: &ChannelMessage) -> Result<RelayOutcome, RoleplayError> {
        let bot = self.platform.bot_user();
        if message.author.id == bot.id || message.webhook_id.is_some() {
            return Ok(RelayOutcome::OwnMessage);
        }
        let Some(guild_id) = message.guild_id else {
            return Ok(RelayOutcome::NotInGuild);
        };
        if self.store.guild(guild_id).await?.is_none() {
            return Ok(RelayOutcome::GuildNotEnrolled);
        }
        let Some(session) = self
            .store
            .find_session_by_channel(message.author.id, message.channel_id)
            .await?
        else {
            return Ok(RelayOutcome::NoSession);
        };

        if let Err(e) = self.platform.trigger_typing(session.channel_id).await {
            debug!(error = %e, "Failed to trigger typing indicator");
        }

        let history = self
            .platform
            .message_history(session.channel_id, self.config.relay_history_limit)
            .await?;
        let request = build_request(&session, &history, self.command_prefix());
        debug!(turns = request.len(), "Built conversation window");

        let reply = match self.llm.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Language model call failed");
                let err = RoleplayError::BackendCallFailure(e.to_string());
                if let Err(send_err) = self
                    .platform
                    .send_message(session.channel_id, &err.user_message())
                    .await
                {
                    warn!(error = %send_err, "Failed to report model failure in channel");
                }
                return Err(err);
            }
        };

        let hook = self.persona_webhook(&session).await?;
        let content = truncate_reply(&reply, self.config.reply_max_chars);
        let message_id = self
            .platform
            .execute_webhook(
                &hook,
                &content,
                &session.persona_name,
                avatar_url(&session.image_url),
            )
            .await?;

        info!(
            persona = %session.persona_name,
            reply_chars = content.chars().count(),
            "Published persona reply"
        );
        Ok(RelayOutcome::Published(message_id))
    }

    /// The invoker's session, provided its channel still exists.
    async fn active_session(
        &self,
        user: &User,
        guild_id: GuildId,
        action: &'static str,
    ) -> Result<Session, RoleplayError> {
        let session = self
            .store
            .get_session(user.id, guild_id)
            .await?
            .ok_or(RoleplayError::SessionNotFound(action))?;

        if !self.platform.channel_exists(session.channel_id).await? {
            if self.config.reconcile_vanished_channels {
                self.store.delete_session(user.id, guild_id).await?;
                info!(channel_id = %session.channel_id, "Removed session whose channel vanished");
            }
            return Err(RoleplayError::ChannelGone);
        }
        Ok(session)
    }

    async fn export_transcript(&self, user: &User, session: &Session) -> Result<(), RoleplayError> {
        let history = self
            .platform
            .message_history(session.channel_id, self.config.export_history_limit)
            .await?;
        let entries = transcript_entries(&history, session.user_id, self.command_prefix());

        let file = ExportFile::write(&self.config.export_dir, user.id, &entries).await?;
        let sent = self
            .platform
            .send_direct_file(user.id, EXPORT_CAPTION, file.path())
            .await;
        drop(file);

        match sent {
            Ok(()) => {
                info!(entries = entries.len(), "Sent transcript");
                Ok(())
            }
            Err(e) if e.is_forbidden() => {
                warn!(error = %e, "Transcript DM refused");
                Err(RoleplayError::DeliveryRefused)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_category(&self, guild_id: GuildId) -> Result<ChannelId, RoleplayError> {
        let name = &self.config.category_name;
        if let Some(id) = self.platform.find_category(guild_id, name).await? {
            return Ok(id);
        }
        info!(guild_id = %guild_id, category = %name, "Creating roleplay category");
        Ok(self.platform.create_category(guild_id, name).await?)
    }

    /// Webhooks in the channel created by the bot.
    async fn persona_webhooks(&self, channel_id: ChannelId) -> Result<Vec<Webhook>, RoleplayError> {
        let bot_id = self.platform.bot_user().id;
        let hooks = self.platform.channel_webhooks(channel_id).await?;
        Ok(hooks.into_iter().filter(|h| h.is_owned_by(bot_id)).collect())
    }

    /// Reuses the bot's webhook in the session channel or creates one named after the persona.
    async fn persona_webhook(&self, session: &Session) -> Result<Webhook, RoleplayError> {
        let channel_id = session.channel_id;
        if let Some(hook) = self.persona_webhooks(channel_id).await?.into_iter().next() {
            return Ok(hook);
        }
        match self
            .platform
            .create_webhook(channel_id, &session.persona_name)
            .await
        {
            Ok(hook) => {
                info!(webhook_id = %hook.id, "Created persona webhook");
                Ok(hook)
            }
            Err(e) => {
                // A concurrent relay may have created it in between.
                match self.persona_webhooks(channel_id).await?.into_iter().next() {
                    Some(hook) => Ok(hook),
                    None => Err(e.into()),
                }
            }
        }
    }

    async fn remove_persona_webhooks(&self, channel_id: ChannelId) {
        let hooks = match self.persona_webhooks(channel_id).await {
            Ok(hooks) => hooks,
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "Failed to list webhooks");
                return;
            }
        };
        for hook in hooks {
            if let Err(e) = self.platform.delete_webhook(&hook).await {
                warn!(webhook_id = %hook.id, error = %e, "Failed to delete webhook");
            }
        }
    }
}

/// `roleplay-<name>`, lower-cased, keeping only characters channel names allow.
pub fn channel_name_for(user_name: &str) -> String {
    let mut slug = String::new();
    for c in user_name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
        } else if (c.is_whitespace() || c == '.') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let name = if slug.is_empty() {
        "roleplay".to_string()
    } else {
        format!("roleplay-{slug}")
    };
    name.chars().take(100).collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// The stored image URL if the platform can fetch it; placeholders are left out.
fn avatar_url(image_url: &str) -> Option<&str> {
    let url = image_url.trim();
    (url.starts_with("https://") || url.starts_with("http://")).then_some(url)
}
