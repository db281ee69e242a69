//! Shared fixtures for roleplay integration tests.
//!
//! [`MockPlatform`] keeps channels, messages and webhooks in memory and records every reply,
//! DM and webhook publish. [`MockLlm`] returns scripted replies and records each request.
//! Nothing touches the network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dbot_core::{
    ChannelId, ChannelMessage, CommandContext, GuildId, MessageId, NewTextChannel, Platform,
    PlatformError, PlatformResult, ReplyTarget, User, UserId, Webhook, WebhookId,
};
use llm_client::LlmClient;
use prompt::ChatMessage;
use roleplay::{Roleplay, RoleplayConfig};
use storage::SqliteSessionStore;
use tempfile::TempDir;

pub const BOT_ID: u64 = 99;
pub const GUILD: GuildId = GuildId(10);

pub fn alice() -> User {
    User::new(1, "alice")
}

pub fn bob() -> User {
    User::new(2, "bob")
}

pub fn bot_user() -> User {
    User {
        id: UserId(BOT_ID),
        name: "storybot".to_string(),
        global_name: Some("Story Bot".to_string()),
        bot: true,
    }
}

pub fn command_ctx(user: User) -> CommandContext {
    CommandContext {
        user,
        guild_id: Some(GUILD),
        channel_id: ChannelId(1),
        reply: ReplyTarget::Interaction {
            id: "interaction".to_string(),
            token: "token".to_string(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct MockChannel {
    pub guild_id: GuildId,
    pub name: String,
    pub is_category: bool,
    pub spec: Option<NewTextChannel>,
    /// Chronological.
    pub messages: Vec<ChannelMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub user_id: UserId,
    pub text: String,
    pub ephemeral: bool,
    /// Visibility fixed by an earlier acknowledgement, if the command was acknowledged.
    pub deferred: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct DirectFile {
    pub user_id: UserId,
    pub content: String,
    pub file_name: String,
    pub file_body: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Published {
    pub webhook_id: WebhookId,
    pub content: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Default)]
pub struct PlatformState {
    next_id: u64,
    pub channels: HashMap<ChannelId, MockChannel>,
    pub webhooks: Vec<Webhook>,
    pub replies: Vec<Reply>,
    /// `(user, ephemeral)` per acknowledged command.
    pub acknowledged: Vec<(UserId, bool)>,
    pub direct_files: Vec<DirectFile>,
    pub published: Vec<Published>,
    pub typing: Vec<ChannelId>,
    pub deleted_channels: Vec<ChannelId>,
    pub fail_create_channel: bool,
    pub dm_forbidden: bool,
    pub created_webhooks: usize,
}

impl PlatformState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

pub struct MockPlatform {
    bot: User,
    pub state: Mutex<PlatformState>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            bot: bot_user(),
            state: Mutex::new(PlatformState::default()),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap()
    }

    /// Simulates `author` posting in `channel_id`; returns the message as the gateway would.
    pub fn post(&self, channel_id: ChannelId, author: &User, content: &str) -> ChannelMessage {
        let mut state = self.state();
        let id = MessageId(state.next());
        let channel = state.channels.get_mut(&channel_id).expect("channel exists");
        let message = ChannelMessage {
            id,
            channel_id,
            guild_id: Some(channel.guild_id),
            author: author.clone(),
            content: content.to_string(),
            webhook_id: None,
        };
        channel.messages.push(message.clone());
        message
    }

    /// Simulates someone deleting the channel by hand.
    pub fn vanish(&self, channel_id: ChannelId) {
        self.state().channels.remove(&channel_id);
    }

    pub fn messages(&self, channel_id: ChannelId) -> Vec<ChannelMessage> {
        self.state()
            .channels
            .get(&channel_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub fn channel(&self, channel_id: ChannelId) -> Option<MockChannel> {
        self.state().channels.get(&channel_id).cloned()
    }

    pub fn text_channels(&self) -> Vec<ChannelId> {
        self.state()
            .channels
            .iter()
            .filter(|(_, c)| !c.is_category)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.state().replies.clone()
    }

    pub fn last_reply(&self) -> Option<Reply> {
        self.state().replies.last().cloned()
    }
}

fn insert_channel(state: &mut PlatformState, guild_id: GuildId, name: &str, is_category: bool, spec: Option<NewTextChannel>) -> ChannelId {
    let id = ChannelId(state.next());
    state.channels.insert(
        id,
        MockChannel {
            guild_id,
            name: name.to_string(),
            is_category,
            spec,
            messages: Vec::new(),
        },
    );
    id
}

#[async_trait]
impl Platform for MockPlatform {
    fn bot_user(&self) -> User {
        self.bot.clone()
    }

    async fn acknowledge(&self, ctx: &CommandContext, ephemeral: bool) -> PlatformResult<ReplyTarget> {
        let ReplyTarget::Interaction { token, .. } = &ctx.reply else {
            return Ok(ctx.reply.clone());
        };
        self.state().acknowledged.push((ctx.user.id, ephemeral));
        Ok(ReplyTarget::Deferred {
            token: token.clone(),
            ephemeral,
        })
    }

    async fn respond(&self, ctx: &CommandContext, text: &str, ephemeral: bool) -> PlatformResult<()> {
        let deferred = match &ctx.reply {
            ReplyTarget::Deferred { ephemeral, .. } => Some(*ephemeral),
            _ => None,
        };
        self.state().replies.push(Reply {
            user_id: ctx.user.id,
            text: text.to_string(),
            ephemeral,
            deferred,
        });
        Ok(())
    }

    async fn channel_exists(&self, channel_id: ChannelId) -> PlatformResult<bool> {
        Ok(self.state().channels.contains_key(&channel_id))
    }

    async fn find_category(&self, guild_id: GuildId, name: &str) -> PlatformResult<Option<ChannelId>> {
        Ok(self
            .state()
            .channels
            .iter()
            .find(|(_, c)| c.is_category && c.guild_id == guild_id && c.name == name)
            .map(|(id, _)| *id))
    }

    async fn create_category(&self, guild_id: GuildId, name: &str) -> PlatformResult<ChannelId> {
        let mut state = self.state();
        Ok(insert_channel(&mut state, guild_id, name, true, None))
    }

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        channel: &NewTextChannel,
    ) -> PlatformResult<ChannelId> {
        let mut state = self.state();
        if state.fail_create_channel {
            return Err(PlatformError::Forbidden("Missing Permissions".to_string()));
        }
        Ok(insert_channel(&mut state, guild_id, &channel.name, false, Some(channel.clone())))
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> PlatformResult<()> {
        let mut state = self.state();
        state.deleted_channels.push(channel_id);
        state
            .channels
            .remove(&channel_id)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(format!("channel {channel_id}")))
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> PlatformResult<MessageId> {
        let bot = self.bot.clone();
        let mut state = self.state();
        let id = MessageId(state.next());
        let channel = state
            .channels
            .get_mut(&channel_id)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {channel_id}")))?;
        channel.messages.push(ChannelMessage {
            id,
            channel_id,
            guild_id: Some(channel.guild_id),
            author: bot,
            content: text.to_string(),
            webhook_id: None,
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        text: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        let message = state
            .channels
            .get_mut(&channel_id)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message_id))
            .ok_or_else(|| PlatformError::NotFound(format!("message {message_id}")))?;
        if message.author.id != self.bot.id {
            return Err(PlatformError::Forbidden("Cannot edit another user's message".into()));
        }
        message.content = text.to_string();
        Ok(())
    }

    async fn message_history(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> PlatformResult<Vec<ChannelMessage>> {
        let state = self.state();
        let channel = state
            .channels
            .get(&channel_id)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {channel_id}")))?;
        Ok(channel.messages.iter().rev().take(limit).cloned().collect())
    }

    async fn trigger_typing(&self, channel_id: ChannelId) -> PlatformResult<()> {
        self.state().typing.push(channel_id);
        Ok(())
    }

    async fn channel_webhooks(&self, channel_id: ChannelId) -> PlatformResult<Vec<Webhook>> {
        Ok(self
            .state()
            .webhooks
            .iter()
            .filter(|w| w.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn create_webhook(&self, channel_id: ChannelId, name: &str) -> PlatformResult<Webhook> {
        let mut state = self.state();
        let hook = Webhook {
            id: WebhookId(state.next()),
            channel_id,
            name: Some(name.to_string()),
            owner_id: Some(self.bot.id),
            token: Some("hook-token".to_string()),
        };
        state.webhooks.push(hook.clone());
        state.created_webhooks += 1;
        Ok(hook)
    }

    async fn delete_webhook(&self, webhook: &Webhook) -> PlatformResult<()> {
        self.state().webhooks.retain(|w| w.id != webhook.id);
        Ok(())
    }

    async fn execute_webhook(
        &self,
        webhook: &Webhook,
        content: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> PlatformResult<MessageId> {
        let mut state = self.state();
        let id = MessageId(state.next());
        state.published.push(Published {
            webhook_id: webhook.id,
            content: content.to_string(),
            username: username.to_string(),
            avatar_url: avatar_url.map(str::to_string),
        });
        let channel = state
            .channels
            .get_mut(&webhook.channel_id)
            .ok_or_else(|| PlatformError::NotFound("webhook channel".into()))?;
        channel.messages.push(ChannelMessage {
            id,
            channel_id: webhook.channel_id,
            guild_id: Some(channel.guild_id),
            author: User {
                id: UserId(webhook.id.get()),
                name: username.to_string(),
                global_name: None,
                bot: true,
            },
            content: content.to_string(),
            webhook_id: Some(webhook.id),
        });
        Ok(id)
    }

    async fn edit_webhook_message(
        &self,
        webhook: &Webhook,
        message_id: MessageId,
        content: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        let message = state
            .channels
            .get_mut(&webhook.channel_id)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message_id))
            .filter(|m| m.webhook_id == Some(webhook.id))
            .ok_or_else(|| PlatformError::NotFound(format!("webhook message {message_id}")))?;
        message.content = content.to_string();
        Ok(())
    }

    async fn send_direct_file(&self, user_id: UserId, content: &str, file: &Path) -> PlatformResult<()> {
        if self.state().dm_forbidden {
            return Err(PlatformError::Forbidden(
                "Cannot send messages to this user".to_string(),
            ));
        }
        let file_body = std::fs::read_to_string(file)
            .map_err(|e| PlatformError::Http(format!("read attachment: {e}")))?;
        self.state().direct_files.push(DirectFile {
            user_id,
            content: content.to_string(),
            file_name: file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_body,
            path: file.to_path_buf(),
        });
        Ok(())
    }
}

/// Scripted language model.
pub struct MockLlm {
    reply: Option<String>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockLlm {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, messages: Vec<ChatMessage>) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(messages);
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => anyhow::bail!("connection refused"),
        }
    }
}

pub struct Harness {
    pub store: Arc<SqliteSessionStore>,
    pub platform: Arc<MockPlatform>,
    pub llm: Arc<MockLlm>,
    pub roleplay: Arc<Roleplay>,
    pub export_dir: PathBuf,
    _dir: TempDir,
}

pub async fn harness(llm: MockLlm) -> Harness {
    harness_with(llm, |_| {}).await
}

pub async fn harness_with(llm: MockLlm, tweak: impl FnOnce(&mut RoleplayConfig)) -> Harness {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("roleplay.db");
    let store = Arc::new(SqliteSessionStore::open(db.to_str().unwrap()).await.unwrap());
    let platform = Arc::new(MockPlatform::new());
    let llm = Arc::new(llm);
    let export_dir = dir.path().join("exports");

    let mut config = RoleplayConfig {
        export_dir: export_dir.clone(),
        ..RoleplayConfig::default()
    };
    tweak(&mut config);

    let roleplay = Arc::new(Roleplay::new(
        store.clone(),
        platform.clone(),
        llm.clone(),
        config,
    ));
    Harness {
        store,
        platform,
        llm,
        roleplay,
        export_dir,
        _dir: dir,
    }
}

impl Harness {
    /// Starts a session for `user` and returns its channel.
    pub async fn start_for(&self, user: User) -> ChannelId {
        self.roleplay
            .start(
                &command_ctx(user),
                "a haunted lighthouse",
                Some("Keeper"),
                Some("https://example.com/keeper.png"),
            )
            .await
            .expect("start succeeds")
            .channel_id
    }
}

impl Harness {
    /// A plain text channel outside any session, for prefix commands and stray messages.
    pub async fn general_channel(&self, guild_id: GuildId) -> ChannelId {
        let spec = NewTextChannel {
            name: "general".to_string(),
            category_id: None,
            overwrites: Vec::new(),
            slowmode_secs: 0,
        };
        self.platform
            .create_text_channel(guild_id, &spec)
            .await
            .unwrap()
    }

    /// Files left behind in the export directory.
    pub fn leftover_exports(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.export_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
