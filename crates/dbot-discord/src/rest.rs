//! [`DiscordHttp`]: the Discord REST API behind [`dbot_core::Platform`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{
    ChannelId, ChannelMessage, CommandContext, GuildId, MessageId, NewTextChannel,
    OverwriteTarget, Platform, PlatformError, PlatformResult, ReplyTarget, User, UserId, Webhook,
};
use reqwest::{multipart, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::model::{
    WireApplication, WireChannel, WireMessage, WireUser, WireWebhook, CHANNEL_TYPE_CATEGORY,
    CHANNEL_TYPE_TEXT,
};

pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

/// VIEW_CHANNEL
const PERM_VIEW_CHANNEL: u64 = 1 << 10;
/// SEND_MESSAGES
const PERM_SEND_MESSAGES: u64 = 1 << 11;
/// Interaction callback: reply with a message.
const CALLBACK_CHANNEL_MESSAGE: u8 = 4;
/// Interaction callback: acknowledge now, edit the original response later.
const CALLBACK_DEFERRED_CHANNEL_MESSAGE: u8 = 5;
/// Message flag: only the invoker sees it.
const FLAG_EPHEMERAL: u64 = 1 << 6;
/// Largest page `GET /channels/{id}/messages` returns.
const HISTORY_PAGE: usize = 100;
/// Webhook names and usernames are capped at 80 characters.
const WEBHOOK_NAME_MAX: usize = 80;
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Discord REST client authenticated as a bot.
pub struct DiscordHttp {
    client: Client,
    base_url: String,
    token: String,
    bot: User,
    application_id: u64,
}

impl DiscordHttp {
    /// Creates a client and resolves the bot account and application id.
    pub async fn connect(token: &str, base_url: &str) -> PlatformResult<Self> {
        let mut http = Self::with_identity(token, base_url, User::new(0, ""), 0);
        let me: WireUser = http.get("/users/@me").await?;
        let app: WireApplication = http.get("/oauth2/applications/@me").await?;
        http.bot = me.into();
        http.application_id = app.id;
        debug!(bot_id = %http.bot.id, application_id = app.id, "Resolved bot identity");
        Ok(http)
    }

    /// Creates a client with a known identity; no request is made.
    pub fn with_identity(token: &str, base_url: &str, bot: User, application_id: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            bot,
            application_id,
        }
    }

    pub fn application_id(&self) -> u64 {
        self.application_id
    }

    /// Gateway websocket URL with version and encoding parameters.
    pub async fn gateway_url(&self) -> PlatformResult<String> {
        let body: Value = self.get("/gateway/bot").await?;
        let url = body
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::Decode("gateway response without url".into()))?;
        Ok(format!("{url}/?v=10&encoding=json"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn builder(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// Sends the request built by `build`, waiting out rate limits, and maps error statuses.
    pub(crate) async fn execute(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> PlatformResult<Response> {
        let mut attempt = 0;
        loop {
            let resp = build().send().await.map_err(http_error)?;
            if resp.status() == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RATE_LIMIT_RETRIES {
                attempt += 1;
                let wait = retry_after(resp).await;
                warn!(wait_ms = wait.as_millis() as u64, attempt, "Rate limited by Discord");
                tokio::time::sleep(wait).await;
                continue;
            }
            return check(resp).await;
        }
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> PlatformResult<T> {
        let resp = self
            .execute(|| {
                let req = self.builder(method.clone(), path);
                match body {
                    Some(body) => req.json(body),
                    None => req,
                }
            })
            .await?;
        resp.json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(format!("{method} {path}: {e}")))
    }

    pub(crate) async fn send_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> PlatformResult<()> {
        self.execute(|| {
            let req = self.builder(method.clone(), path);
            match body {
                Some(body) => req.json(body),
                None => req,
            }
        })
        .await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<T> {
        self.send_json(Method::GET, path, None).await
    }

    async fn interaction_callback(
        &self,
        id: &str,
        token: &str,
        text: &str,
        ephemeral: bool,
    ) -> PlatformResult<()> {
        let body = json!({
            "type": CALLBACK_CHANNEL_MESSAGE,
            "data": message_data(text, ephemeral),
        });
        self.send_empty(
            Method::POST,
            &format!("/interactions/{id}/{token}/callback"),
            Some(&body),
        )
        .await
    }

    async fn interaction_followup(&self, token: &str, text: &str, ephemeral: bool) -> PlatformResult<()> {
        let body = message_data(text, ephemeral);
        self.send_empty(
            Method::POST,
            &format!("/webhooks/{}/{token}", self.application_id),
            Some(&body),
        )
        .await
    }

    async fn edit_original_response(&self, token: &str, text: &str) -> PlatformResult<()> {
        let body = json!({ "content": text });
        self.send_empty(
            Method::PATCH,
            &format!("/webhooks/{}/{token}/messages/@original", self.application_id),
            Some(&body),
        )
        .await
    }

    async fn delete_original_response(&self, token: &str) -> PlatformResult<()> {
        self.send_empty(
            Method::DELETE,
            &format!("/webhooks/{}/{token}/messages/@original", self.application_id),
            None,
        )
        .await
    }

    /// Answers a deferred interaction. The deferral fixed the original response's visibility,
    /// so a reply with a different visibility goes out as a followup and the placeholder is
    /// removed.
    async fn answer_deferred(
        &self,
        token: &str,
        deferred_ephemeral: bool,
        text: &str,
        ephemeral: bool,
    ) -> PlatformResult<()> {
        if deferred_ephemeral == ephemeral {
            return self.edit_original_response(token, text).await;
        }
        self.interaction_followup(token, text, ephemeral).await?;
        if let Err(e) = self.delete_original_response(token).await {
            debug!(error = %e, "Failed to remove deferred placeholder");
        }
        Ok(())
    }

    async fn open_dm(&self, user_id: UserId) -> PlatformResult<ChannelId> {
        let body = json!({ "recipient_id": user_id.to_string() });
        let channel: WireChannel = self
            .send_json(Method::POST, "/users/@me/channels", Some(&body))
            .await?;
        Ok(ChannelId(channel.id))
    }
}

#[async_trait]
impl Platform for DiscordHttp {
    fn bot_user(&self) -> User {
        self.bot.clone()
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user.id))]
    async fn acknowledge(&self, ctx: &CommandContext, ephemeral: bool) -> PlatformResult<ReplyTarget> {
        let ReplyTarget::Interaction { id, token } = &ctx.reply else {
            return Ok(ctx.reply.clone());
        };
        let mut body = json!({ "type": CALLBACK_DEFERRED_CHANNEL_MESSAGE });
        if ephemeral {
            body["data"] = json!({ "flags": FLAG_EPHEMERAL });
        }
        self.send_empty(
            Method::POST,
            &format!("/interactions/{id}/{token}/callback"),
            Some(&body),
        )
        .await?;
        Ok(ReplyTarget::Deferred {
            token: token.clone(),
            ephemeral,
        })
    }

    #[instrument(skip(self, ctx, text), fields(user_id = %ctx.user.id))]
    async fn respond(&self, ctx: &CommandContext, text: &str, ephemeral: bool) -> PlatformResult<()> {
        match &ctx.reply {
            ReplyTarget::Interaction { id, token } => {
                match self.interaction_callback(id, token, text, ephemeral).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        // Already acknowledged elsewhere; a followup still reaches the invoker.
                        debug!(error = %e, "Interaction callback failed, sending followup");
                        self.interaction_followup(token, text, ephemeral).await
                    }
                }
            }
            ReplyTarget::Deferred {
                token,
                ephemeral: deferred_ephemeral,
            } => {
                self.answer_deferred(token, *deferred_ephemeral, text, ephemeral)
                    .await
            }
            ReplyTarget::Channel(channel_id) => {
                self.send_message(*channel_id, text).await.map(|_| ())
            }
        }
    }

    async fn channel_exists(&self, channel_id: ChannelId) -> PlatformResult<bool> {
        match self.get::<WireChannel>(&format!("/channels/{channel_id}")).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find_category(&self, guild_id: GuildId, name: &str) -> PlatformResult<Option<ChannelId>> {
        let channels: Vec<WireChannel> = self.get(&format!("/guilds/{guild_id}/channels")).await?;
        Ok(channels
            .into_iter()
            .find(|c| c.kind == CHANNEL_TYPE_CATEGORY && c.name.as_deref() == Some(name))
            .map(|c| ChannelId(c.id)))
    }

    async fn create_category(&self, guild_id: GuildId, name: &str) -> PlatformResult<ChannelId> {
        let body = json!({ "name": name, "type": CHANNEL_TYPE_CATEGORY });
        let channel: WireChannel = self
            .send_json(Method::POST, &format!("/guilds/{guild_id}/channels"), Some(&body))
            .await?;
        Ok(ChannelId(channel.id))
    }

    #[instrument(skip(self, channel), fields(name = %channel.name))]
    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        channel: &NewTextChannel,
    ) -> PlatformResult<ChannelId> {
        let body = text_channel_body(guild_id, channel);
        let created: WireChannel = self
            .send_json(Method::POST, &format!("/guilds/{guild_id}/channels"), Some(&body))
            .await?;
        Ok(ChannelId(created.id))
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> PlatformResult<()> {
        self.send_empty(Method::DELETE, &format!("/channels/{channel_id}"), None)
            .await
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> PlatformResult<MessageId> {
        let body = json!({
            "content": text,
            "allowed_mentions": { "parse": ["users"] },
        });
        let sent: WireMessage = self
            .send_json(
                Method::POST,
                &format!("/channels/{channel_id}/messages"),
                Some(&body),
            )
            .await?;
        Ok(MessageId(sent.id))
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        text: &str,
    ) -> PlatformResult<()> {
        let body = json!({ "content": text });
        self.send_empty(
            Method::PATCH,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn message_history(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> PlatformResult<Vec<ChannelMessage>> {
        let mut messages: Vec<ChannelMessage> = Vec::with_capacity(limit);
        let mut before: Option<MessageId> = None;
        while messages.len() < limit {
            let page_size = (limit - messages.len()).min(HISTORY_PAGE);
            let path = match before {
                Some(id) => format!("/channels/{channel_id}/messages?limit={page_size}&before={id}"),
                None => format!("/channels/{channel_id}/messages?limit={page_size}"),
            };
            let page: Vec<WireMessage> = self.get(&path).await?;
            let fetched = page.len();
            messages.extend(page.into_iter().map(ChannelMessage::from));
            before = messages.last().map(|m| m.id);
            if fetched < page_size {
                break;
            }
        }
        debug!(count = messages.len(), "Fetched channel history");
        Ok(messages)
    }

    async fn trigger_typing(&self, channel_id: ChannelId) -> PlatformResult<()> {
        self.send_empty(Method::POST, &format!("/channels/{channel_id}/typing"), None)
            .await
    }

    async fn channel_webhooks(&self, channel_id: ChannelId) -> PlatformResult<Vec<Webhook>> {
        let hooks: Vec<WireWebhook> = self.get(&format!("/channels/{channel_id}/webhooks")).await?;
        Ok(hooks.into_iter().map(|h| h.into_core(channel_id)).collect())
    }

    async fn create_webhook(&self, channel_id: ChannelId, name: &str) -> PlatformResult<Webhook> {
        let body = json!({ "name": clip(name, WEBHOOK_NAME_MAX) });
        let hook: WireWebhook = self
            .send_json(
                Method::POST,
                &format!("/channels/{channel_id}/webhooks"),
                Some(&body),
            )
            .await?;
        Ok(hook.into_core(channel_id))
    }

    async fn delete_webhook(&self, webhook: &Webhook) -> PlatformResult<()> {
        self.send_empty(Method::DELETE, &format!("/webhooks/{}", webhook.id), None)
            .await
    }

    #[instrument(skip(self, webhook, content, avatar_url), fields(webhook_id = %webhook.id))]
    async fn execute_webhook(
        &self,
        webhook: &Webhook,
        content: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> PlatformResult<MessageId> {
        let token = webhook_token(webhook)?;
        let mut body = json!({
            "content": content,
            "username": clip(username, WEBHOOK_NAME_MAX),
        });
        if let Some(url) = avatar_url {
            body["avatar_url"] = json!(url);
        }
        let sent: WireMessage = self
            .send_json(
                Method::POST,
                &format!("/webhooks/{}/{token}?wait=true", webhook.id),
                Some(&body),
            )
            .await?;
        Ok(MessageId(sent.id))
    }

    async fn edit_webhook_message(
        &self,
        webhook: &Webhook,
        message_id: MessageId,
        content: &str,
    ) -> PlatformResult<()> {
        let token = webhook_token(webhook)?;
        let body = json!({ "content": content });
        self.send_empty(
            Method::PATCH,
            &format!("/webhooks/{}/{token}/messages/{message_id}", webhook.id),
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self, content))]
    async fn send_direct_file(&self, user_id: UserId, content: &str, file: &Path) -> PlatformResult<()> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| PlatformError::Http(format!("read {}: {e}", file.display())))?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        let dm = self.open_dm(user_id).await?;
        let payload = json!({
            "content": content,
            "attachments": [{ "id": 0, "filename": file_name }],
        })
        .to_string();
        let path = format!("/channels/{dm}/messages");

        self.execute(|| {
            let part = multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
            let form = multipart::Form::new()
                .text("payload_json", payload.clone())
                .part("files[0]", part);
            self.builder(Method::POST, &path).multipart(form)
        })
        .await?;
        Ok(())
    }
}

/// JSON body for a guild text channel with permission overwrites and slowmode.
pub(crate) fn text_channel_body(guild_id: GuildId, channel: &NewTextChannel) -> Value {
    let overwrites: Vec<Value> = channel
        .overwrites
        .iter()
        .map(|o| {
            let (id, kind) = match o.target {
                // The @everyone role shares the guild's id.
                OverwriteTarget::Everyone => (guild_id.to_string(), 0),
                OverwriteTarget::Member(user_id) => (user_id.to_string(), 1),
            };
            let (mut allow, mut deny) = (0u64, 0u64);
            for (granted, bit) in [(o.read, PERM_VIEW_CHANNEL), (o.write, PERM_SEND_MESSAGES)] {
                if granted {
                    allow |= bit;
                } else {
                    deny |= bit;
                }
            }
            json!({
                "id": id,
                "type": kind,
                "allow": allow.to_string(),
                "deny": deny.to_string(),
            })
        })
        .collect();

    let mut body = json!({
        "name": channel.name,
        "type": CHANNEL_TYPE_TEXT,
        "permission_overwrites": overwrites,
        "rate_limit_per_user": channel.slowmode_secs,
    });
    if let Some(parent) = channel.category_id {
        body["parent_id"] = json!(parent.to_string());
    }
    body
}

fn message_data(text: &str, ephemeral: bool) -> Value {
    let mut data = json!({ "content": text });
    if ephemeral {
        data["flags"] = json!(FLAG_EPHEMERAL);
    }
    data
}

fn webhook_token(webhook: &Webhook) -> PlatformResult<&str> {
    webhook
        .token
        .as_deref()
        .ok_or_else(|| PlatformError::Forbidden(format!("webhook {} has no token", webhook.id)))
}

fn clip(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn http_error(e: reqwest::Error) -> PlatformError {
    PlatformError::Http(e.to_string())
}

async fn retry_after(resp: Response) -> Duration {
    let secs = resp
        .json::<Value>()
        .await
        .ok()
        .and_then(|v| v.get("retry_after").and_then(Value::as_f64))
        .filter(|s| s.is_finite())
        .unwrap_or(1.0);
    Duration::from_secs_f64(secs.clamp(0.0, 60.0))
}

/// Passes successful responses through; maps the rest to [`PlatformError`].
async fn check(resp: Response) -> PlatformResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(text);
    Err(match status {
        StatusCode::FORBIDDEN => PlatformError::Forbidden(message),
        StatusCode::NOT_FOUND => PlatformError::NotFound(message),
        _ => PlatformError::Api {
            status: status.as_u16(),
            message,
        },
    })
}
