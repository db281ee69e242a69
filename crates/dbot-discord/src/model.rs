//! Discord wire objects and their conversion to dbot_core types.
//!
//! Discord sends snowflakes as decimal strings; they are parsed to `u64` on the way in.

use dbot_core::{
    ChannelId, ChannelMessage, CommandContext, CommandInvocation, GuildId, MessageId,
    OptionValue, ReplyTarget, User, UserId, Webhook, WebhookId,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Channel type of a guild category.
pub const CHANNEL_TYPE_CATEGORY: u8 = 4;
/// Channel type of a guild text channel.
pub const CHANNEL_TYPE_TEXT: u8 = 0;
/// Interaction type of a slash command.
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;
pub const OPTION_TYPE_STRING: u8 = 3;
pub const OPTION_TYPE_BOOLEAN: u8 = 5;

fn snowflake<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let raw = String::deserialize(d)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn opt_snowflake<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(raw) => raw.parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl From<WireUser> for User {
    fn from(u: WireUser) -> Self {
        User {
            id: UserId(u.id),
            name: u.username,
            global_name: u.global_name,
            bot: u.bot,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(deserialize_with = "snowflake")]
    pub channel_id: u64,
    /// Only present on gateway events.
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub guild_id: Option<u64>,
    pub author: WireUser,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub webhook_id: Option<u64>,
}

impl From<WireMessage> for ChannelMessage {
    fn from(m: WireMessage) -> Self {
        ChannelMessage {
            id: MessageId(m.id),
            channel_id: ChannelId(m.channel_id),
            guild_id: m.guild_id.map(GuildId),
            author: m.author.into(),
            content: m.content,
            webhook_id: m.webhook_id.map(WebhookId),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChannel {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireWebhook {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub channel_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    /// Creator; absent when the caller lacks the permission to see it.
    #[serde(default)]
    pub user: Option<WireUser>,
    /// Only returned for incoming webhooks.
    #[serde(default)]
    pub token: Option<String>,
}

impl WireWebhook {
    /// `channel_id` fills in for the (rare) webhook object without one.
    pub fn into_core(self, channel_id: ChannelId) -> Webhook {
        Webhook {
            id: WebhookId(self.id),
            channel_id: self.channel_id.map(ChannelId).unwrap_or(channel_id),
            name: self.name,
            owner_id: self.user.map(|u| UserId(u.id)),
            token: self.token,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireApplication {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMember {
    pub user: Option<WireUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<WireCommandOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireInteraction {
    /// Kept as text: only ever echoed back in callback URLs.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub guild_id: Option<u64>,
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub channel_id: Option<u64>,
    /// Set for invocations in a guild.
    #[serde(default)]
    pub member: Option<WireMember>,
    /// Set for invocations in DMs.
    #[serde(default)]
    pub user: Option<WireUser>,
    #[serde(default)]
    pub data: Option<WireCommandData>,
}

impl WireInteraction {
    /// Slash-command context and invocation; `None` for other interaction types.
    pub fn into_command(self) -> Option<(CommandContext, CommandInvocation)> {
        if self.kind != INTERACTION_APPLICATION_COMMAND {
            return None;
        }
        let user = self.member.and_then(|m| m.user).or(self.user)?;
        let data = self.data?;

        let mut invocation = CommandInvocation::new(data.name);
        for option in data.options {
            let value = match (option.kind, option.value) {
                (OPTION_TYPE_STRING, Some(Value::String(s))) => OptionValue::String(s),
                (OPTION_TYPE_BOOLEAN, Some(Value::Bool(b))) => OptionValue::Boolean(b),
                _ => continue,
            };
            invocation = invocation.with(option.name, value);
        }

        let ctx = CommandContext {
            user: user.into(),
            guild_id: self.guild_id.map(GuildId),
            channel_id: ChannelId(self.channel_id.unwrap_or_default()),
            reply: ReplyTarget::Interaction {
                id: self.id,
                token: self.token,
            },
        };
        Some((ctx, invocation))
    }
}
