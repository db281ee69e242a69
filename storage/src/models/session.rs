//! Session record model; maps to the `roleplay_sessions` table.

use chrono::{DateTime, Utc};
use dbot_core::{ChannelId, GuildId, UserId};
use serde::{Deserialize, Serialize};

/// The live association between a user, a server and a dedicated roleplay channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub scenario: String,
    /// Avatar used when publishing persona replies.
    pub image_url: String,
    pub persona_name: String,
    /// Text of the most recent manual edit of a persona reply.
    pub last_reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session stamped with the current time and no recorded reply.
    pub fn new(
        user_id: UserId,
        guild_id: GuildId,
        channel_id: ChannelId,
        scenario: impl Into<String>,
        image_url: impl Into<String>,
        persona_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            guild_id,
            channel_id,
            scenario: scenario.into(),
            image_url: image_url.into(),
            persona_name: persona_name.into(),
            last_reply: None,
            created_at: Utc::now(),
        }
    }
}

// Snowflakes are below 2^63, so the i64 <-> u64 casts are lossless.
#[derive(sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub user_id: i64,
    pub guild_id: i64,
    pub channel_id: i64,
    pub scenario: String,
    pub image_url: String,
    pub persona_name: String,
    pub last_reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            user_id: UserId(row.user_id as u64),
            guild_id: GuildId(row.guild_id as u64),
            channel_id: ChannelId(row.channel_id as u64),
            scenario: row.scenario,
            image_url: row.image_url,
            persona_name: row.persona_name,
            last_reply: row.last_reply,
            created_at: row.created_at,
        }
    }
}
