//! Guild enrollment record; maps to the `guilds` table.

use chrono::{DateTime, Utc};
use dbot_core::GuildId;
use serde::{Deserialize, Serialize};

/// A server the bot has started at least one session in. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRecord {
    pub guild_id: GuildId,
    /// Opaque per-guild credential blob, if one was configured at enrollment.
    pub credential: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct GuildRow {
    pub id: i64,
    pub data: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<GuildRow> for GuildRecord {
    fn from(row: GuildRow) -> Self {
        Self {
            guild_id: GuildId(row.id as u64),
            credential: row.data,
            created_at: row.created_at,
        }
    }
}
