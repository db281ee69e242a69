use async_trait::async_trait;
use dbot_core::{ChannelId, GuildId, UserId};

use crate::error::StorageError;
use crate::models::{GuildRecord, Session};

/// Persistence for guild enrollment and roleplay sessions.
///
/// Every mutation is committed before the method returns. At most one session exists per
/// (user, guild); implementations enforce this atomically.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts the guild if absent. Existing rows are never updated.
    async fn ensure_guild(
        &self,
        guild_id: GuildId,
        credential: Option<&str>,
    ) -> Result<(), StorageError>;

    async fn guild(&self, guild_id: GuildId) -> Result<Option<GuildRecord>, StorageError>;

    async fn get_session(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<Option<Session>, StorageError>;

    /// Fails with [`StorageError::AlreadyExists`] when the pair already has a session.
    async fn create_session(&self, session: &Session) -> Result<(), StorageError>;

    /// No-op if absent. Returns whether a row was removed.
    async fn delete_session(&self, user_id: UserId, guild_id: GuildId)
        -> Result<bool, StorageError>;

    /// The session `user_id` owns in `channel_id`, if any. Used to route relayed messages.
    async fn find_session_by_channel(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<Option<Session>, StorageError>;

    /// Records a manually edited reply. Returns whether a session was updated.
    async fn update_last_reply(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        reply: &str,
    ) -> Result<bool, StorageError>;
}
