//! Session store on SQLite.
//!
//! Uses SqlitePoolManager and the models (Session, GuildRecord). Tables are created on open;
//! databases written by earlier versions of the bot gain the `last_reply` and `created_at`
//! columns on first open.

use async_trait::async_trait;
use chrono::Utc;
use dbot_core::{ChannelId, GuildId, UserId};
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;
use crate::models::{GuildRecord, GuildRow, Session, SessionRow};
use crate::repository::SessionStore;
use crate::sqlite_pool::SqlitePoolManager;

const LEGACY_TIMESTAMP: &str = "'1970-01-01T00:00:00+00:00'";

const SESSION_COLUMNS: &str =
    "user_id, guild_id, channel_id, scenario, image_url, persona_name, last_reply, created_at";

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool_manager: SqlitePoolManager,
}

impl SqliteSessionStore {
    /// Opens (or creates) the database at `database_url` and prepares the schema.
    pub async fn open(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let store = Self { pool_manager };
        store.init().await?;
        Ok(store)
    }

    /// Closes the pool. Call once on shutdown.
    pub async fn close(&self) {
        info!("Closing session store");
        self.pool_manager.close().await;
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating database tables if not exist");
        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guilds (
                id INTEGER PRIMARY KEY,
                data TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roleplay_sessions (
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                scenario TEXT NOT NULL,
                image_url TEXT NOT NULL,
                persona_name TEXT NOT NULL,
                last_reply TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        self.ensure_column("guilds", "created_at", &format!("TEXT NOT NULL DEFAULT {LEGACY_TIMESTAMP}"))
            .await?;
        self.ensure_column("roleplay_sessions", "last_reply", "TEXT")
            .await?;
        self.ensure_column(
            "roleplay_sessions",
            "created_at",
            &format!("TEXT NOT NULL DEFAULT {LEGACY_TIMESTAMP}"),
        )
        .await?;

        // Older databases relied on lookup-before-insert, so they may hold duplicates.
        let removed = sqlx::query(
            "DELETE FROM roleplay_sessions WHERE rowid NOT IN \
             (SELECT MAX(rowid) FROM roleplay_sessions GROUP BY user_id, guild_id)",
        )
        .execute(pool)
        .await?
        .rows_affected();
        if removed > 0 {
            warn!(removed, "Removed duplicate sessions, keeping the newest per user and guild");
        }

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_user_guild ON roleplay_sessions(user_id, guild_id)",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_channel ON roleplay_sessions(channel_id)")
            .execute(pool)
            .await?;

        info!("Database tables created successfully");
        Ok(())
    }

    /// Adds `column` to `table` when a database from an older schema lacks it.
    async fn ensure_column(
        &self,
        table: &str,
        column: &str,
        definition: &str,
    ) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        let columns: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT name FROM pragma_table_info('{table}')"))
                .fetch_all(pool)
                .await?;
        if columns.iter().any(|(name,)| name == column) {
            return Ok(());
        }
        info!(table, column, "Adding missing column");
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self, credential))]
    async fn ensure_guild(
        &self,
        guild_id: GuildId,
        credential: Option<&str>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "INSERT INTO guilds (id, data, created_at) VALUES (?, ?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(guild_id.get() as i64)
        .bind(credential)
        .bind(Utc::now())
        .execute(self.pool_manager.pool())
        .await?;

        if result.rows_affected() > 0 {
            info!(guild_id = %guild_id, "Enrolled guild");
        }
        Ok(())
    }

    async fn guild(&self, guild_id: GuildId) -> Result<Option<GuildRecord>, StorageError> {
        let row = sqlx::query_as::<_, GuildRow>("SELECT id, data, created_at FROM guilds WHERE id = ?")
            .bind(guild_id.get() as i64)
            .fetch_optional(self.pool_manager.pool())
            .await?;
        Ok(row.map(GuildRecord::from))
    }

    async fn get_session(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM roleplay_sessions WHERE user_id = ? AND guild_id = ?"
        ))
        .bind(user_id.get() as i64)
        .bind(guild_id.get() as i64)
        .fetch_optional(self.pool_manager.pool())
        .await?;
        Ok(row.map(Session::from))
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id, guild_id = %session.guild_id))]
    async fn create_session(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(&format!(
            "INSERT INTO roleplay_sessions ({SESSION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(session.user_id.get() as i64)
        .bind(session.guild_id.get() as i64)
        .bind(session.channel_id.get() as i64)
        .bind(&session.scenario)
        .bind(&session.image_url)
        .bind(&session.persona_name)
        .bind(&session.last_reply)
        .bind(session.created_at)
        .execute(self.pool_manager.pool())
        .await
        .map_err(|e| match StorageError::from(e) {
            StorageError::AlreadyExists(_) => StorageError::AlreadyExists(format!(
                "session for user {} in guild {}",
                session.user_id, session.guild_id
            )),
            other => other,
        })?;

        info!(channel_id = %session.channel_id, "Saved session");
        Ok(())
    }

    async fn delete_session(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<bool, StorageError> {
        let result =
            sqlx::query("DELETE FROM roleplay_sessions WHERE user_id = ? AND guild_id = ?")
                .bind(user_id.get() as i64)
                .bind(guild_id.get() as i64)
                .execute(self.pool_manager.pool())
                .await?;
        let deleted = result.rows_affected() > 0;
        debug!(user_id = %user_id, guild_id = %guild_id, deleted, "Delete session");
        Ok(deleted)
    }

    async fn find_session_by_channel(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM roleplay_sessions WHERE user_id = ? AND channel_id = ?"
        ))
        .bind(user_id.get() as i64)
        .bind(channel_id.get() as i64)
        .fetch_optional(self.pool_manager.pool())
        .await?;
        Ok(row.map(Session::from))
    }

    async fn update_last_reply(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        reply: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE roleplay_sessions SET last_reply = ? WHERE user_id = ? AND guild_id = ?",
        )
        .bind(reply)
        .bind(user_id.get() as i64)
        .bind(guild_id.get() as i64)
        .execute(self.pool_manager.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
