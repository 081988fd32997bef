//! SQLite-backed message and link storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::store::{LinkSource, MessageStore};
use crate::model::{CachedMessage, ProviderLink, ProviderType, UserId};
use crate::pagination::PageQuery;
use crate::{Error, Result};

const MESSAGE_COLUMNS: &str = "user_id, provider, message_id, thread_id, subject, sender, \
     recipient, snippet, plain_body, html_body, internal_date, display_date, \
     provider_revision, cached_at, last_fetched_at, category, category_confidence, raw_payload";

/// Repository for cached messages and provider links.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        // A single connection that is never recycled, so the database outlives idle periods.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS cached_messages (
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                message_id TEXT NOT NULL,
                thread_id TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                sender TEXT NOT NULL DEFAULT '',
                recipient TEXT NOT NULL DEFAULT '',
                snippet TEXT NOT NULL DEFAULT '',
                plain_body TEXT,
                html_body TEXT,
                internal_date INTEGER NOT NULL,
                display_date TEXT NOT NULL DEFAULT '',
                provider_revision TEXT NOT NULL DEFAULT '',
                cached_at TEXT NOT NULL,
                last_fetched_at TEXT,
                category TEXT,
                category_confidence REAL,
                raw_payload TEXT,
                PRIMARY KEY (user_id, provider, message_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_cached_messages_order
            ON cached_messages(user_id, internal_date DESC, message_id DESC, provider DESC)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS provider_links (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                config_json TEXT NOT NULL DEFAULT '{}',
                linked_at TEXT NOT NULL,
                UNIQUE(user_id, provider)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the underlying pool. Later calls fail with a database error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Count a user's cached messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_for_user(&self, user_id: &UserId) -> Result<i64> {
        let row = sqlx::query(r"SELECT COUNT(*) as count FROM cached_messages WHERE user_id = ?")
            .bind(user_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }

    /// Register (or re-configure) a provider link.
    ///
    /// Re-linking an existing provider keeps its original registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn link_provider(&self, link: &ProviderLink) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO provider_links (user_id, provider, config_json, linked_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, provider) DO UPDATE SET
                config_json = excluded.config_json
            ",
        )
        .bind(link.user_id.as_str())
        .bind(link.provider.as_str())
        .bind(serde_json::to_string(&link.config)?)
        .bind(link.linked_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(user_id = %link.user_id, provider = %link.provider, "Linked provider");
        Ok(())
    }

    /// Remove a provider link. Returns true if a link existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn unlink_provider(&self, user_id: &UserId, provider: ProviderType) -> Result<bool> {
        let result = sqlx::query(r"DELETE FROM provider_links WHERE user_id = ? AND provider = ?")
            .bind(user_id.as_str())
            .bind(provider.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn upsert_message(&self, message: &CachedMessage) -> Result<()> {
        let raw_payload = if message.raw_payload.is_null() {
            None
        } else {
            Some(serde_json::to_string(&message.raw_payload)?)
        };

        // internal_date is never updated: a stored message keeps its ordering key.
        sqlx::query(
            r"
            INSERT INTO cached_messages
                (user_id, provider, message_id, thread_id, subject, sender, recipient, snippet,
                 plain_body, html_body, internal_date, display_date, provider_revision,
                 cached_at, last_fetched_at, category, category_confidence, raw_payload)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, provider, message_id) DO UPDATE SET
                thread_id = excluded.thread_id,
                subject = excluded.subject,
                sender = excluded.sender,
                recipient = excluded.recipient,
                snippet = excluded.snippet,
                plain_body = excluded.plain_body,
                html_body = excluded.html_body,
                display_date = excluded.display_date,
                provider_revision = excluded.provider_revision,
                cached_at = excluded.cached_at,
                last_fetched_at = excluded.last_fetched_at,
                category = excluded.category,
                category_confidence = excluded.category_confidence,
                raw_payload = excluded.raw_payload
            ",
        )
        .bind(message.user_id.as_str())
        .bind(message.provider.as_str())
        .bind(&message.message_id)
        .bind(&message.thread_id)
        .bind(&message.subject)
        .bind(&message.sender)
        .bind(&message.recipient)
        .bind(&message.snippet)
        .bind(&message.plain_body)
        .bind(&message.html_body)
        .bind(message.internal_date)
        .bind(&message.display_date)
        .bind(&message.provider_revision)
        .bind(message.cached_at.to_rfc3339())
        .bind(message.last_fetched_at.map(|t| t.to_rfc3339()))
        .bind(&message.category)
        .bind(message.category_confidence)
        .bind(raw_payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_message(
        &self,
        user_id: &UserId,
        provider: ProviderType,
        message_id: &str,
    ) -> Result<Option<CachedMessage>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM cached_messages \
             WHERE user_id = ? AND provider = ? AND message_id = ?"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(provider.as_str())
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_message).transpose()
    }

    async fn get_page(&self, query: &PageQuery) -> Result<Vec<CachedMessage>> {
        let mut sql = format!("SELECT {MESSAGE_COLUMNS} FROM cached_messages WHERE user_id = ?");
        if query.provider.is_some() {
            sql.push_str(" AND provider = ?");
        }
        match &query.after {
            Some(after) if after.provider.is_some() => {
                sql.push_str(" AND (internal_date, message_id, provider) < (?, ?, ?)");
            }
            Some(_) => sql.push_str(" AND (internal_date, message_id) < (?, ?)"),
            None => {}
        }
        sql.push_str(" ORDER BY internal_date DESC, message_id DESC, provider DESC LIMIT ?");

        let mut q = sqlx::query(&sql).bind(query.user_id.as_str());
        if let Some(provider) = query.provider {
            q = q.bind(provider.as_str());
        }
        if let Some(after) = &query.after {
            q = q.bind(after.internal_date).bind(after.message_id.as_str());
            if let Some(provider) = after.provider {
                q = q.bind(provider.as_str());
            }
        }
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = q.bind(limit).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_message).collect()
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64> {
        let result = sqlx::query(r"DELETE FROM cached_messages WHERE user_id = ?")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LinkSource for SqliteStore {
    async fn links_for_user(&self, user_id: &UserId) -> Result<Vec<ProviderLink>> {
        let rows = sqlx::query(
            r"
            SELECT user_id, provider, config_json, linked_at
            FROM provider_links
            WHERE user_id = ?
            ORDER BY seq ASC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ProviderLink> {
                let config_json: String = row.try_get("config_json")?;
                Ok(ProviderLink {
                    user_id: UserId(row.try_get("user_id")?),
                    provider: parse_provider(&row.try_get::<String, _>("provider")?)?,
                    config: serde_json::from_str(&config_json)?,
                    linked_at: parse_timestamp(&row.try_get::<String, _>("linked_at")?)?,
                })
            })
            .collect()
    }
}

fn row_to_message(row: &SqliteRow) -> Result<CachedMessage> {
    let last_fetched_at: Option<String> = row.try_get("last_fetched_at")?;
    let raw_payload: Option<String> = row.try_get("raw_payload")?;

    Ok(CachedMessage {
        user_id: UserId(row.try_get("user_id")?),
        provider: parse_provider(&row.try_get::<String, _>("provider")?)?,
        message_id: row.try_get("message_id")?,
        thread_id: row.try_get("thread_id")?,
        subject: row.try_get("subject")?,
        sender: row.try_get("sender")?,
        recipient: row.try_get("recipient")?,
        snippet: row.try_get("snippet")?,
        plain_body: row.try_get("plain_body")?,
        html_body: row.try_get("html_body")?,
        internal_date: row.try_get("internal_date")?,
        display_date: row.try_get("display_date")?,
        provider_revision: row.try_get("provider_revision")?,
        cached_at: parse_timestamp(&row.try_get::<String, _>("cached_at")?)?,
        last_fetched_at: last_fetched_at.as_deref().map(parse_timestamp).transpose()?,
        category: row.try_get("category")?,
        category_confidence: row.try_get("category_confidence")?,
        raw_payload: raw_payload
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?
            .unwrap_or(serde_json::Value::Null),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| decode_error(format!("timestamp {value:?}: {e}")))
}

fn parse_provider(value: &str) -> Result<ProviderType> {
    value
        .parse()
        .map_err(|_| decode_error(format!("provider tag {value:?}")))
}

fn decode_error(message: String) -> Error {
    Error::Database(sqlx::Error::Decode(message.into()))
}
