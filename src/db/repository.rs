use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, NotificationSettings, Topic};

use super::schema::{
    ALL_KEYS, KEY_ARTICLES, KEY_LAST_SYNC, KEY_NOTIFICATION_SETTINGS, KEY_TOPICS, SCHEMA,
};

/// Key/value store for the four app records.
///
/// Reads never fail: a missing row, a storage error or a corrupt document
/// all degrade to the record's default and are logged. Writes return their
/// error so the caller decides whether it matters.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Topics

    pub async fn get_topics(&self) -> Vec<Topic> {
        self.read_json(KEY_TOPICS).await.unwrap_or_default()
    }

    pub async fn save_topics(&self, topics: &[Topic]) -> Result<()> {
        self.write_json(KEY_TOPICS, &topics).await
    }

    // Articles

    pub async fn get_articles(&self) -> Vec<Article> {
        self.read_json(KEY_ARTICLES).await.unwrap_or_default()
    }

    pub async fn save_articles(&self, articles: &[Article]) -> Result<()> {
        self.write_json(KEY_ARTICLES, &articles).await
    }

    // Notification settings

    pub async fn get_notification_settings(&self) -> NotificationSettings {
        self.read_json(KEY_NOTIFICATION_SETTINGS)
            .await
            .unwrap_or_default()
    }

    pub async fn save_notification_settings(&self, settings: &NotificationSettings) -> Result<()> {
        self.write_json(KEY_NOTIFICATION_SETTINGS, settings).await
    }

    // Last sync, stored as a bare RFC 3339 string

    pub async fn get_last_sync(&self) -> Option<DateTime<Utc>> {
        let raw = self.read_raw_logged(KEY_LAST_SYNC).await?;
        let parsed = parse_datetime(&raw);
        if parsed.is_none() {
            tracing::warn!("Ignoring unparsable last sync value: {}", raw);
        }
        parsed
    }

    pub async fn save_last_sync(&self, at: DateTime<Utc>) -> Result<()> {
        self.put_raw(KEY_LAST_SYNC, at.to_rfc3339()).await
    }

    /// Removes every record in a single transaction.
    pub async fn clear_all(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                for key in ALL_KEYS {
                    tx.execute("DELETE FROM records WHERE key = ?1", params![key])?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &'static str) -> Option<T> {
        let raw = self.read_raw_logged(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding corrupt {} record: {}", key, e);
                None
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &'static str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.put_raw(key, json).await
    }

    async fn read_raw_logged(&self, key: &'static str) -> Option<String> {
        match self.get_raw(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read {} record: {}", key, e);
                None
            }
        }
    }

    async fn get_raw(&self, key: &'static str) -> Result<Option<String>> {
        let value = self
            .conn
            .call(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM records WHERE key = ?1",
                        params![key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    async fn put_raw(&self, key: &'static str, value: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO records (key, value, updated_at)
                       VALUES (?1, ?2, datetime('now'))
                       ON CONFLICT(key) DO UPDATE SET
                           value = excluded.value,
                           updated_at = excluded.updated_at"#,
                    params![key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    // Older records may be in SQLite datetime format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}
