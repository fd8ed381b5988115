use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use shared::domain::{SubscriptionStatus, UserId, UserRecord};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

const MAX_FILE_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("stored record is malformed: {0}")]
    Decode(String),
    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable user records keyed by user id.
#[async_trait]
pub trait UserRecordStore: Send + Sync {
    /// Inserts the record or replaces every mutable field of the existing one.
    /// `created_at` is only written by the first insert.
    async fn upsert(&self, record: &UserRecord) -> Result<(), StorageError>;
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>, StorageError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub started: u64,
    pub subscribed: u64,
    pub not_subscribed: u64,
    /// Rows whose status column is empty or holds an unrecognized value.
    pub unrecognized: u64,
}

impl StatusSnapshot {
    pub fn total(&self) -> u64 {
        self.started + self.subscribed + self.not_subscribed + self.unrecognized
    }

    pub fn count(&self, status: SubscriptionStatus) -> u64 {
        match status {
            SubscriptionStatus::Started => self.started,
            SubscriptionStatus::Subscribed => self.subscribed,
            SubscriptionStatus::NotSubscribed => self.not_subscribed,
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        ensure_sqlite_parent_dir_exists(database_url)?;
        Self::connect(database_url, true).await
    }

    /// Fails instead of creating the database when the file does not exist.
    pub async fn open_existing(database_url: &str) -> Result<Self, StorageError> {
        Self::connect(database_url, false).await
    }

    async fn connect(database_url: &str, create_if_missing: bool) -> Result<Self, StorageError> {
        let in_memory = is_memory_url(database_url);
        let mut connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(create_if_missing)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `sqlite::memory:` opens a separate database, so the
        // single connection must never be recycled.
        let mut pool_options = SqlitePoolOptions::new();
        let max_connections = if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
            1
        } else {
            MAX_FILE_CONNECTIONS
        };
        let pool = pool_options
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(%database_url, max_connections, "sqlite storage ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn upsert_user(&self, record: &UserRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                username,
                first_name,
                last_name,
                subscription_status,
                created_at,
                last_checked
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                subscription_status = excluded.subscription_status,
                last_checked = excluded.last_checked,
                created_at = COALESCE(users.created_at, excluded.created_at)
            "#,
        )
        .bind(record.user_id.0)
        .bind(record.username.as_deref())
        .bind(record.first_name.as_deref())
        .bind(record.last_name.as_deref())
        .bind(record.subscription_status.as_str())
        .bind(format_timestamp(record.created_at))
        .bind(format_timestamp(record.last_checked))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_user(&self, user_id: UserId) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT user_id, username, first_name, last_name, subscription_status, created_at, last_checked
             FROM users WHERE user_id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| record_from_row(&r)).transpose()
    }

    pub async fn list_users(
        &self,
        status: Option<SubscriptionStatus>,
        limit: u32,
    ) -> Result<Vec<UserRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT user_id, username, first_name, last_name, subscription_status, created_at, last_checked
             FROM users
             WHERE ?1 IS NULL OR subscription_status = ?1
             ORDER BY julianday(last_checked) DESC, user_id ASC
             LIMIT ?2",
        )
        .bind(status.map(SubscriptionStatus::as_str))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }

    pub async fn status_snapshot(&self) -> Result<StatusSnapshot, StorageError> {
        let rows = sqlx::query(
            "SELECT subscription_status, COUNT(*) FROM users GROUP BY subscription_status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut snapshot = StatusSnapshot::default();
        for row in rows {
            let raw: Option<String> = row.try_get(0)?;
            let count = u64::try_from(row.try_get::<i64, _>(1)?).unwrap_or_default();
            match raw.as_deref().map(SubscriptionStatus::from_str) {
                Some(Ok(SubscriptionStatus::Started)) => snapshot.started += count,
                Some(Ok(SubscriptionStatus::Subscribed)) => snapshot.subscribed += count,
                Some(Ok(SubscriptionStatus::NotSubscribed)) => snapshot.not_subscribed += count,
                Some(Err(_)) | None => snapshot.unrecognized += count,
            }
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl UserRecordStore for Storage {
    async fn upsert(&self, record: &UserRecord) -> Result<(), StorageError> {
        self.upsert_user(record).await
    }

    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>, StorageError> {
        self.load_user(user_id).await
    }
}

fn record_from_row(row: &SqliteRow) -> Result<UserRecord, StorageError> {
    let user_id = UserId(row.try_get::<i64, _>("user_id")?);

    let raw_status: Option<String> = row.try_get("subscription_status")?;
    let subscription_status = raw_status
        .as_deref()
        .ok_or_else(|| StorageError::Decode(format!("user {user_id} has no subscription status")))?
        .parse::<SubscriptionStatus>()
        .map_err(|err| StorageError::Decode(format!("user {user_id}: {err}")))?;

    let last_checked = row
        .try_get::<Option<String>, _>("last_checked")?
        .ok_or_else(|| StorageError::Decode(format!("user {user_id} has no last_checked")))
        .and_then(|raw| parse_timestamp(&raw))?;
    let created_at = match row.try_get::<Option<String>, _>("created_at")? {
        Some(raw) => parse_timestamp(&raw)?,
        None => last_checked,
    };

    Ok(UserRecord {
        user_id,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        subscription_status,
        created_at,
        last_checked,
    })
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Accepts RFC 3339 and the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form found in
/// older rows, which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, LEGACY_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|err| StorageError::Decode(format!("invalid timestamp '{raw}': {err}")))
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<(), std::io::Error> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent)
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
