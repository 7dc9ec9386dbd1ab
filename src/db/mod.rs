/// Database layer for ClassReel
///
/// Manages the SQLite connection pool, embedded migrations and the
/// timestamp encoding shared by every table.

pub mod account;

use crate::error::{ReelError, ReelResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> ReelResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Open a private in-memory database with the schema applied
///
/// A single long-lived connection keeps the database alive for the
/// lifetime of the pool.
pub async fn open_in_memory() -> ReelResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> ReelResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ReelError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> ReelResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Encode a timestamp in the fixed-width form stored in every table.
/// Fixed width keeps lexicographic and chronological order identical.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp
pub fn parse_timestamp(value: &str) -> ReelResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ReelError::Internal(format!("Invalid timestamp {:?}: {}", value, e)))
}

/// Decode an optional stored timestamp
pub fn parse_optional_timestamp(value: Option<String>) -> ReelResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

/// Keyset position in a newest-first listing sorted by `(timestamp, id)`.
///
/// Rows sharing the timestamp of the last row on a page are told apart by
/// id, so none are skipped at the page boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCursor {
    pub before: DateTime<Utc>,
    pub before_id: String,
}

impl PageCursor {
    pub fn new(before: DateTime<Utc>, before_id: impl Into<String>) -> Self {
        Self {
            before,
            before_id: before_id.into(),
        }
    }

    /// Cursor from query parameters. A timestamp without an id keeps only
    /// rows strictly older than it.
    pub fn from_params(before: Option<DateTime<Utc>>, before_id: Option<String>) -> Option<Self> {
        before.map(|at| Self::new(at, before_id.unwrap_or_default()))
    }

    /// Values bound to the `(?ts, ?id)` pair of a keyset predicate
    pub(crate) fn bind_values(cursor: Option<&PageCursor>) -> (Option<String>, Option<String>) {
        match cursor {
            Some(cursor) => (Some(timestamp(cursor.before)), Some(cursor.before_id.clone())),
            None => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_timestamp_order_matches_time_order() {
        let early = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let late = early + Duration::milliseconds(1500);

        assert!(timestamp(early) < timestamp(late));
        assert_eq!(parse_timestamp(&timestamp(late)).unwrap(), late);
    }

    #[tokio::test]
    async fn test_in_memory_schema() {
        let pool = open_in_memory().await.unwrap();
        test_connection(&pool).await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('account', 'video', 'view_event', 'like_edge', 'follow_edge', 'notification', 'comment')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(tables, 7);
    }
}
