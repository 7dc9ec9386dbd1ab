/// Account directory mirrored from the identity provider
///
/// Rows are refreshed from verified session tokens. The pipeline only reads
/// them to name actors in notifications and to locate the review recipient.
use crate::{
    db::{parse_timestamp, timestamp},
    error::ReelResult,
    identity::Actor,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Account record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub is_moderator: bool,
    /// First time the account was seen; never refreshed
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-mostly view over the `account` table
#[derive(Clone)]
pub struct AccountDirectory {
    db: SqlitePool,
}

impl AccountDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Refresh the mirrored row for a verified actor. `created_at` is only
    /// written by the first insert.
    pub async fn remember(&self, actor: &Actor) -> ReelResult<()> {
        sqlx::query(
            r#"
            INSERT INTO account (id, display_name, avatar_ref, is_moderator, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_ref = excluded.avatar_ref,
                is_moderator = excluded.is_moderator,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&actor.account_id)
        .bind(&actor.display_name)
        .bind(&actor.avatar_ref)
        .bind(actor.is_moderator)
        .bind(timestamp(Utc::now()))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Get an account by id
    pub async fn get(&self, id: &str) -> ReelResult<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, display_name, avatar_ref, is_moderator, created_at, updated_at
            FROM account WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn exists(&self, id: &str) -> ReelResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM account WHERE id = ?1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(exists)
    }

    /// Locate the account that receives upload review notifications.
    ///
    /// A configured account wins when it is a known moderator; otherwise the
    /// moderator seen first is used. Activity never changes the choice.
    pub async fn review_recipient(&self, configured: Option<&str>) -> ReelResult<Option<String>> {
        if let Some(id) = configured {
            match self.get(id).await? {
                Some(account) if account.is_moderator => return Ok(Some(account.id)),
                Some(_) => {
                    tracing::warn!("Configured review account {} is not a moderator", id)
                }
                None => tracing::warn!("Configured review account {} is unknown", id),
            }
        }

        let id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM account WHERE is_moderator = 1 ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await?;

        Ok(id)
    }
}

/// Convert database row to Account
fn row_to_account(row: &SqliteRow) -> ReelResult<Account> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Account {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        avatar_ref: row.try_get("avatar_ref")?,
        is_moderator: row.try_get("is_moderator")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[tokio::test]
    async fn test_remember_refreshes_profile() {
        let directory = AccountDirectory::new(open_in_memory().await.unwrap());

        directory.remember(&Actor::new("acct-a", "Ana")).await.unwrap();
        directory
            .remember(&Actor::new("acct-a", "Ana Lima").with_avatar("https://cdn.example/a.png"))
            .await
            .unwrap();

        let account = directory.get("acct-a").await.unwrap().unwrap();
        assert_eq!(account.display_name, "Ana Lima");
        assert_eq!(account.avatar_ref.as_deref(), Some("https://cdn.example/a.png"));
        assert!(!account.is_moderator);
        assert!(account.updated_at >= account.created_at);
        assert!(directory.get("acct-zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_review_recipient_prefers_configured_moderator() {
        let directory = AccountDirectory::new(open_in_memory().await.unwrap());

        assert_eq!(directory.review_recipient(None).await.unwrap(), None);

        directory.remember(&Actor::moderator("mod-1", "First")).await.unwrap();
        directory.remember(&Actor::moderator("mod-2", "Second")).await.unwrap();
        directory.remember(&Actor::new("acct-a", "Ana")).await.unwrap();

        assert_eq!(
            directory.review_recipient(Some("mod-2")).await.unwrap().as_deref(),
            Some("mod-2")
        );
        // A non-moderator is never used as the recipient
        assert_eq!(
            directory.review_recipient(Some("acct-a")).await.unwrap().as_deref(),
            Some("mod-1")
        );
    }

    #[tokio::test]
    async fn test_review_recipient_stable_across_activity() {
        let directory = AccountDirectory::new(open_in_memory().await.unwrap());

        directory.remember(&Actor::moderator("mod-1", "First")).await.unwrap();
        let first_seen = directory.get("mod-1").await.unwrap().unwrap().created_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        directory.remember(&Actor::moderator("mod-2", "Second")).await.unwrap();
        assert_eq!(
            directory.review_recipient(None).await.unwrap().as_deref(),
            Some("mod-1")
        );

        // A later request from mod-1 refreshes the profile only
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        directory.remember(&Actor::moderator("mod-1", "First Again")).await.unwrap();

        let account = directory.get("mod-1").await.unwrap().unwrap();
        assert_eq!(account.created_at, first_seen);
        assert!(account.updated_at > first_seen);
        assert_eq!(
            directory.review_recipient(None).await.unwrap().as_deref(),
            Some("mod-1")
        );
    }
}
