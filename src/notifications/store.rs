/// Notification persistence
use crate::{
    db::{parse_timestamp, timestamp, PageCursor},
    error::{ReelError, ReelResult},
    notifications::{Notification, NotificationKind, NotificationRequest},
    realtime::{ChangeEvent, ChangeHub},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

/// Notification rows, scoped by recipient
#[derive(Clone)]
pub struct NotificationStore {
    db: SqlitePool,
    hub: ChangeHub,
}

impl NotificationStore {
    pub fn new(db: SqlitePool, hub: ChangeHub) -> Self {
        Self { db, hub }
    }

    /// Insert an unread notification and push it to the recipient's stream
    pub async fn insert(&self, request: &NotificationRequest) -> ReelResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: request.recipient_id.clone(),
            kind: request.kind,
            title: request.title.clone(),
            body: request.body.clone(),
            video_id: request.video_id.clone(),
            read: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO notification (id, recipient_id, kind, title, body, video_id, is_read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.recipient_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.video_id)
        .bind(timestamp(notification.created_at))
        .execute(&self.db)
        .await?;

        self.hub.publish(ChangeEvent::NotificationCreated {
            notification: notification.clone(),
        });

        Ok(notification)
    }

    /// Newest-first page of a recipient's notifications
    pub async fn list(
        &self,
        recipient_id: &str,
        limit: Option<i64>,
        before: Option<&PageCursor>,
    ) -> ReelResult<Vec<Notification>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        let (before_at, before_id) = PageCursor::bind_values(before);

        let rows = sqlx::query(
            r#"
            SELECT id, recipient_id, kind, title, body, video_id, is_read, created_at
            FROM notification
            WHERE recipient_id = ?1
              AND (?2 IS NULL OR created_at < ?2 OR (created_at = ?2 AND id < ?3))
            ORDER BY created_at DESC, id DESC
            LIMIT ?4
            "#,
        )
        .bind(recipient_id)
        .bind(before_at)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }

    /// Unread count, always derived from rows
    pub async fn unread_count(&self, recipient_id: &str) -> ReelResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification WHERE recipient_id = ?1 AND is_read = 0",
        )
        .bind(recipient_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// Flip the read flag of exactly one notification owned by the caller
    pub async fn mark_read(&self, caller_id: &str, notification_id: &str) -> ReelResult<()> {
        self.ensure_recipient(caller_id, notification_id).await?;

        sqlx::query("UPDATE notification SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2")
            .bind(notification_id)
            .bind(caller_id)
            .execute(&self.db)
            .await?;

        self.hub.publish(ChangeEvent::NotificationsRead {
            recipient_id: caller_id.to_string(),
            notification_id: Some(notification_id.to_string()),
        });

        Ok(())
    }

    /// Flip every unread notification of a recipient in one batch
    pub async fn mark_all_read(&self, recipient_id: &str) -> ReelResult<u64> {
        let result =
            sqlx::query("UPDATE notification SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0")
                .bind(recipient_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() > 0 {
            self.hub.publish(ChangeEvent::NotificationsRead {
                recipient_id: recipient_id.to_string(),
                notification_id: None,
            });
        }

        Ok(result.rows_affected())
    }

    /// Delete every notification of a recipient
    pub async fn clear_all(&self, recipient_id: &str) -> ReelResult<u64> {
        let result = sqlx::query("DELETE FROM notification WHERE recipient_id = ?1")
            .bind(recipient_id)
            .execute(&self.db)
            .await?;

        self.hub.publish(ChangeEvent::NotificationsCleared {
            recipient_id: recipient_id.to_string(),
            notification_id: None,
        });

        Ok(result.rows_affected())
    }

    /// Delete one notification owned by the caller
    pub async fn delete(&self, caller_id: &str, notification_id: &str) -> ReelResult<()> {
        self.ensure_recipient(caller_id, notification_id).await?;

        sqlx::query("DELETE FROM notification WHERE id = ?1 AND recipient_id = ?2")
            .bind(notification_id)
            .bind(caller_id)
            .execute(&self.db)
            .await?;

        self.hub.publish(ChangeEvent::NotificationsCleared {
            recipient_id: caller_id.to_string(),
            notification_id: Some(notification_id.to_string()),
        });

        Ok(())
    }

    async fn ensure_recipient(&self, caller_id: &str, notification_id: &str) -> ReelResult<()> {
        let recipient: Option<String> =
            sqlx::query_scalar("SELECT recipient_id FROM notification WHERE id = ?1")
                .bind(notification_id)
                .fetch_optional(&self.db)
                .await?;

        match recipient {
            None => Err(ReelError::NotFound(format!(
                "Notification {} not found",
                notification_id
            ))),
            Some(recipient) if recipient != caller_id => Err(ReelError::Unauthorized(
                "Notifications can only be changed by their recipient".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

/// Convert database row to Notification
fn row_to_notification(row: &SqliteRow) -> ReelResult<Notification> {
    let kind: String = row.try_get("kind")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Notification {
        id: row.try_get("id")?,
        recipient_id: row.try_get("recipient_id")?,
        kind: NotificationKind::from_str(&kind)?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        video_id: row.try_get("video_id")?,
        read: row.try_get("is_read")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::open_in_memory, realtime::Topic};

    async fn create_test_store() -> NotificationStore {
        let db = open_in_memory().await.unwrap();
        NotificationStore::new(db, ChangeHub::new(64))
    }

    fn follow_request(recipient: &str) -> NotificationRequest {
        NotificationRequest::new("acct-a", recipient, NotificationKind::Follow, "New Follower")
            .body("Ana started following you")
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = create_test_store().await;

        let created = store.insert(&follow_request("acct-b")).await.unwrap();
        assert!(!created.read);

        let listed = store.list("acct-b", None, None).await.unwrap();
        assert_eq!(listed, vec![created]);
        assert!(store.list("acct-c", None, None).await.unwrap().is_empty());
        assert_eq!(store.unread_count("acct-b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_requires_recipient() {
        let store = create_test_store().await;
        let n = store.insert(&follow_request("acct-b")).await.unwrap();

        let err = store.mark_read("acct-c", &n.id).await.unwrap_err();
        assert!(matches!(err, ReelError::Unauthorized(_)));

        let err = store.mark_read("acct-b", "missing").await.unwrap_err();
        assert!(matches!(err, ReelError::NotFound(_)));

        store.mark_read("acct-b", &n.id).await.unwrap();
        assert_eq!(store.unread_count("acct-b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_touches_exactly_one() {
        let store = create_test_store().await;
        let first = store.insert(&follow_request("acct-b")).await.unwrap();
        store.insert(&follow_request("acct-b")).await.unwrap();

        store.mark_read("acct-b", &first.id).await.unwrap();
        assert_eq!(store.unread_count("acct-b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_and_clear_are_scoped() {
        let store = create_test_store().await;
        for _ in 0..3 {
            store.insert(&follow_request("acct-b")).await.unwrap();
        }
        store.insert(&follow_request("acct-c")).await.unwrap();

        assert_eq!(store.mark_all_read("acct-b").await.unwrap(), 3);
        assert_eq!(store.unread_count("acct-b").await.unwrap(), 0);
        assert_eq!(store.unread_count("acct-c").await.unwrap(), 1);

        assert_eq!(store.clear_all("acct-b").await.unwrap(), 3);
        assert!(store.list("acct-b", None, None).await.unwrap().is_empty());
        assert_eq!(store.list("acct-c", None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_is_pushed_to_recipient_topic() {
        let store = create_test_store().await;
        let mut stream = store
            .hub
            .subscribe([Topic::Notifications("acct-b".to_string())]);

        let created = store.insert(&follow_request("acct-b")).await.unwrap();

        match stream.try_next() {
            Some(crate::realtime::Delivery::Event(ChangeEvent::NotificationCreated { notification })) => {
                assert_eq!(notification.id, created.id)
            }
            other => panic!("unexpected delivery: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_paging_keeps_rows_with_shared_timestamp() {
        let store = create_test_store().await;
        for _ in 0..5 {
            store.insert(&follow_request("acct-b")).await.unwrap();
        }
        // Fan-out bursts can land in the same microsecond
        sqlx::query("UPDATE notification SET created_at = ?1 WHERE recipient_id = 'acct-b'")
            .bind(timestamp(Utc::now()))
            .execute(&store.db)
            .await
            .unwrap();

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = store.list("acct-b", Some(2), cursor.as_ref()).await.unwrap();
            let Some(last) = page.last() else { break };
            cursor = Some(PageCursor::new(last.created_at, last.id.clone()));
            seen.extend(page.into_iter().map(|n| n.id));
        }

        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(seen.len(), 5);
        assert_eq!(unique.len(), 5);
    }
}
