/// Comments on published videos
///
/// Replies are one level deep: a reply's parent must be a top-level
/// comment on the same video.
use crate::{
    db::{parse_timestamp, timestamp},
    error::{ReelError, ReelResult},
    identity::Actor,
    notifications::{NotificationFanout, NotificationKind, NotificationRequest},
    realtime::{ChangeEvent, ChangeHub},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const MAX_BODY_LEN: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    pub author_id: String,
    pub author_name: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CommentStore {
    db: SqlitePool,
    fanout: NotificationFanout,
    hub: ChangeHub,
}

impl CommentStore {
    pub fn new(db: SqlitePool, fanout: NotificationFanout, hub: ChangeHub) -> Self {
        Self { db, fanout, hub }
    }

    /// Add a comment or a reply to a published video
    pub async fn add(
        &self,
        author: &Actor,
        video_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> ReelResult<Comment> {
        let body = validate_body(body)?;

        let video = sqlx::query("SELECT owner_id, title FROM video WHERE id = ?1 AND status = 'published'")
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ReelError::NotFound(format!("Video {} not found", video_id)))?;
        let owner_id: String = video.try_get("owner_id")?;
        let title: String = video.try_get("title")?;

        let parent_author = match parent_id {
            Some(parent_id) => Some(self.reply_target(video_id, parent_id).await?),
            None => None,
        };

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            video_id: video_id.to_string(),
            author_id: author.account_id.clone(),
            author_name: author.display_name.clone(),
            parent_id: parent_id.map(str::to_string),
            body,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO comment (id, video_id, author_id, parent_id, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.video_id)
        .bind(&comment.author_id)
        .bind(&comment.parent_id)
        .bind(&comment.body)
        .bind(timestamp(comment.created_at))
        .execute(&self.db)
        .await?;

        self.fanout.notify(
            NotificationRequest::new(
                &author.account_id,
                &owner_id,
                NotificationKind::Comment,
                "New Comment",
            )
            .body(format!("{} commented on \"{}\"", author.display_name, title))
            .video(video_id),
        );

        // The owner already heard about it above
        if let Some(parent_author) = parent_author.filter(|id| *id != owner_id) {
            self.fanout.notify(
                NotificationRequest::new(
                    &author.account_id,
                    parent_author,
                    NotificationKind::Comment,
                    "New Reply",
                )
                .body(format!(
                    "{} replied to your comment on \"{}\"",
                    author.display_name, title
                ))
                .video(video_id),
            );
        }

        self.hub.publish(ChangeEvent::CommentAdded {
            video_id: video_id.to_string(),
            comment: comment.clone(),
        });

        Ok(comment)
    }

    /// Comments of a video in posting order
    pub async fn list(&self, video_id: &str) -> ReelResult<Vec<Comment>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.video_id, c.author_id, c.parent_id, c.body, c.created_at,
                   a.display_name AS author_name
            FROM comment c
            LEFT JOIN account a ON a.id = c.author_id
            WHERE c.video_id = ?1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_comment).collect()
    }

    /// Delete a comment (and its replies); author or moderator only
    pub async fn delete(&self, actor: &Actor, comment_id: &str) -> ReelResult<()> {
        let row = sqlx::query("SELECT video_id, author_id FROM comment WHERE id = ?1")
            .bind(comment_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ReelError::NotFound(format!("Comment {} not found", comment_id)))?;

        let video_id: String = row.try_get("video_id")?;
        let author_id: String = row.try_get("author_id")?;

        if author_id != actor.account_id && !actor.is_moderator {
            return Err(ReelError::Unauthorized(
                "Only the author or a moderator can delete a comment".to_string(),
            ));
        }

        sqlx::query("DELETE FROM comment WHERE id = ?1")
            .bind(comment_id)
            .execute(&self.db)
            .await?;

        self.hub.publish(ChangeEvent::CommentDeleted {
            video_id,
            comment_id: comment_id.to_string(),
        });
        Ok(())
    }

    /// Author of the comment being replied to
    async fn reply_target(&self, video_id: &str, parent_id: &str) -> ReelResult<String> {
        let parent = sqlx::query("SELECT video_id, author_id, parent_id FROM comment WHERE id = ?1")
            .bind(parent_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ReelError::NotFound(format!("Comment {} not found", parent_id)))?;

        let parent_video: String = parent.try_get("video_id")?;
        let grandparent: Option<String> = parent.try_get("parent_id")?;

        if parent_video != video_id {
            return Err(ReelError::Validation(
                "A reply must be on the same video as its parent".to_string(),
            ));
        }
        if grandparent.is_some() {
            return Err(ReelError::Validation(
                "Replies can only be made to top-level comments".to_string(),
            ));
        }

        Ok(parent.try_get("author_id")?)
    }
}

fn validate_body(body: &str) -> ReelResult<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ReelError::Validation("Comment cannot be empty".to_string()));
    }
    if body.chars().count() > MAX_BODY_LEN {
        return Err(ReelError::Validation(format!(
            "Comment must be at most {} characters",
            MAX_BODY_LEN
        )));
    }
    Ok(body.to_string())
}

fn row_to_comment(row: &SqliteRow) -> ReelResult<Comment> {
    let author_name: Option<String> = row.try_get("author_name")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Comment {
        id: row.try_get("id")?,
        video_id: row.try_get("video_id")?,
        author_id: row.try_get("author_id")?,
        author_name: author_name.unwrap_or_else(|| "Someone".to_string()),
        parent_id: row.try_get("parent_id")?,
        body: row.try_get("body")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{account::AccountDirectory, open_in_memory},
        moderation::ModerationQueue,
        notifications::NotificationStore,
        videos::VideoDraft,
    };

    struct Fixture {
        comments: CommentStore,
        store: NotificationStore,
        fanout: NotificationFanout,
        video_id: String,
    }

    async fn create_test_comments() -> Fixture {
        let db = open_in_memory().await.unwrap();
        let hub = ChangeHub::new(64);
        let accounts = AccountDirectory::new(db.clone());
        let store = NotificationStore::new(db.clone(), hub.clone());
        let (fanout, _worker) = NotificationFanout::spawn(store.clone(), 16);

        let owner = Actor::moderator("acct-d", "Dora");
        accounts.remember(&owner).await.unwrap();
        accounts.remember(&Actor::new("acct-c", "Caio")).await.unwrap();
        accounts.remember(&Actor::new("acct-e", "Eli")).await.unwrap();

        let queue = ModerationQueue::new(db.clone(), accounts, fanout.clone(), hub.clone(), None);
        let receipt = queue
            .submit(&owner, VideoDraft::new("Tides", "https://cdn.example/v/tides.mp4"))
            .await
            .unwrap();

        Fixture {
            comments: CommentStore::new(db, fanout.clone(), hub),
            store,
            fanout,
            video_id: receipt.id,
        }
    }

    #[tokio::test]
    async fn test_comment_notifies_owner_not_self() {
        let f = create_test_comments().await;

        f.comments
            .add(&Actor::new("acct-c", "Caio"), &f.video_id, " Great video! ", None)
            .await
            .unwrap();
        f.comments
            .add(&Actor::moderator("acct-d", "Dora"), &f.video_id, "Thanks!", None)
            .await
            .unwrap();
        f.fanout.flush().await;

        let inbox = f.store.list("acct-d", None, None).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].body.as_deref(), Some("Caio commented on \"Tides\""));

        let listed = f.comments.list(&f.video_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].body, "Great video!");
        assert_eq!(listed[0].author_name, "Caio");
    }

    #[tokio::test]
    async fn test_reply_notifies_parent_author() {
        let f = create_test_comments().await;
        let parent = f
            .comments
            .add(&Actor::new("acct-c", "Caio"), &f.video_id, "Question", None)
            .await
            .unwrap();

        let reply = f
            .comments
            .add(&Actor::new("acct-e", "Eli"), &f.video_id, "Answer", Some(&parent.id))
            .await
            .unwrap();
        f.fanout.flush().await;

        let inbox = f.store.list("acct-c", None, None).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].title, "New Reply");

        // Replies to replies are rejected
        let err = f
            .comments
            .add(&Actor::new("acct-c", "Caio"), &f.video_id, "More", Some(&reply.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Validation(_)));
    }

    #[tokio::test]
    async fn test_comment_validation_and_delete() {
        let f = create_test_comments().await;
        let caio = Actor::new("acct-c", "Caio");

        assert!(matches!(
            f.comments.add(&caio, &f.video_id, "   ", None).await,
            Err(ReelError::Validation(_))
        ));
        assert!(matches!(
            f.comments.add(&caio, "missing", "Hi", None).await,
            Err(ReelError::NotFound(_))
        ));

        let comment = f.comments.add(&caio, &f.video_id, "Hi", None).await.unwrap();
        assert!(matches!(
            f.comments.delete(&Actor::new("acct-e", "Eli"), &comment.id).await,
            Err(ReelError::Unauthorized(_))
        ));
        f.comments.delete(&caio, &comment.id).await.unwrap();
        assert!(f.comments.list(&f.video_id).await.unwrap().is_empty());
    }
}
