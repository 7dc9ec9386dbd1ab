/// Reads, owner edits and deletion of videos
use crate::{
    db::{timestamp, PageCursor},
    error::{ReelError, ReelResult},
    identity::Actor,
    realtime::{ChangeEvent, ChangeHub},
    videos::{row_to_video, Video, VideoPatch, VIDEO_COLUMNS},
};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

const DEFAULT_PAGE: i64 = 24;
const MAX_PAGE: i64 = 100;

#[derive(Clone)]
pub struct VideoCatalog {
    db: SqlitePool,
    hub: ChangeHub,
}

impl VideoCatalog {
    pub fn new(db: SqlitePool, hub: ChangeHub) -> Self {
        Self { db, hub }
    }

    /// Fetch a video as seen by `viewer`. Owners and moderators also see
    /// pending, private and not-yet-released videos.
    pub async fn get(&self, video_id: &str, viewer: Option<&Actor>) -> ReelResult<Video> {
        let video = self
            .find(video_id)
            .await?
            .filter(|video| can_see(video, viewer, Utc::now()))
            .ok_or_else(|| ReelError::NotFound(format!("Video {} not found", video_id)))?;

        Ok(video)
    }

    /// Newest-first page of videos visible to the audience
    pub async fn list_published(
        &self,
        limit: Option<i64>,
        before: Option<&PageCursor>,
    ) -> ReelResult<Vec<Video>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        let now = timestamp(Utc::now());
        let (before_at, before_id) = PageCursor::bind_values(before);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM video
            WHERE status = 'published'
              AND (visibility = 'public' OR (visibility = 'scheduled' AND scheduled_at <= ?1))
              AND (?2 IS NULL OR published_at < ?2 OR (published_at = ?2 AND id < ?3))
            ORDER BY published_at DESC, id DESC
            LIMIT ?4
            "#,
            VIDEO_COLUMNS
        ))
        .bind(&now)
        .bind(before_at)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_video).collect()
    }

    /// A creator's videos; the creator also sees their pending ones
    pub async fn list_by_owner(&self, owner_id: &str, viewer: Option<&Actor>) -> ReelResult<Vec<Video>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM video WHERE owner_id = ?1 ORDER BY submitted_at DESC, id DESC",
            VIDEO_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        let now = Utc::now();
        let videos = rows
            .iter()
            .map(row_to_video)
            .collect::<ReelResult<Vec<_>>>()?;

        Ok(videos
            .into_iter()
            .filter(|video| can_see(video, viewer, now))
            .collect())
    }

    /// Owner edit of title, description, thumbnail and visibility.
    /// Pending submissions belong to the moderation queue and are reported
    /// as not found.
    pub async fn edit(&self, editor: &Actor, video_id: &str, patch: VideoPatch) -> ReelResult<Video> {
        if patch.is_empty() {
            return Err(ReelError::Validation("Nothing to update".to_string()));
        }

        let mut video = self
            .find_published(video_id)
            .await?
            .ok_or_else(|| ReelError::NotFound(format!("Video {} not found", video_id)))?;

        if video.owner_id != editor.account_id {
            return Err(ReelError::Unauthorized(
                "Only the owner can edit a video".to_string(),
            ));
        }

        patch.apply_to(&mut video, Utc::now())?;

        let updated = sqlx::query(
            r#"
            UPDATE video
            SET title = ?1, description = ?2, thumbnail_ref = ?3, visibility = ?4, scheduled_at = ?5
            WHERE id = ?6 AND status = 'published'
            "#,
        )
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_ref)
        .bind(video.visibility.as_str())
        .bind(video.scheduled_at.map(timestamp))
        .bind(video_id)
        .execute(&self.db)
        .await?;

        // Deleted between the read and the write
        if updated.rows_affected() == 0 {
            return Err(ReelError::NotFound(format!("Video {} not found", video_id)));
        }

        tracing::info!("Video {} edited by {}", video_id, editor.account_id);
        Ok(video)
    }

    /// Delete a published video with its views, likes and comments. A
    /// pending submission only leaves the queue through a decision.
    pub async fn delete(&self, actor: &Actor, video_id: &str) -> ReelResult<()> {
        let owner_id: String = sqlx::query_scalar(
            "SELECT owner_id FROM video WHERE id = ?1 AND status = 'published'",
        )
        .bind(video_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ReelError::NotFound(format!("Video {} not found", video_id)))?;

        if owner_id != actor.account_id && !actor.is_moderator {
            return Err(ReelError::Unauthorized(
                "Only the owner or a moderator can delete a video".to_string(),
            ));
        }

        let deleted = sqlx::query("DELETE FROM video WHERE id = ?1 AND status = 'published'")
            .bind(video_id)
            .execute(&self.db)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(ReelError::NotFound(format!("Video {} not found", video_id)));
        }

        tracing::info!("Video {} deleted by {}", video_id, actor.account_id);
        self.hub.publish(ChangeEvent::VideoDeleted {
            video_id: video_id.to_string(),
        });
        Ok(())
    }

    /// Turn due scheduled videos public; returns how many were released
    pub async fn release_scheduled(&self) -> ReelResult<u64> {
        let rows = sqlx::query(
            r#"
            UPDATE video SET visibility = 'public', scheduled_at = NULL
            WHERE status = 'published' AND visibility = 'scheduled' AND scheduled_at <= ?1
            RETURNING id, owner_id, title
            "#,
        )
        .bind(timestamp(Utc::now()))
        .fetch_all(&self.db)
        .await?;

        for row in &rows {
            let video_id: String = row.try_get("id")?;
            tracing::info!("Released scheduled video {}", video_id);
            self.hub.publish(ChangeEvent::VideoPublished {
                video_id,
                owner_id: row.try_get("owner_id")?,
                title: row.try_get("title")?,
            });
        }

        Ok(rows.len() as u64)
    }

    pub(crate) async fn find(&self, video_id: &str) -> ReelResult<Option<Video>> {
        let row = sqlx::query(&format!("SELECT {} FROM video WHERE id = ?1", VIDEO_COLUMNS))
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(row_to_video).transpose()
    }

    async fn find_published(&self, video_id: &str) -> ReelResult<Option<Video>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM video WHERE id = ?1 AND status = 'published'",
            VIDEO_COLUMNS
        ))
        .bind(video_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(row_to_video).transpose()
    }
}

fn can_see(video: &Video, viewer: Option<&Actor>, now: DateTime<Utc>) -> bool {
    if video.is_visible_to_audience(now) {
        return true;
    }
    match viewer {
        Some(actor) => actor.account_id == video.owner_id || actor.is_moderator,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{account::AccountDirectory, open_in_memory},
        moderation::{ModerationQueue, SubmissionState},
        notifications::{NotificationFanout, NotificationStore},
        videos::{VideoDraft, Visibility},
    };
    use chrono::Duration;

    struct Fixture {
        catalog: VideoCatalog,
        queue: ModerationQueue,
    }

    async fn create_test_catalog() -> Fixture {
        let db = open_in_memory().await.unwrap();
        let hub = ChangeHub::new(64);
        let accounts = AccountDirectory::new(db.clone());
        let store = NotificationStore::new(db.clone(), hub.clone());
        let (fanout, _worker) = NotificationFanout::spawn(store, 16);

        Fixture {
            catalog: VideoCatalog::new(db.clone(), hub.clone()),
            queue: ModerationQueue::new(db, accounts, fanout, hub, None),
        }
    }

    fn draft(title: &str) -> VideoDraft {
        VideoDraft::new(title, "https://cdn.example/v/clip.mp4")
    }

    #[tokio::test]
    async fn test_pending_hidden_from_audience() {
        let f = create_test_catalog().await;
        let ana = Actor::new("acct-a", "Ana");
        let receipt = f.queue.submit(&ana, draft("Tides")).await.unwrap();

        assert!(matches!(
            f.catalog.get(&receipt.id, None).await,
            Err(ReelError::NotFound(_))
        ));
        assert!(f.catalog.get(&receipt.id, Some(&ana)).await.is_ok());
        assert!(f
            .catalog
            .get(&receipt.id, Some(&Actor::moderator("mod-1", "Rivera")))
            .await
            .is_ok());
        assert!(f.catalog.list_published(None, None).await.unwrap().is_empty());
        assert_eq!(f.catalog.list_by_owner("acct-a", Some(&ana)).await.unwrap().len(), 1);
        assert!(f.catalog.list_by_owner("acct-a", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_video_released_when_due() {
        let f = create_test_catalog().await;
        let moderator = Actor::moderator("mod-1", "Rivera");

        let mut scheduled = draft("Eclipse");
        scheduled.visibility = Visibility::Scheduled;
        scheduled.scheduled_at = Some(Utc::now() + Duration::hours(1));
        let receipt = f.queue.submit(&moderator, scheduled).await.unwrap();

        assert!(f.catalog.list_published(None, None).await.unwrap().is_empty());
        assert_eq!(f.catalog.release_scheduled().await.unwrap(), 0);

        // Pretend the time has come
        sqlx::query("UPDATE video SET scheduled_at = ?1 WHERE id = ?2")
            .bind(timestamp(Utc::now() - Duration::minutes(1)))
            .bind(&receipt.id)
            .execute(&f.catalog.db)
            .await
            .unwrap();

        assert_eq!(f.catalog.release_scheduled().await.unwrap(), 1);
        let video = f.catalog.get(&receipt.id, None).await.unwrap();
        assert_eq!(video.visibility, Visibility::Public);
        assert_eq!(f.catalog.list_published(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_only_owner_edits() {
        let f = create_test_catalog().await;
        let owner = Actor::moderator("acct-d", "Dora");
        let receipt = f.queue.submit(&owner, draft("Old title")).await.unwrap();

        let patch = VideoPatch {
            title: Some("New title".to_string()),
            ..Default::default()
        };

        let err = f
            .catalog
            .edit(&Actor::new("acct-c", "Caio"), &receipt.id, patch.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Unauthorized(_)));

        let edited = f.catalog.edit(&owner, &receipt.id, patch).await.unwrap();
        assert_eq!(edited.title, "New title");
        assert_eq!(f.catalog.get(&receipt.id, None).await.unwrap().title, "New title");

        let err = f
            .catalog
            .edit(&owner, &receipt.id, VideoPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_by_owner_or_moderator() {
        let f = create_test_catalog().await;
        let owner = Actor::moderator("acct-d", "Dora");
        let first = f.queue.submit(&owner, draft("One")).await.unwrap();
        let second = f.queue.submit(&owner, draft("Two")).await.unwrap();

        let err = f
            .catalog
            .delete(&Actor::new("acct-c", "Caio"), &first.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Unauthorized(_)));

        f.catalog.delete(&owner, &first.id).await.unwrap();
        f.catalog
            .delete(&Actor::moderator("mod-2", "Other"), &second.id)
            .await
            .unwrap();

        assert!(matches!(
            f.catalog.delete(&owner, &first.id).await,
            Err(ReelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_submission_cannot_be_edited_or_deleted() {
        let f = create_test_catalog().await;
        let ana = Actor::new("acct-a", "Ana");
        let moderator = Actor::moderator("mod-1", "Rivera");
        let receipt = f.queue.submit(&ana, draft("Tides")).await.unwrap();

        let patch = VideoPatch {
            title: Some("Something else".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.catalog.edit(&ana, &receipt.id, patch).await,
            Err(ReelError::NotFound(_))
        ));
        assert!(matches!(
            f.catalog.delete(&ana, &receipt.id).await,
            Err(ReelError::NotFound(_))
        ));
        assert!(matches!(
            f.catalog.delete(&moderator, &receipt.id).await,
            Err(ReelError::NotFound(_))
        ));

        assert_eq!(
            f.queue.state_of(&receipt.id).await.unwrap(),
            Some(SubmissionState::Pending)
        );
        let video = f.catalog.get(&receipt.id, Some(&ana)).await.unwrap();
        assert_eq!(video.title, "Tides");
        assert_eq!(f.queue.pending_count(&moderator).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_published_paging_keeps_shared_timestamps() {
        let f = create_test_catalog().await;
        let moderator = Actor::moderator("mod-1", "Rivera");
        for title in ["Ratios", "Rates", "Percents", "Proportions"] {
            f.queue.submit(&moderator, draft(title)).await.unwrap();
        }
        sqlx::query("UPDATE video SET published_at = ?1")
            .bind(timestamp(Utc::now() - Duration::minutes(5)))
            .execute(&f.catalog.db)
            .await
            .unwrap();

        let first = f.catalog.list_published(Some(3), None).await.unwrap();
        assert_eq!(first.len(), 3);
        let last = &first[2];
        let cursor = PageCursor::new(last.published_at.unwrap(), last.id.clone());

        let second = f.catalog.list_published(Some(3), Some(&cursor)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(first.iter().all(|video| video.id != second[0].id));

        // A bare timestamp cursor still excludes every row at that instant
        let bare = PageCursor::from_params(last.published_at, None);
        assert!(f
            .catalog
            .list_published(None, bare.as_ref())
            .await
            .unwrap()
            .is_empty());
    }
}
