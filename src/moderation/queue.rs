/// Moderation queue operations
use crate::{
    db::{account::AccountDirectory, timestamp},
    error::{ReelError, ReelResult},
    identity::Actor,
    metrics,
    moderation::{Decision, SubmissionState},
    notifications::{NotificationFanout, NotificationKind, NotificationRequest},
    realtime::{ChangeEvent, ChangeHub},
    videos::{row_to_video, Video, VideoDraft, VIDEO_COLUMNS},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Result of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub id: String,
    pub state: SubmissionState,
}

/// Result of a moderation decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub video_id: String,
    pub state: SubmissionState,
    pub title: String,
    pub owner_id: String,
}

/// A pending video as shown to moderators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    #[serde(flatten)]
    pub video: Video,
    pub owner_name: String,
    pub owner_avatar: Option<String>,
}

/// Moderation queue over the `video` table
#[derive(Clone)]
pub struct ModerationQueue {
    db: SqlitePool,
    accounts: AccountDirectory,
    fanout: NotificationFanout,
    hub: ChangeHub,
    review_account: Option<String>,
}

impl ModerationQueue {
    pub fn new(
        db: SqlitePool,
        accounts: AccountDirectory,
        fanout: NotificationFanout,
        hub: ChangeHub,
        review_account: Option<String>,
    ) -> Self {
        Self {
            db,
            accounts,
            fanout,
            hub,
            review_account,
        }
    }

    /// Submit a video for publication
    pub async fn submit(&self, owner: &Actor, draft: VideoDraft) -> ReelResult<SubmissionReceipt> {
        let now = Utc::now();
        let draft = draft.validate(now)?;
        let state = SubmissionState::initial(owner.is_moderator);
        let id = Uuid::new_v4().to_string();
        let published_at = (state == SubmissionState::Published).then(|| timestamp(now));

        sqlx::query(
            r#"
            INSERT INTO video (id, owner_id, title, description, media_ref, thumbnail_ref,
                               visibility, scheduled_at, status, views, submitted_at, published_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11)
            "#,
        )
        .bind(&id)
        .bind(&owner.account_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.media_ref)
        .bind(&draft.thumbnail_ref)
        .bind(draft.visibility.as_str())
        .bind(draft.scheduled_at.map(timestamp))
        .bind(state.as_str())
        .bind(timestamp(now))
        .bind(published_at)
        .execute(&self.db)
        .await?;

        match state {
            SubmissionState::Published => {
                tracing::info!(
                    "Moderator {} published video {} directly",
                    owner.account_id,
                    id
                );
                metrics::record_moderation_action("auto_publish");
                self.hub.publish(ChangeEvent::VideoPublished {
                    video_id: id.clone(),
                    owner_id: owner.account_id.clone(),
                    title: draft.title.clone(),
                });
            }
            _ => {
                tracing::info!("Video {} submitted for review by {}", id, owner.account_id);
                metrics::record_moderation_action("submit");
                self.publish_queue_change(&id, state).await;
                self.request_review(owner, &id, &draft.title).await;
            }
        }

        Ok(SubmissionReceipt { id, state })
    }

    /// Approve or decline a pending submission
    pub async fn decide(
        &self,
        moderator: &Actor,
        video_id: &str,
        decision: Decision,
    ) -> ReelResult<DecisionOutcome> {
        if !moderator.is_moderator {
            return Err(ReelError::Unauthorized(
                "Only moderators can decide on submissions".to_string(),
            ));
        }

        let before = self.find(video_id).await?;
        let target = match &before {
            Some(video) => video.state.transition(decision)?,
            None => {
                return Err(ReelError::NotFound(format!(
                    "Submission {} not found",
                    video_id
                )))
            }
        };

        let written = match decision {
            Decision::Approve => {
                sqlx::query(
                    r#"
                    UPDATE video SET status = 'published', published_at = ?1
                    WHERE id = ?2 AND status = 'pending'
                    RETURNING owner_id, title
                    "#,
                )
                .bind(timestamp(Utc::now()))
                .bind(video_id)
                .fetch_optional(&self.db)
                .await
            }
            Decision::Decline => {
                sqlx::query(
                    "DELETE FROM video WHERE id = ?1 AND status = 'pending' RETURNING owner_id, title",
                )
                .bind(video_id)
                .fetch_optional(&self.db)
                .await
            }
        };

        let row = match written {
            Ok(Some(row)) => row,
            // Another decision consumed the row first
            Ok(None) => {
                return Err(ReelError::NotFound(format!(
                    "Submission {} is no longer pending",
                    video_id
                )))
            }
            Err(e) => return self.recover_decision(video_id, target, before, e).await,
        };

        let owner_id: String = row.try_get("owner_id")?;
        let title: String = row.try_get("title")?;

        tracing::info!(
            "Moderator {} {}d video {}",
            moderator.account_id,
            decision.as_str(),
            video_id
        );
        metrics::record_moderation_action(decision.as_str());

        let request = match decision {
            Decision::Approve => {
                self.hub.publish(ChangeEvent::VideoPublished {
                    video_id: video_id.to_string(),
                    owner_id: owner_id.clone(),
                    title: title.clone(),
                });
                NotificationRequest::new(
                    &moderator.account_id,
                    &owner_id,
                    NotificationKind::Approval,
                    "Video approved",
                )
                .body(format!("Your video \"{}\" is now published", title))
                .video(video_id)
            }
            // The row is gone, so the notification cannot reference it
            Decision::Decline => NotificationRequest::new(
                &moderator.account_id,
                &owner_id,
                NotificationKind::Decline,
                "Video declined",
            )
            .body(format!("Your video \"{}\" was declined by a moderator", title)),
        };
        self.fanout.notify(request);
        self.publish_queue_change(video_id, target).await;

        Ok(DecisionOutcome {
            video_id: video_id.to_string(),
            state: target,
            title,
            owner_id,
        })
    }

    /// Pending submissions, oldest first
    pub async fn list_pending(&self, moderator: &Actor) -> ReelResult<Vec<PendingSubmission>> {
        ensure_moderator(moderator)?;

        let rows = sqlx::query(
            r#"
            SELECT v.id, v.owner_id, v.title, v.description, v.media_ref, v.thumbnail_ref,
                   v.visibility, v.scheduled_at, v.status, v.views, v.submitted_at, v.published_at,
                   a.display_name AS owner_name, a.avatar_ref AS owner_avatar
            FROM video v
            LEFT JOIN account a ON a.id = v.owner_id
            WHERE v.status = 'pending'
            ORDER BY v.submitted_at ASC, v.id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> ReelResult<PendingSubmission> {
                let owner_name: Option<String> = row.try_get("owner_name")?;
                Ok(PendingSubmission {
                    video: row_to_video(row)?,
                    owner_name: owner_name.unwrap_or_else(|| "Someone".to_string()),
                    owner_avatar: row.try_get("owner_avatar")?,
                })
            })
            .collect()
    }

    /// Number of pending submissions (the moderator badge)
    pub async fn pending_count(&self, moderator: &Actor) -> ReelResult<i64> {
        ensure_moderator(moderator)?;
        self.count_pending().await
    }

    /// Current state of a submission; `None` once it has been declined
    pub async fn state_of(&self, video_id: &str) -> ReelResult<Option<SubmissionState>> {
        Ok(self.find(video_id).await?.map(|video| video.state))
    }

    async fn count_pending(&self) -> ReelResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM video WHERE status = 'pending'")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn find(&self, video_id: &str) -> ReelResult<Option<Video>> {
        let row = sqlx::query(&format!("SELECT {} FROM video WHERE id = ?1", VIDEO_COLUMNS))
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(row_to_video).transpose()
    }

    /// The write failed without a clear answer; report what is persisted
    async fn recover_decision(
        &self,
        video_id: &str,
        target: SubmissionState,
        before: Option<Video>,
        error: sqlx::Error,
    ) -> ReelResult<DecisionOutcome> {
        tracing::warn!(
            "Decision write for {} failed, re-reading state: {}",
            video_id,
            error
        );

        let current = match self.state_of(video_id).await {
            Ok(state) => state,
            Err(_) => return Err(ReelError::Database(error)),
        };
        let persisted = current.unwrap_or(SubmissionState::Declined);

        match (persisted, before) {
            (state, Some(video)) if state == target => {
                // Persisted, but possibly by a concurrent decision; no notification
                tracing::warn!(
                    "Decision for {} persisted despite the error; owner not notified",
                    video_id
                );
                Ok(DecisionOutcome {
                    video_id: video_id.to_string(),
                    state,
                    title: video.title,
                    owner_id: video.owner_id,
                })
            }
            (SubmissionState::Pending, _) => Err(ReelError::Dependency(format!(
                "Decision for {} was not recorded",
                video_id
            ))),
            _ => Err(ReelError::NotFound(format!(
                "Submission {} is no longer pending",
                video_id
            ))),
        }
    }

    async fn request_review(&self, owner: &Actor, video_id: &str, title: &str) {
        let recipient = match self
            .accounts
            .review_recipient(self.review_account.as_deref())
            .await
        {
            Ok(Some(recipient)) => recipient,
            Ok(None) => {
                tracing::warn!(
                    "No moderator available, skipping review notification for {}",
                    video_id
                );
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to locate review recipient for {}: {}", video_id, e);
                return;
            }
        };

        self.fanout.notify(
            NotificationRequest::new(
                &owner.account_id,
                recipient,
                NotificationKind::UploadReview,
                "New video awaiting review",
            )
            .body(format!(
                "{} submitted \"{}\" for review",
                owner.display_name, title
            ))
            .video(video_id),
        );
    }

    async fn publish_queue_change(&self, video_id: &str, state: SubmissionState) {
        match self.count_pending().await {
            Ok(pending) => {
                metrics::MODERATION_PENDING.set(pending);
                self.hub.publish(ChangeEvent::QueueChanged {
                    video_id: video_id.to_string(),
                    state,
                    pending,
                });
            }
            Err(e) => tracing::warn!("Failed to count pending submissions: {}", e),
        }
    }
}

fn ensure_moderator(actor: &Actor) -> ReelResult<()> {
    if actor.is_moderator {
        Ok(())
    } else {
        Err(ReelError::Unauthorized(
            "The moderation queue is only visible to moderators".to_string(),
        ))
    }
}
