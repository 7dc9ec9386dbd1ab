/// Engagement ledger operations
use crate::{
    db::{account::AccountDirectory, parse_timestamp, timestamp},
    engagement::ViewerKey,
    error::{ReelError, ReelResult},
    identity::Actor,
    metrics,
    notifications::{NotificationFanout, NotificationKind, NotificationRequest},
    realtime::{ChangeEvent, ChangeHub},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Result of a view attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOutcome {
    /// False when the viewer had already been counted
    pub recorded: bool,
    pub views: i64,
}

/// Result of a like or follow toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    /// Whether the edge exists after the toggle
    pub active: bool,
    /// Derived count of edges on the target
    pub count: i64,
    /// A concurrent toggle created the edge first; nothing was written
    pub conflict_ignored: bool,
}

/// A creator the actor follows, for the subscriptions page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowedCreator {
    pub account_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub followers: i64,
    pub videos: i64,
    pub followed_at: DateTime<Utc>,
}

enum EdgeToggle {
    Removed,
    Created,
    LostRace,
}

/// Views, likes and follows
#[derive(Clone)]
pub struct EngagementLedger {
    db: SqlitePool,
    accounts: AccountDirectory,
    fanout: NotificationFanout,
    hub: ChangeHub,
}

impl EngagementLedger {
    pub fn new(
        db: SqlitePool,
        accounts: AccountDirectory,
        fanout: NotificationFanout,
        hub: ChangeHub,
    ) -> Self {
        Self {
            db,
            accounts,
            fanout,
            hub,
        }
    }

    /// Count a view at most once per (video, viewer)
    pub async fn record_view(&self, video_id: &str, viewer: &ViewerKey) -> ReelResult<ViewOutcome> {
        self.published_video(video_id).await?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO view_event (video_id, viewer_key, account_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(video_id)
        .bind(viewer.as_key())
        .bind(viewer.account_id())
        .bind(timestamp(Utc::now()))
        .execute(&self.db)
        .await?;

        if inserted.rows_affected() == 0 {
            tracing::debug!("View of {} by {} already counted", video_id, viewer.as_key());
            metrics::record_view(false);
            let views: i64 = sqlx::query_scalar("SELECT views FROM video WHERE id = ?1")
                .bind(video_id)
                .fetch_one(&self.db)
                .await?;
            return Ok(ViewOutcome {
                recorded: false,
                views,
            });
        }

        let views: i64 = sqlx::query_scalar(
            r#"
            UPDATE video SET views = (SELECT COUNT(*) FROM view_event WHERE video_id = ?1)
            WHERE id = ?1
            RETURNING views
            "#,
        )
        .bind(video_id)
        .fetch_one(&self.db)
        .await?;

        metrics::record_view(true);
        self.hub.publish(ChangeEvent::ViewCountChanged {
            video_id: video_id.to_string(),
            views,
        });

        Ok(ViewOutcome {
            recorded: true,
            views,
        })
    }

    /// Like or unlike a published video
    pub async fn toggle_like(&self, video_id: &str, liker: &Actor) -> ReelResult<ToggleOutcome> {
        let (owner_id, title) = self.published_video(video_id).await?;

        let toggle = self
            .toggle_edge(
                "DELETE FROM like_edge WHERE video_id = ?1 AND account_id = ?2",
                "INSERT OR IGNORE INTO like_edge (video_id, account_id, created_at) VALUES (?1, ?2, ?3)",
                video_id,
                &liker.account_id,
            )
            .await?;

        if let EdgeToggle::Created = toggle {
            self.fanout.notify(
                NotificationRequest::new(
                    &liker.account_id,
                    owner_id,
                    NotificationKind::Like,
                    "New Like",
                )
                .body(format!("{} liked your video \"{}\"", liker.display_name, title))
                .video(video_id),
            );
        }

        let likes = self.like_count(video_id).await?;
        self.hub.publish(ChangeEvent::LikeChanged {
            video_id: video_id.to_string(),
            likes,
        });

        Ok(finish_toggle("like", toggle, likes))
    }

    /// Follow or unfollow a creator
    pub async fn toggle_follow(&self, follower: &Actor, followed_id: &str) -> ReelResult<ToggleOutcome> {
        if follower.account_id == followed_id {
            return Err(ReelError::Validation("You cannot follow yourself".to_string()));
        }
        if !self.accounts.exists(followed_id).await? {
            return Err(ReelError::NotFound(format!("Account {} not found", followed_id)));
        }

        let toggle = self
            .toggle_edge(
                "DELETE FROM follow_edge WHERE follower_id = ?2 AND followed_id = ?1",
                "INSERT OR IGNORE INTO follow_edge (followed_id, follower_id, created_at) VALUES (?1, ?2, ?3)",
                followed_id,
                &follower.account_id,
            )
            .await?;

        if let EdgeToggle::Created = toggle {
            self.fanout.notify(NotificationRequest::new(
                &follower.account_id,
                followed_id,
                NotificationKind::Follow,
                "New Follower",
            )
            .body(format!("{} started following you", follower.display_name)));
        }

        let followers = self.follower_count(followed_id).await?;
        Ok(finish_toggle("follow", toggle, followers))
    }

    pub async fn like_count(&self, video_id: &str) -> ReelResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM like_edge WHERE video_id = ?1")
            .bind(video_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn has_liked(&self, video_id: &str, account_id: &str) -> ReelResult<bool> {
        let liked: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM like_edge WHERE video_id = ?1 AND account_id = ?2)",
        )
        .bind(video_id)
        .bind(account_id)
        .fetch_one(&self.db)
        .await?;
        Ok(liked)
    }

    pub async fn follower_count(&self, account_id: &str) -> ReelResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follow_edge WHERE followed_id = ?1")
            .bind(account_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn is_following(&self, follower_id: &str, followed_id: &str) -> ReelResult<bool> {
        let following: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follow_edge WHERE follower_id = ?1 AND followed_id = ?2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.db)
        .await?;
        Ok(following)
    }

    /// Creators the actor follows, most recently followed first
    pub async fn following(&self, follower: &Actor) -> ReelResult<Vec<FollowedCreator>> {
        let rows = sqlx::query(
            r#"
            SELECT f.followed_id, f.created_at, a.display_name, a.avatar_ref,
                   (SELECT COUNT(*) FROM follow_edge c WHERE c.followed_id = f.followed_id) AS followers,
                   (SELECT COUNT(*) FROM video v
                     WHERE v.owner_id = f.followed_id AND v.status = 'published') AS videos
            FROM follow_edge f
            LEFT JOIN account a ON a.id = f.followed_id
            WHERE f.follower_id = ?1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(&follower.account_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> ReelResult<FollowedCreator> {
                let display_name: Option<String> = row.try_get("display_name")?;
                let followed_at: String = row.try_get("created_at")?;
                Ok(FollowedCreator {
                    account_id: row.try_get("followed_id")?,
                    display_name: display_name.unwrap_or_else(|| "Someone".to_string()),
                    avatar_ref: row.try_get("avatar_ref")?,
                    followers: row.try_get("followers")?,
                    videos: row.try_get("videos")?,
                    followed_at: parse_timestamp(&followed_at)?,
                })
            })
            .collect()
    }

    /// Rewrite any stored view counter that drifted from its rows
    pub async fn reconcile_view_counters(&self) -> ReelResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE video
            SET views = (SELECT COUNT(*) FROM view_event e WHERE e.video_id = video.id)
            WHERE views <> (SELECT COUNT(*) FROM view_event e WHERE e.video_id = video.id)
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Owner and title of a published video
    async fn published_video(&self, video_id: &str) -> ReelResult<(String, String)> {
        let row = sqlx::query("SELECT owner_id, title FROM video WHERE id = ?1 AND status = 'published'")
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ReelError::NotFound(format!("Video {} not found", video_id)))?;

        Ok((row.try_get("owner_id")?, row.try_get("title")?))
    }

    /// Delete the edge if present, otherwise create it. The primary key
    /// absorbs a concurrent create.
    async fn toggle_edge(
        &self,
        delete_sql: &str,
        insert_sql: &str,
        target: &str,
        actor_id: &str,
    ) -> ReelResult<EdgeToggle> {
        let deleted = sqlx::query(delete_sql)
            .bind(target)
            .bind(actor_id)
            .execute(&self.db)
            .await?;
        if deleted.rows_affected() > 0 {
            return Ok(EdgeToggle::Removed);
        }

        let inserted = sqlx::query(insert_sql)
            .bind(target)
            .bind(actor_id)
            .bind(timestamp(Utc::now()))
            .execute(&self.db)
            .await?;

        if inserted.rows_affected() == 0 {
            tracing::debug!("Edge {} -> {} created concurrently, ignoring", actor_id, target);
            Ok(EdgeToggle::LostRace)
        } else {
            Ok(EdgeToggle::Created)
        }
    }
}

fn finish_toggle(edge: &str, toggle: EdgeToggle, count: i64) -> ToggleOutcome {
    let outcome = match toggle {
        EdgeToggle::Removed => ToggleOutcome {
            active: false,
            count,
            conflict_ignored: false,
        },
        EdgeToggle::Created => ToggleOutcome {
            active: true,
            count,
            conflict_ignored: false,
        },
        EdgeToggle::LostRace => ToggleOutcome {
            active: true,
            count,
            conflict_ignored: true,
        },
    };
    metrics::record_toggle(edge, outcome.active);
    outcome
}
