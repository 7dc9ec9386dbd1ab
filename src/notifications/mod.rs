/// Notification Fan-out
///
/// Domain events become per-recipient notification rows. Writes go through
/// a detached queue ([`NotificationFanout`]) so that a failed insert never
/// affects the operation that triggered it; reads and read-flag updates go
/// straight to the [`NotificationStore`].

pub mod fanout;
pub mod store;

pub use fanout::NotificationFanout;
pub use store::NotificationStore;

use crate::error::{ReelError, ReelResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    UploadReview,
    Approval,
    Decline,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Follow => "follow",
            NotificationKind::UploadReview => "upload_review",
            NotificationKind::Approval => "approval",
            NotificationKind::Decline => "decline",
        }
    }

    pub fn from_str(s: &str) -> ReelResult<Self> {
        match s {
            "like" => Ok(NotificationKind::Like),
            "comment" => Ok(NotificationKind::Comment),
            "follow" => Ok(NotificationKind::Follow),
            "upload_review" => Ok(NotificationKind::UploadReview),
            "approval" => Ok(NotificationKind::Approval),
            "decline" => Ok(NotificationKind::Decline),
            _ => Err(ReelError::Internal(format!("Unknown notification kind: {}", s))),
        }
    }
}

/// A delivered notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: Option<String>,
    pub video_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A request to notify one recipient about something an actor did
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub actor_id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: Option<String>,
    pub video_id: Option<String>,
}

impl NotificationRequest {
    pub fn new(
        actor_id: impl Into<String>,
        recipient_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            recipient_id: recipient_id.into(),
            kind,
            title: title.into(),
            body: None,
            video_id: None,
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn video(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    /// Nobody is ever notified about their own action
    pub fn is_self_notification(&self) -> bool {
        self.actor_id == self.recipient_id
    }
}
