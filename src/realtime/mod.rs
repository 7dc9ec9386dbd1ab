/// Realtime Sync Layer
///
/// Server side, every authoritative change is published to the
/// [`ChangeHub`] as a typed [`ChangeEvent`]. Each connected client holds a
/// [`ChangeStream`] filtered to its own topics:
///
/// - its own notification stream
/// - the moderation queue, only when the actor is a moderator
/// - the engagement stream of the video currently open (switchable)
///
/// Client side, [`OptimisticCell`] and [`EngagementSession`] apply local
/// changes before the server confirms them and roll back on failure.

pub mod hub;
pub mod optimistic;
pub mod session;

pub use hub::{ChangeHub, ChangeStream, Delivery};
pub use optimistic::OptimisticCell;
pub use session::{EngagementBackend, EngagementSession, EngagementView, LocalEngagement, ViewTracker};

use crate::{comments::Comment, moderation::SubmissionState, notifications::Notification};
use serde::{Deserialize, Serialize};

/// A change stream a client can subscribe to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "topic", content = "id", rename_all = "snake_case")]
pub enum Topic {
    /// Notifications addressed to one account
    Notifications(String),
    /// Pending submissions, moderators only
    ModerationQueue,
    /// Engagement on one video
    Video(String),
}

/// A server-confirmed change pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ChangeEvent {
    NotificationCreated {
        notification: Notification,
    },
    /// `notification_id` is absent for a mark-all
    NotificationsRead {
        recipient_id: String,
        notification_id: Option<String>,
    },
    /// `notification_id` is absent for a clear-all
    NotificationsCleared {
        recipient_id: String,
        notification_id: Option<String>,
    },
    QueueChanged {
        video_id: String,
        state: SubmissionState,
        pending: i64,
    },
    VideoPublished {
        video_id: String,
        owner_id: String,
        title: String,
    },
    LikeChanged {
        video_id: String,
        likes: i64,
    },
    ViewCountChanged {
        video_id: String,
        views: i64,
    },
    CommentAdded {
        video_id: String,
        comment: Comment,
    },
    CommentDeleted {
        video_id: String,
        comment_id: String,
    },
    VideoDeleted {
        video_id: String,
    },
}

impl ChangeEvent {
    /// The stream this event is delivered on
    pub fn topic(&self) -> Topic {
        match self {
            ChangeEvent::NotificationCreated { notification } => {
                Topic::Notifications(notification.recipient_id.clone())
            }
            ChangeEvent::NotificationsRead { recipient_id, .. }
            | ChangeEvent::NotificationsCleared { recipient_id, .. } => {
                Topic::Notifications(recipient_id.clone())
            }
            ChangeEvent::QueueChanged { .. } => Topic::ModerationQueue,
            ChangeEvent::VideoPublished { video_id, .. }
            | ChangeEvent::LikeChanged { video_id, .. }
            | ChangeEvent::ViewCountChanged { video_id, .. }
            | ChangeEvent::CommentAdded { video_id, .. }
            | ChangeEvent::CommentDeleted { video_id, .. }
            | ChangeEvent::VideoDeleted { video_id } => Topic::Video(video_id.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::NotificationCreated { .. } => "notification_created",
            ChangeEvent::NotificationsRead { .. } => "notifications_read",
            ChangeEvent::NotificationsCleared { .. } => "notifications_cleared",
            ChangeEvent::QueueChanged { .. } => "queue_changed",
            ChangeEvent::VideoPublished { .. } => "video_published",
            ChangeEvent::LikeChanged { .. } => "like_changed",
            ChangeEvent::ViewCountChanged { .. } => "view_count_changed",
            ChangeEvent::CommentAdded { .. } => "comment_added",
            ChangeEvent::CommentDeleted { .. } => "comment_deleted",
            ChangeEvent::VideoDeleted { .. } => "video_deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_frame_shape() {
        let event = ChangeEvent::LikeChanged {
            video_id: "v1".to_string(),
            likes: 4,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "like_changed");
        assert_eq!(json["videoId"], "v1");
        assert_eq!(json["likes"], 4);
        assert_eq!(event.topic(), Topic::Video("v1".to_string()));
    }

    #[test]
    fn test_notification_events_route_to_recipient() {
        let event = ChangeEvent::NotificationsRead {
            recipient_id: "acct-b".to_string(),
            notification_id: None,
        };
        assert_eq!(event.topic(), Topic::Notifications("acct-b".to_string()));
    }
}
