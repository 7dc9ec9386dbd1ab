/// Video records
///
/// A single `video` table holds both pending and published videos; the
/// `status` column is the moderation state tag. The catalog handles reads,
/// owner edits and deletion of published videos.

pub mod catalog;

pub use catalog::VideoCatalog;

use crate::{
    db::{parse_optional_timestamp, parse_timestamp},
    error::{ReelError, ReelResult},
    moderation::SubmissionState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Column list shared by every query that builds a [`Video`]
pub(crate) const VIDEO_COLUMNS: &str = "id, owner_id, title, description, media_ref, thumbnail_ref, \
     visibility, scheduled_at, status, views, submitted_at, published_at";

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 5000;

/// Audience visibility of a video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Scheduled,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Scheduled => "scheduled",
        }
    }

    pub fn from_str(s: &str) -> ReelResult<Self> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "scheduled" => Ok(Visibility::Scheduled),
            _ => Err(ReelError::Validation(format!("Invalid visibility: {}", s))),
        }
    }
}

/// A video row in either pending or published state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub media_ref: String,
    pub thumbnail_ref: Option<String>,
    pub visibility: Visibility,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub state: SubmissionState,
    pub views: i64,
    pub submitted_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Video {
    /// Whether the general audience may see this video at `now`
    pub fn is_visible_to_audience(&self, now: DateTime<Utc>) -> bool {
        if self.state != SubmissionState::Published {
            return false;
        }
        match self.visibility {
            Visibility::Public => true,
            Visibility::Private => false,
            Visibility::Scheduled => self.scheduled_at.map_or(false, |at| at <= now),
        }
    }
}

/// Upload payload for a new video
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub media_ref: String,
    #[serde(default)]
    pub thumbnail_ref: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl VideoDraft {
    pub fn new(title: impl Into<String>, media_ref: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            media_ref: media_ref.into(),
            ..Default::default()
        }
    }

    /// Check input constraints and normalise whitespace
    pub fn validate(mut self, now: DateTime<Utc>) -> ReelResult<Self> {
        self.title = validate_title(&self.title)?;
        self.description = normalise_description(self.description)?;

        if self.media_ref.trim().is_empty() {
            return Err(ReelError::Validation("A media reference is required".to_string()));
        }
        self.media_ref = self.media_ref.trim().to_string();
        validate_reference("media reference", &self.media_ref)?;

        if let Some(thumb) = &self.thumbnail_ref {
            validate_reference("thumbnail reference", thumb)?;
        }

        self.scheduled_at = validate_schedule(self.visibility, self.scheduled_at, now)?;
        Ok(self)
    }
}

/// Owner edit of a video; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_ref: Option<String>,
    pub visibility: Option<Visibility>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl VideoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.thumbnail_ref.is_none()
            && self.visibility.is_none()
            && self.scheduled_at.is_none()
    }

    /// Merge the patch into an existing video, validating the result
    pub fn apply_to(self, video: &mut Video, now: DateTime<Utc>) -> ReelResult<()> {
        if let Some(title) = self.title {
            video.title = validate_title(&title)?;
        }
        if self.description.is_some() {
            video.description = normalise_description(self.description)?;
        }
        if let Some(thumb) = self.thumbnail_ref {
            validate_reference("thumbnail reference", &thumb)?;
            video.thumbnail_ref = Some(thumb);
        }

        // An untouched schedule stays valid even once its time has passed
        if self.visibility.is_some() || self.scheduled_at.is_some() {
            let visibility = self.visibility.unwrap_or(video.visibility);
            let scheduled_at = match (self.visibility, self.scheduled_at) {
                (_, Some(at)) => Some(at),
                (Some(_), None) => None,
                (None, None) => video.scheduled_at,
            };
            video.scheduled_at = validate_schedule(visibility, scheduled_at, now)?;
            video.visibility = visibility;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> ReelResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ReelError::Validation("Title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ReelError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn normalise_description(description: Option<String>) -> ReelResult<Option<String>> {
    let description = description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    if let Some(d) = &description {
        if d.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ReelError::Validation(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }
    Ok(description)
}

/// Blob store references are stored verbatim but must be absolute URLs
fn validate_reference(what: &str, value: &str) -> ReelResult<()> {
    let valid = (value.starts_with("https://") || value.starts_with("http://"))
        && !value.chars().any(char::is_whitespace)
        && value.split("://").nth(1).map_or(false, |rest| !rest.is_empty());

    if valid {
        Ok(())
    } else {
        Err(ReelError::Validation(format!("Invalid {}: {}", what, value)))
    }
}

fn validate_schedule(
    visibility: Visibility,
    scheduled_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ReelResult<Option<DateTime<Utc>>> {
    match visibility {
        Visibility::Scheduled => match scheduled_at {
            Some(at) if at > now => Ok(Some(at)),
            Some(_) => Err(ReelError::Validation(
                "Scheduled time must be in the future".to_string(),
            )),
            None => Err(ReelError::Validation(
                "Scheduled visibility requires a scheduled time".to_string(),
            )),
        },
        // A schedule without scheduled visibility is meaningless; drop it
        _ => Ok(None),
    }
}

/// Convert database row to Video
pub(crate) fn row_to_video(row: &SqliteRow) -> ReelResult<Video> {
    let visibility: String = row.try_get("visibility")?;
    let status: String = row.try_get("status")?;
    let submitted_at: String = row.try_get("submitted_at")?;

    Ok(Video {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        media_ref: row.try_get("media_ref")?,
        thumbnail_ref: row.try_get("thumbnail_ref")?,
        visibility: Visibility::from_str(&visibility)?,
        scheduled_at: parse_optional_timestamp(row.try_get("scheduled_at")?)?,
        state: SubmissionState::from_str(&status)?,
        views: row.try_get("views")?,
        submitted_at: parse_timestamp(&submitted_at)?,
        published_at: parse_optional_timestamp(row.try_get("published_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> VideoDraft {
        VideoDraft::new("  Intro to Fractions ", "https://cdn.example/v/fractions.mp4")
    }

    #[test]
    fn test_draft_trims_and_accepts() {
        let draft = draft().validate(Utc::now()).unwrap();
        assert_eq!(draft.title, "Intro to Fractions");
        assert_eq!(draft.visibility, Visibility::Public);
        assert!(draft.scheduled_at.is_none());
    }

    #[test]
    fn test_draft_rejects_empty_title_and_media() {
        let mut blank = draft();
        blank.title = "   ".into();
        assert!(matches!(blank.validate(Utc::now()), Err(ReelError::Validation(_))));

        let mut no_media = draft();
        no_media.media_ref = "".into();
        assert!(matches!(no_media.validate(Utc::now()), Err(ReelError::Validation(_))));

        let mut relative = draft();
        relative.media_ref = "videos/fractions.mp4".into();
        assert!(relative.validate(Utc::now()).is_err());
    }

    #[test]
    fn test_scheduled_requires_future_time() {
        let now = Utc::now();

        let mut missing = draft();
        missing.visibility = Visibility::Scheduled;
        assert!(missing.validate(now).is_err());

        let mut past = draft();
        past.visibility = Visibility::Scheduled;
        past.scheduled_at = Some(now - Duration::hours(1));
        assert!(past.validate(now).is_err());

        let mut future = draft();
        future.visibility = Visibility::Scheduled;
        future.scheduled_at = Some(now + Duration::hours(1));
        assert!(future.validate(now).is_ok());
    }

    #[test]
    fn test_patch_keeps_unmentioned_fields() {
        let now = Utc::now();
        let mut video = Video {
            id: "v1".into(),
            owner_id: "acct-a".into(),
            title: "Old".into(),
            description: Some("desc".into()),
            media_ref: "https://cdn.example/v.mp4".into(),
            thumbnail_ref: None,
            visibility: Visibility::Public,
            scheduled_at: None,
            state: SubmissionState::Published,
            views: 3,
            submitted_at: now,
            published_at: Some(now),
        };

        VideoPatch {
            title: Some(" New title ".into()),
            ..Default::default()
        }
        .apply_to(&mut video, now)
        .unwrap();

        assert_eq!(video.title, "New title");
        assert_eq!(video.description.as_deref(), Some("desc"));
        assert_eq!(video.views, 3);

        let bad = VideoPatch {
            visibility: Some(Visibility::Scheduled),
            ..Default::default()
        };
        assert!(bad.apply_to(&mut video, now).is_err());
    }

    #[test]
    fn test_audience_visibility() {
        let now = Utc::now();
        let mut video = Video {
            id: "v1".into(),
            owner_id: "acct-a".into(),
            title: "T".into(),
            description: None,
            media_ref: "https://cdn.example/v.mp4".into(),
            thumbnail_ref: None,
            visibility: Visibility::Scheduled,
            scheduled_at: Some(now + Duration::minutes(5)),
            state: SubmissionState::Published,
            views: 0,
            submitted_at: now,
            published_at: Some(now),
        };

        assert!(!video.is_visible_to_audience(now));
        assert!(video.is_visible_to_audience(now + Duration::minutes(6)));

        video.state = SubmissionState::Pending;
        video.visibility = Visibility::Public;
        assert!(!video.is_visible_to_audience(now));
    }
}
