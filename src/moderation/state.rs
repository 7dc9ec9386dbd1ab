/// Moderation state machine
///
/// ```text
/// submit ──► Pending ──approve──► Published
///    │          └────decline────► Declined (row purged)
///    └── (moderator author) ────► Published
/// ```
use crate::error::{ReelError, ReelResult};
use serde::{Deserialize, Serialize};

/// State tag of a submitted video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionState {
    /// Awaiting a moderator decision
    Pending,
    /// Visible to the audience (subject to visibility)
    Published,
    /// Rejected; never persisted, the row is purged
    Declined,
}

/// A moderator's verdict on a pending submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    pub fn from_approve(approve: bool) -> Self {
        if approve {
            Decision::Approve
        } else {
            Decision::Decline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Decline => "decline",
        }
    }
}

impl SubmissionState {
    /// State a fresh submission enters
    pub fn initial(author_is_moderator: bool) -> Self {
        if author_is_moderator {
            SubmissionState::Published
        } else {
            SubmissionState::Pending
        }
    }

    /// The only transition out of `Pending`. Anything already decided has
    /// been consumed, which callers observe as `NotFound`.
    pub fn transition(self, decision: Decision) -> ReelResult<SubmissionState> {
        match (self, decision) {
            (SubmissionState::Pending, Decision::Approve) => Ok(SubmissionState::Published),
            (SubmissionState::Pending, Decision::Decline) => Ok(SubmissionState::Declined),
            (state, _) => Err(ReelError::NotFound(format!(
                "Submission is no longer pending (state: {})",
                state.as_str()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Pending => "pending",
            SubmissionState::Published => "published",
            SubmissionState::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> ReelResult<Self> {
        match s {
            "pending" => Ok(SubmissionState::Pending),
            "published" => Ok(SubmissionState::Published),
            "declined" => Ok(SubmissionState::Declined),
            _ => Err(ReelError::Internal(format!("Unknown submission state: {}", s))),
        }
    }
}
