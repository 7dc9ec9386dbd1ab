/// Moderation Queue
///
/// Videos submitted by non-moderators wait in `pending` until a moderator
/// approves (publishes) or declines (purges) them. Moderator-authored
/// submissions skip the queue.

pub mod queue;
pub mod state;

pub use queue::{DecisionOutcome, ModerationQueue, PendingSubmission, SubmissionReceipt};
pub use state::{Decision, SubmissionState};
