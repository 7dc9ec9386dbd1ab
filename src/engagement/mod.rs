/// Engagement Ledger
///
/// Views, likes and follows are stored as rows whose primary keys are the
/// deduplication units. Every displayed counter is derived from those rows.

pub mod ledger;
pub mod viewer;

pub use ledger::{EngagementLedger, FollowedCreator, ToggleOutcome, ViewOutcome};
pub use viewer::{mint_anonymous_token, ViewerKey};
