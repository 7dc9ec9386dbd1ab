/// Client-side engagement session
///
/// Mirrors what a browser tab shows for one open video: like and follow
/// flips are applied optimistically, pushed change events are folded in,
/// and the view is recorded once the video has stayed open long enough.
use crate::{
    engagement::{EngagementLedger, ToggleOutcome, ViewOutcome, ViewerKey},
    error::{ReelError, ReelResult},
    identity::Actor,
    realtime::{ChangeEvent, OptimisticCell},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

const VIEW_ATTEMPTS: u32 = 2;
const VIEW_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Server calls the session needs
#[async_trait]
pub trait EngagementBackend: Send + Sync {
    async fn toggle_like(&self, video_id: &str) -> ReelResult<ToggleOutcome>;
    async fn toggle_follow(&self, account_id: &str) -> ReelResult<ToggleOutcome>;
    async fn record_view(&self, video_id: &str) -> ReelResult<ViewOutcome>;
}

/// Engagement state shown for the open video
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementView {
    pub liked: bool,
    pub likes: i64,
    pub following: bool,
    pub followers: i64,
    pub views: i64,
}

pub struct EngagementSession<B> {
    backend: Arc<B>,
    video_id: String,
    owner_id: String,
    state: OptimisticCell<EngagementView>,
    deadline: Duration,
}

impl<B: EngagementBackend + 'static> EngagementSession<B> {
    pub fn new(
        backend: Arc<B>,
        video_id: impl Into<String>,
        owner_id: impl Into<String>,
        initial: EngagementView,
        deadline: Duration,
    ) -> Self {
        Self {
            backend,
            video_id: video_id.into(),
            owner_id: owner_id.into(),
            state: OptimisticCell::new(initial),
            deadline,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub async fn view(&self) -> EngagementView {
        self.state.get().await
    }

    pub async fn toggle_like(&self) -> ReelResult<ToggleOutcome> {
        let backend = Arc::clone(&self.backend);
        let video_id = self.video_id.clone();

        self.state
            .update(
                |view| {
                    view.liked = !view.liked;
                    view.likes = (view.likes + if view.liked { 1 } else { -1 }).max(0);
                },
                async move { backend.toggle_like(&video_id).await },
                |view: &mut EngagementView, outcome: &ToggleOutcome| {
                    view.liked = outcome.active;
                    view.likes = outcome.count;
                },
                |view| {
                    view.likes = (view.likes - if view.liked { 1 } else { -1 }).max(0);
                    view.liked = !view.liked;
                },
                self.deadline,
            )
            .await
    }

    pub async fn toggle_follow(&self) -> ReelResult<ToggleOutcome> {
        let backend = Arc::clone(&self.backend);
        let owner_id = self.owner_id.clone();

        self.state
            .update(
                |view| {
                    view.following = !view.following;
                    view.followers =
                        (view.followers + if view.following { 1 } else { -1 }).max(0);
                },
                async move { backend.toggle_follow(&owner_id).await },
                |view: &mut EngagementView, outcome: &ToggleOutcome| {
                    view.following = outcome.active;
                    view.followers = outcome.count;
                },
                |view| {
                    view.followers =
                        (view.followers - if view.following { 1 } else { -1 }).max(0);
                    view.following = !view.following;
                },
                self.deadline,
            )
            .await
    }

    /// Fold a pushed event into the view. Events carry absolute counts, so
    /// applying one twice changes nothing. Returns whether it applied.
    pub async fn apply_event(&self, event: &ChangeEvent) -> bool {
        match event {
            ChangeEvent::LikeChanged { video_id, likes } if *video_id == self.video_id => {
                let likes = *likes;
                self.state.modify(|view| view.likes = likes).await;
                true
            }
            ChangeEvent::ViewCountChanged { video_id, views } if *video_id == self.video_id => {
                let views = *views;
                self.state.modify(|view| view.views = views).await;
                true
            }
            _ => false,
        }
    }

    /// Record the view after `debounce` unless the tracker is dropped first.
    /// Recording is idempotent per viewer, so a retryable failure is tried
    /// once more.
    pub fn track_view(&self, debounce: Duration) -> ViewTracker {
        let backend = Arc::clone(&self.backend);
        let video_id = self.video_id.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let mut attempt = 1;
            loop {
                match backend.record_view(&video_id).await {
                    Ok(outcome) => {
                        state.modify(|view| view.views = outcome.views).await;
                        break;
                    }
                    Err(e) if e.is_retryable() && attempt < VIEW_ATTEMPTS => {
                        tracing::debug!("Retrying view of {}: {}", video_id, e);
                        attempt += 1;
                        tokio::time::sleep(VIEW_RETRY_DELAY).await;
                    }
                    // Views are best effort on the client
                    Err(e) => {
                        tracing::debug!("Failed to record view of {}: {}", video_id, e);
                        break;
                    }
                }
            }
        });

        ViewTracker { handle }
    }
}

/// Pending debounced view; dropping it cancels the view
pub struct ViewTracker {
    handle: JoinHandle<()>,
}

impl ViewTracker {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ViewTracker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// In-process backend that calls the ledger directly as one viewer
#[derive(Clone)]
pub struct LocalEngagement {
    ledger: EngagementLedger,
    actor: Option<Actor>,
    viewer: ViewerKey,
}

impl LocalEngagement {
    pub fn new(ledger: EngagementLedger, actor: Option<Actor>, viewer: ViewerKey) -> Self {
        Self {
            ledger,
            actor,
            viewer,
        }
    }

    fn actor(&self) -> ReelResult<&Actor> {
        self.actor
            .as_ref()
            .ok_or_else(|| ReelError::Authentication("Sign in to engage".to_string()))
    }
}

#[async_trait]
impl EngagementBackend for LocalEngagement {
    async fn toggle_like(&self, video_id: &str) -> ReelResult<ToggleOutcome> {
        self.ledger.toggle_like(video_id, self.actor()?).await
    }

    async fn toggle_follow(&self, account_id: &str) -> ReelResult<ToggleOutcome> {
        self.ledger.toggle_follow(self.actor()?, account_id).await
    }

    async fn record_view(&self, video_id: &str) -> ReelResult<ViewOutcome> {
        self.ledger.record_view(video_id, &self.viewer).await
    }
}
