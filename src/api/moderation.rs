/// Moderation queue endpoints (moderators only)
use crate::{
    auth::AuthActor,
    context::AppContext,
    error::ReelResult,
    moderation::{Decision, DecisionOutcome, PendingSubmission},
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build moderation routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/moderation/queue", get(list_pending))
        .route("/api/moderation/queue/count", get(pending_count))
        .route("/api/moderation/queue/:id/decision", post(decide))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct PendingCount {
    pub pending: i64,
}

/// GET /api/moderation/queue
async fn list_pending(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
) -> ReelResult<Json<Vec<PendingSubmission>>> {
    let pending = ctx.moderation.list_pending(&actor).await?;
    Ok(Json(pending))
}

/// GET /api/moderation/queue/count
async fn pending_count(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
) -> ReelResult<Json<PendingCount>> {
    let pending = ctx.moderation.pending_count(&actor).await?;
    Ok(Json(PendingCount { pending }))
}

/// POST /api/moderation/queue/:id/decision
async fn decide(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(video_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> ReelResult<Json<DecisionOutcome>> {
    let outcome = ctx
        .moderation
        .decide(&actor, &video_id, Decision::from_approve(request.approve))
        .await?;
    Ok(Json(outcome))
}
