/// Follow endpoints
use crate::{
    auth::AuthActor,
    context::AppContext,
    engagement::{FollowedCreator, ToggleOutcome},
    error::ReelResult,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

/// Build follow routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/accounts/me/following", get(following))
        .route("/api/accounts/:id/follow", post(toggle_follow))
        .route("/api/accounts/:id/followers/count", get(follower_count))
}

#[derive(Debug, Serialize)]
pub struct FollowerCount {
    pub followers: i64,
}

/// POST /api/accounts/:id/follow
async fn toggle_follow(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(account_id): Path<String>,
) -> ReelResult<Json<ToggleOutcome>> {
    let outcome = ctx.engagement.toggle_follow(&actor, &account_id).await?;
    Ok(Json(outcome))
}

/// GET /api/accounts/:id/followers/count
async fn follower_count(
    State(ctx): State<AppContext>,
    Path(account_id): Path<String>,
) -> ReelResult<Json<FollowerCount>> {
    let followers = ctx.engagement.follower_count(&account_id).await?;
    Ok(Json(FollowerCount { followers }))
}

/// GET /api/accounts/me/following
async fn following(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
) -> ReelResult<Json<Vec<FollowedCreator>>> {
    let creators = ctx.engagement.following(&actor).await?;
    Ok(Json(creators))
}
