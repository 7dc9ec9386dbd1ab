/// Comment endpoints
use crate::{
    auth::AuthActor,
    comments::Comment,
    context::AppContext,
    error::ReelResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

/// Build comment routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/videos/:id/comments",
            get(list_comments).post(add_comment),
        )
        .route("/api/comments/:id", delete(delete_comment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// GET /api/videos/:id/comments
async fn list_comments(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
) -> ReelResult<Json<Vec<Comment>>> {
    let comments = ctx.comments.list(&video_id).await?;
    Ok(Json(comments))
}

/// POST /api/videos/:id/comments
async fn add_comment(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(video_id): Path<String>,
    Json(request): Json<NewComment>,
) -> ReelResult<(StatusCode, Json<Comment>)> {
    let comment = ctx
        .comments
        .add(&actor, &video_id, &request.body, request.parent_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/comments/:id
async fn delete_comment(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(comment_id): Path<String>,
) -> ReelResult<StatusCode> {
    ctx.comments.delete(&actor, &comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
