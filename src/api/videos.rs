/// Video endpoints: submission, listing, owner edits and engagement
use crate::{
    auth::{AuthActor, MaybeActor, ViewerIdentity, VIEWER_TOKEN_HEADER},
    context::AppContext,
    db::PageCursor,
    engagement::{ToggleOutcome, ViewOutcome},
    error::{ReelError, ReelResult},
    moderation::SubmissionReceipt,
    videos::{Video, VideoDraft, VideoPatch},
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build video routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/videos", post(submit_video).get(list_videos))
        .route(
            "/api/videos/:id",
            get(get_video).patch(edit_video).delete(delete_video),
        )
        .route("/api/videos/:id/view", post(record_view))
        .route("/api/videos/:id/like", post(toggle_like))
        .route("/api/accounts/:id/videos", get(list_owner_videos))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVideosParams {
    pub limit: Option<i64>,
    /// `publishedAt` of the last video on the previous page
    pub before: Option<DateTime<Utc>>,
    /// Id of that video
    pub before_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    pub videos: Vec<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<PageCursor>,
}

/// A video with the engagement the caller needs to render it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    #[serde(flatten)]
    pub video: Video,
    pub likes: i64,
    pub liked: bool,
}

/// POST /api/videos
async fn submit_video(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Json(draft): Json<VideoDraft>,
) -> ReelResult<(StatusCode, Json<SubmissionReceipt>)> {
    let receipt = ctx.moderation.submit(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/videos
async fn list_videos(
    State(ctx): State<AppContext>,
    Query(params): Query<ListVideosParams>,
) -> ReelResult<Json<VideoPage>> {
    let before = PageCursor::from_params(params.before, params.before_id);
    let videos = ctx
        .videos
        .list_published(params.limit, before.as_ref())
        .await?;
    let cursor = videos.last().and_then(|video| {
        video
            .published_at
            .map(|at| PageCursor::new(at, video.id.clone()))
    });

    Ok(Json(VideoPage { videos, cursor }))
}

/// GET /api/accounts/:id/videos
async fn list_owner_videos(
    State(ctx): State<AppContext>,
    MaybeActor(actor): MaybeActor,
    Path(owner_id): Path<String>,
) -> ReelResult<Json<Vec<Video>>> {
    let videos = ctx.videos.list_by_owner(&owner_id, actor.as_ref()).await?;
    Ok(Json(videos))
}

/// GET /api/videos/:id
async fn get_video(
    State(ctx): State<AppContext>,
    MaybeActor(actor): MaybeActor,
    Path(video_id): Path<String>,
) -> ReelResult<Json<VideoDetail>> {
    let video = ctx.videos.get(&video_id, actor.as_ref()).await?;
    let likes = ctx.engagement.like_count(&video.id).await?;
    let liked = match &actor {
        Some(actor) => ctx.engagement.has_liked(&video.id, &actor.account_id).await?,
        None => false,
    };

    Ok(Json(VideoDetail { video, likes, liked }))
}

/// PATCH /api/videos/:id
async fn edit_video(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(video_id): Path<String>,
    Json(patch): Json<VideoPatch>,
) -> ReelResult<Json<Video>> {
    let video = ctx.videos.edit(&actor, &video_id, patch).await?;
    Ok(Json(video))
}

/// DELETE /api/videos/:id
async fn delete_video(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(video_id): Path<String>,
) -> ReelResult<StatusCode> {
    ctx.videos.delete(&actor, &video_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/videos/:id/view
///
/// Anonymous browsers without a token get a fresh one back in the
/// `X-Viewer-Token` header and must send it on later views.
async fn record_view(
    State(ctx): State<AppContext>,
    viewer: ViewerIdentity,
    Path(video_id): Path<String>,
) -> ReelResult<Response> {
    let outcome: ViewOutcome = ctx.engagement.record_view(&video_id, &viewer.key).await?;

    let mut headers = HeaderMap::new();
    if let Some(token) = viewer.minted {
        let value = HeaderValue::from_str(&token)
            .map_err(|e| ReelError::Internal(format!("Unusable viewer token: {}", e)))?;
        headers.insert(VIEWER_TOKEN_HEADER, value);
    }

    Ok((headers, Json(outcome)).into_response())
}

/// POST /api/videos/:id/like
async fn toggle_like(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(video_id): Path<String>,
) -> ReelResult<Json<ToggleOutcome>> {
    let outcome = ctx.engagement.toggle_like(&video_id, &actor).await?;
    Ok(Json(outcome))
}
