/// Media upload endpoint
use crate::{
    auth::AuthActor,
    blob_store::StoredBlob,
    context::AppContext,
    error::{ReelError, ReelResult},
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};

/// Build media routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/media", post(upload_media))
}

/// POST /api/media
///
/// Accepts raw bytes with their Content-Type and returns the public URL to
/// use as `mediaRef` or `thumbnailRef` when submitting a video.
async fn upload_media(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    headers: HeaderMap,
    body: Bytes,
) -> ReelResult<(StatusCode, Json<StoredBlob>)> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ReelError::Validation("Content-Type header is required".to_string()))?;

    let stored = ctx.blob_store.put(body.to_vec(), content_type).await?;
    tracing::info!("{} uploaded {} ({} bytes)", actor.account_id, stored.key, stored.size);

    Ok((StatusCode::CREATED, Json(stored)))
}
