/// Notification endpoints; every route acts on the caller's own inbox
use crate::{
    auth::AuthActor,
    context::AppContext,
    db::PageCursor,
    error::ReelResult,
    notifications::Notification,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build notification routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/notifications",
            get(list_notifications).delete(clear_notifications),
        )
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/:id/read", post(mark_read))
        .route("/api/notifications/:id", delete(delete_notification))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsParams {
    pub limit: Option<i64>,
    /// `createdAt` and id of the last notification on the previous page
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct Affected {
    pub updated: u64,
}

/// GET /api/notifications
async fn list_notifications(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Query(params): Query<ListNotificationsParams>,
) -> ReelResult<Json<Vec<Notification>>> {
    let before = PageCursor::from_params(params.before, params.before_id);
    let notifications = ctx
        .notifications
        .list(&actor.account_id, params.limit, before.as_ref())
        .await?;
    Ok(Json(notifications))
}

/// GET /api/notifications/unread-count
async fn unread_count(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
) -> ReelResult<Json<UnreadCount>> {
    let unread = ctx.notifications.unread_count(&actor.account_id).await?;
    Ok(Json(UnreadCount { unread }))
}

/// POST /api/notifications/:id/read
async fn mark_read(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(notification_id): Path<String>,
) -> ReelResult<StatusCode> {
    ctx.notifications
        .mark_read(&actor.account_id, &notification_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/notifications/read-all
async fn mark_all_read(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
) -> ReelResult<Json<Affected>> {
    let updated = ctx.notifications.mark_all_read(&actor.account_id).await?;
    Ok(Json(Affected { updated }))
}

/// DELETE /api/notifications
async fn clear_notifications(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
) -> ReelResult<Json<Affected>> {
    let updated = ctx.notifications.clear_all(&actor.account_id).await?;
    Ok(Json(Affected { updated }))
}

/// DELETE /api/notifications/:id
async fn delete_notification(
    State(ctx): State<AppContext>,
    AuthActor(actor): AuthActor,
    Path(notification_id): Path<String>,
) -> ReelResult<StatusCode> {
    ctx.notifications
        .delete(&actor.account_id, &notification_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
