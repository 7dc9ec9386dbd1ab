/// API routes and handlers
pub mod comments;
pub mod engagement;
pub mod health;
pub mod media;
pub mod moderation;
pub mod notifications;
pub mod subscribe;
pub mod videos;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(media::routes())
        .merge(videos::routes())
        .merge(comments::routes())
        .merge(engagement::routes())
        .merge(moderation::routes())
        .merge(notifications::routes())
        .merge(subscribe::routes())
}
