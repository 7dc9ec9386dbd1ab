/// Background task implementations
use crate::{context::AppContext, error::ReelResult};

/// Publish scheduled videos whose release time has passed
pub async fn release_scheduled_videos(ctx: &AppContext) -> ReelResult<u64> {
    ctx.videos.release_scheduled().await
}

/// Recompute stored view counters from the view events
pub async fn reconcile_view_counters(ctx: &AppContext) -> ReelResult<u64> {
    ctx.engagement.reconcile_view_counters().await
}

/// Health check - verify all systems are operational
pub async fn health_check(ctx: &AppContext) -> ReelResult<()> {
    // Check database connectivity
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;

    // Media directory must still be reachable
    if !tokio::fs::try_exists(&ctx.config.storage.media_directory)
        .await
        .unwrap_or(false)
    {
        return Err(crate::error::ReelError::Dependency(format!(
            "Media directory {:?} is missing",
            ctx.config.storage.media_directory
        )));
    }

    Ok(())
}
