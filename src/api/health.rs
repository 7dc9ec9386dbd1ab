/// Health and metrics endpoints
use crate::{context::AppContext, db, metrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" or "unhealthy"
    pub status: String,
    pub version: String,
    pub database: ComponentHealth,
    /// Live realtime subscribers
    pub subscribers: usize,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
}

/// Probe the database
pub async fn check_database(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();
    match db::test_connection(&ctx.db).await {
        Ok(()) => ComponentHealth {
            status: "healthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: "unhealthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: Some(e.to_string()),
        },
    }
}

/// GET /health
async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    let database = check_database(&ctx).await;
    let healthy = database.status == "healthy";

    let status = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: ctx.config.service.version.clone(),
        database,
        subscribers: ctx.hub.subscriber_count(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// GET /metrics
async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}
