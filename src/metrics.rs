/// Metrics and telemetry for ClassReel
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Engagement events (views, likes, follows)
/// - Moderation decisions
/// - Notification delivery
/// - Realtime connections and background jobs

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder,
    Gauge, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Engagement Metrics ==========

    /// View attempts by outcome (recorded / deduplicated)
    pub static ref VIEWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "views_total",
        "Total number of view attempts",
        &["outcome"]
    )
    .unwrap();

    /// Like and follow toggles by edge kind and resulting state
    pub static ref TOGGLES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "engagement_toggles_total",
        "Total number of like/follow toggles",
        &["edge", "state"]
    )
    .unwrap();

    // ========== Moderation Metrics ==========

    /// Moderation submissions and decisions
    pub static ref MODERATION_ACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "moderation_actions_total",
        "Total number of moderation actions",
        &["action"]
    )
    .unwrap();

    /// Pending submissions awaiting review
    pub static ref MODERATION_PENDING: IntGauge = register_int_gauge!(
        "moderation_pending",
        "Number of submissions awaiting review"
    )
    .unwrap();

    // ========== Notification Metrics ==========

    /// Notifications by kind and delivery status (delivered / dropped / failed)
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notifications_total",
        "Total number of notifications handled by the fan-out",
        &["kind", "status"]
    )
    .unwrap();

    // ========== Realtime Metrics ==========

    /// Connected realtime clients
    pub static ref REALTIME_CONNECTIONS: IntGauge = register_int_gauge!(
        "realtime_connections",
        "Number of connected realtime clients"
    )
    .unwrap();

    /// Frames pushed to realtime clients by event type
    pub static ref REALTIME_FRAMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "realtime_frames_total",
        "Total number of change frames pushed to clients",
        &["event_type"]
    )
    .unwrap();

    // ========== Blob Storage Metrics ==========

    /// Media uploads by content type
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_uploads_total",
        "Total number of media uploads",
        &["content_type"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a view attempt
pub fn record_view(recorded: bool) {
    VIEWS_TOTAL
        .with_label_values(&[if recorded { "recorded" } else { "deduplicated" }])
        .inc();
}

/// Record a like or follow toggle
pub fn record_toggle(edge: &str, active: bool) {
    TOGGLES_TOTAL
        .with_label_values(&[edge, if active { "on" } else { "off" }])
        .inc();
}

/// Record a moderation action
pub fn record_moderation_action(action: &str) {
    MODERATION_ACTIONS_TOTAL.with_label_values(&[action]).inc();
}

/// Record a notification outcome
pub fn record_notification(kind: &str, status: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[kind, status]).inc();
}

/// Record a frame pushed to a realtime client
pub fn record_realtime_frame(event_type: &str) {
    REALTIME_FRAMES_TOTAL.with_label_values(&[event_type]).inc();
}

/// Record a media upload
pub fn record_media_upload(content_type: &str) {
    MEDIA_UPLOADS_TOTAL.with_label_values(&[content_type]).inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/api/videos", 200, 0.05);
        let metrics = render_metrics();
        assert!(metrics.contains("http_requests_total"));
        assert!(metrics.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_record_engagement() {
        record_view(true);
        record_view(false);
        record_toggle("like", true);
        let metrics = render_metrics();
        assert!(metrics.contains("views_total"));
        assert!(metrics.contains("deduplicated"));
        assert!(metrics.contains("engagement_toggles_total"));
    }

    #[test]
    fn test_record_notification() {
        record_notification("like", "delivered");
        record_notification("follow", "dropped");
        let metrics = render_metrics();
        assert!(metrics.contains("notifications_total"));
    }

    #[test]
    fn test_record_background_job() {
        record_background_job("scheduled_release", "success", 0.2);
        let metrics = render_metrics();
        assert!(metrics.contains("background_jobs_total"));
        assert!(metrics.contains("background_job_duration_seconds"));
    }
}
