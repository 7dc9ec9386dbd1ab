use crate::{context::AppContext, metrics};
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
    started_at: Instant,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self {
            context,
            started_at: Instant::now(),
        }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::scheduled_release_job(Arc::clone(&self)));
        tokio::spawn(Self::view_reconciliation_job(Arc::clone(&self)));

        // Spawn monitoring tasks
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Release due scheduled videos (runs every minute)
    async fn scheduled_release_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;
            let start = Instant::now();

            match tasks::release_scheduled_videos(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Released {} scheduled videos", count);
                    }
                    record("scheduled_release", "success", start);
                }
                Err(e) => {
                    error!("Failed to release scheduled videos: {}", e);
                    record("scheduled_release", "failure", start);
                }
            }
        }
    }

    /// Recompute view counters from view events (runs hourly)
    async fn view_reconciliation_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            let start = Instant::now();
            debug!("Running view counter reconciliation");

            match tasks::reconcile_view_counters(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Corrected view counters on {} videos", count);
                    }
                    record("view_reconciliation", "success", start);
                }
                Err(e) => {
                    error!("Failed to reconcile view counters: {}", e);
                    record("view_reconciliation", "failure", start);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;
            let start = Instant::now();
            metrics::UPTIME_SECONDS.set(scheduler.started_at.elapsed().as_secs_f64());

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => record("health_check", "success", start),
                Err(e) => {
                    error!("Health check failed: {}", e);
                    record("health_check", "failure", start);
                }
            }
        }
    }
}

fn record(job: &str, status: &str, start: Instant) {
    metrics::record_background_job(job, status, start.elapsed().as_secs_f64());
}
