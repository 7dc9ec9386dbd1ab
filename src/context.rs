/// Application context and dependency injection
use crate::{
    blob_store::BlobStore,
    comments::CommentStore,
    config::ServerConfig,
    db::{self, account::AccountDirectory},
    engagement::EngagementLedger,
    error::{ReelError, ReelResult},
    moderation::ModerationQueue,
    notifications::{NotificationFanout, NotificationStore},
    rate_limit::RateLimiter,
    realtime::ChangeHub,
    videos::VideoCatalog,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: AccountDirectory,
    pub hub: ChangeHub,
    // Publication & engagement pipeline
    pub moderation: ModerationQueue,
    pub engagement: EngagementLedger,
    pub notifications: NotificationStore,
    pub fanout: NotificationFanout,
    pub videos: VideoCatalog,
    pub comments: CommentStore,
    // Media
    pub blob_store: Arc<BlobStore>,
    // Rate limiter
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ReelResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        Ok(Self::with_pool(config, db))
    }

    /// Wire every service over an existing pool. Spawns the notification
    /// worker, so it must run inside a Tokio runtime.
    pub fn with_pool(config: ServerConfig, db: SqlitePool) -> Self {
        let hub = ChangeHub::new(config.realtime.hub_capacity);
        let accounts = AccountDirectory::new(db.clone());

        let notifications = NotificationStore::new(db.clone(), hub.clone());
        let (fanout, _worker) =
            NotificationFanout::spawn(notifications.clone(), config.notifications.queue_capacity);

        let moderation = ModerationQueue::new(
            db.clone(),
            accounts.clone(),
            fanout.clone(),
            hub.clone(),
            config.moderation.review_account_id.clone(),
        );
        let engagement =
            EngagementLedger::new(db.clone(), accounts.clone(), fanout.clone(), hub.clone());
        let videos = VideoCatalog::new(db.clone(), hub.clone());
        let comments = CommentStore::new(db.clone(), fanout.clone(), hub.clone());

        let blob_store = Arc::new(BlobStore::new(config.blob_storage()));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        tracing::info!("Publication pipeline initialised");

        Self {
            config: Arc::new(config),
            db,
            accounts,
            hub,
            moderation,
            engagement,
            notifications,
            fanout,
            videos,
            comments,
            blob_store,
            rate_limiter,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> ReelResult<()> {
        for dir in [&config.storage.data_directory, &config.storage.media_directory] {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    ReelError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> &str {
        &self.config.service.public_url
    }
}
