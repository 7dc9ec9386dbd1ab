/// Configuration management for ClassReel
use crate::{
    blob_store::BlobStorageConfig,
    error::{ReelError, ReelResult},
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub moderation: ModerationConfig,
    pub notifications: NotificationConfig,
    pub realtime: RealtimeConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    /// Public base URL, used to build media URLs
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub media_directory: PathBuf,
    pub max_upload_size: usize,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
}

/// Moderation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Account that receives upload review notifications
    pub review_account_id: Option<String>,
}

/// Notification fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
}

/// Realtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Events buffered per subscriber before it is told it lagged
    pub hub_capacity: usize,
    pub ping_interval_secs: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub authenticated_per_minute: u32,
    pub anonymous_per_minute: u32,
    pub moderator_per_minute: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Defaults for a single-host deployment rooted at `data_directory`
    pub fn local(data_directory: impl Into<PathBuf>, jwt_secret: impl Into<String>) -> Self {
        let data_directory = data_directory.into();
        let hostname = "localhost".to_string();
        let port = 3000;

        ServerConfig {
            service: ServiceConfig {
                public_url: format!("http://{}:{}", hostname, port),
                hostname,
                port,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                database: data_directory.join("classreel.sqlite"),
                media_directory: data_directory.join("media"),
                max_upload_size: 512 * 1024 * 1024,
                data_directory,
            },
            authentication: AuthConfig {
                jwt_secret: jwt_secret.into(),
            },
            moderation: ModerationConfig {
                review_account_id: None,
            },
            notifications: NotificationConfig {
                queue_capacity: 1024,
            },
            realtime: RealtimeConfig {
                hub_capacity: 256,
                ping_interval_secs: 30,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                authenticated_per_minute: 600,
                anonymous_per_minute: 120,
                moderator_per_minute: 1200,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ReelResult<Self> {
        dotenv::dotenv().ok();

        let jwt_secret = env::var("CLASSREEL_JWT_SECRET")
            .map_err(|_| ReelError::Validation("JWT secret required".to_string()))?;
        let data_directory: PathBuf = env::var("CLASSREEL_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        let mut config = Self::local(data_directory, jwt_secret);

        if let Ok(hostname) = env::var("CLASSREEL_HOSTNAME") {
            config.service.hostname = hostname;
        }
        config.service.port = env::var("CLASSREEL_PORT")
            .unwrap_or_else(|_| config.service.port.to_string())
            .parse()
            .map_err(|_| ReelError::Validation("Invalid port number".to_string()))?;
        config.service.public_url = env::var("CLASSREEL_PUBLIC_URL").unwrap_or_else(|_| {
            format!("http://{}:{}", config.service.hostname, config.service.port)
        });

        if let Ok(database) = env::var("CLASSREEL_DATABASE_LOCATION") {
            config.storage.database = database.into();
        }
        if let Ok(media) = env::var("CLASSREEL_MEDIA_DIRECTORY") {
            config.storage.media_directory = media.into();
        }
        config.storage.max_upload_size = parse_or("CLASSREEL_MAX_UPLOAD_SIZE", config.storage.max_upload_size);

        config.moderation.review_account_id = env::var("CLASSREEL_REVIEW_ACCOUNT_ID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        config.notifications.queue_capacity =
            parse_or("CLASSREEL_NOTIFICATION_QUEUE_CAPACITY", config.notifications.queue_capacity);
        config.realtime.hub_capacity =
            parse_or("CLASSREEL_REALTIME_HUB_CAPACITY", config.realtime.hub_capacity);
        config.realtime.ping_interval_secs =
            parse_or("CLASSREEL_REALTIME_PING_INTERVAL", config.realtime.ping_interval_secs);

        config.rate_limit.enabled = parse_or("CLASSREEL_RATE_LIMITS_ENABLED", true);
        config.rate_limit.authenticated_per_minute = parse_or(
            "CLASSREEL_RATE_LIMIT_AUTHENTICATED_PER_MINUTE",
            config.rate_limit.authenticated_per_minute,
        );
        config.rate_limit.anonymous_per_minute = parse_or(
            "CLASSREEL_RATE_LIMIT_ANONYMOUS_PER_MINUTE",
            config.rate_limit.anonymous_per_minute,
        );
        config.rate_limit.moderator_per_minute = parse_or(
            "CLASSREEL_RATE_LIMIT_MODERATOR_PER_MINUTE",
            config.rate_limit.moderator_per_minute,
        );

        config.logging.level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(config)
    }

    /// Blob store settings derived from storage and service settings
    pub fn blob_storage(&self) -> BlobStorageConfig {
        BlobStorageConfig {
            location: self.storage.media_directory.clone(),
            max_blob_size: self.storage.max_upload_size,
            public_base_url: format!("{}/media", self.service.public_url.trim_end_matches('/')),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ReelResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ReelError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(ReelError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.notifications.queue_capacity == 0 || self.realtime.hub_capacity == 0 {
            return Err(ReelError::Validation(
                "Queue capacities must be positive".to_string(),
            ));
        }

        if self.storage.max_upload_size == 0 {
            return Err(ReelError::Validation(
                "Upload size limit must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_defaults_are_valid() {
        let config = ServerConfig::local("/tmp/reel", "0123456789abcdef0123456789abcdef");
        config.validate().unwrap();

        assert_eq!(config.storage.database, PathBuf::from("/tmp/reel/classreel.sqlite"));
        assert_eq!(
            config.blob_storage().public_base_url,
            "http://localhost:3000/media"
        );
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = ServerConfig::local("/tmp/reel", "short");
        assert!(matches!(config.validate(), Err(ReelError::Validation(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = ServerConfig::local("/tmp/reel", "0123456789abcdef0123456789abcdef");
        config.notifications.queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
