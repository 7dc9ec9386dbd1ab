//! ClassReel - publication and engagement backend for an educational
//! video-sharing site
//!
//! Uploads pass through a moderation queue before they become visible.
//! Published videos collect views, likes, comments and followers, the
//! people involved are notified, and every confirmed change is pushed to
//! connected clients over a WebSocket.

pub mod api;
pub mod auth;
pub mod blob_store;
pub mod comments;
pub mod config;
pub mod context;
pub mod db;
pub mod engagement;
pub mod error;
pub mod identity;
pub mod jobs;
pub mod metrics;
pub mod moderation;
pub mod notifications;
pub mod rate_limit;
pub mod realtime;
pub mod server;
pub mod videos;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{ReelError, ReelResult};
pub use identity::Actor;
