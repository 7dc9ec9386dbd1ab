/// Rate Limiting System
use crate::{
    auth::extract_bearer_token,
    config::RateLimitConfig,
    error::{ReelError, ReelResult},
    identity::verify_token,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Which quota a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateClass {
    Anonymous,
    Authenticated,
    Moderator,
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    anonymous: Arc<DirectLimiter>,
    moderator: Arc<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(per_minute(
                config.authenticated_per_minute,
            ))),
            anonymous: Arc::new(GovernorLimiter::direct(per_minute(config.anonymous_per_minute))),
            moderator: Arc::new(GovernorLimiter::direct(per_minute(config.moderator_per_minute))),
        }
    }

    pub fn check(&self, class: RateClass) -> ReelResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = match class {
            RateClass::Anonymous => &self.anonymous,
            RateClass::Authenticated => &self.authenticated,
            RateClass::Moderator => &self.moderator,
        };

        limiter.check().map_err(|_| ReelError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }
}

fn per_minute(requests: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN))
}

/// Classify by bearer token; invalid tokens count as anonymous and are
/// rejected later by the extractors
fn classify(request: &Request, jwt_secret: &str) -> RateClass {
    match extract_bearer_token(request.headers()).map(|token| verify_token(token, jwt_secret)) {
        Some(Ok(actor)) if actor.is_moderator => RateClass::Moderator,
        Some(Ok(_)) => RateClass::Authenticated,
        _ => RateClass::Anonymous,
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ReelError> {
    let class = classify(&request, &ctx.config.authentication.jwt_secret);

    if let Err(e) = ctx.rate_limiter.check(class) {
        tracing::debug!("Rate limit hit for {:?} on {}", class, request.uri().path());
        return Err(e);
    }

    Ok(next.run(request).await)
}
