/// Authentication extractors
///
/// Handlers receive the acting account explicitly through these extractors;
/// nothing below the HTTP layer looks up a "current user".
use crate::{
    context::AppContext,
    engagement::{mint_anonymous_token, ViewerKey},
    error::{ReelError, ReelResult},
    identity::{verify_token, Actor},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

/// Header carrying the per-browser anonymous viewer token
pub const VIEWER_TOKEN_HEADER: &str = "x-viewer-token";

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Verify the bearer token, if any, and refresh the mirrored account row.
/// A present but invalid token is an error, never a silent downgrade.
async fn authenticate(parts: &Parts, ctx: &AppContext) -> ReelResult<Option<Actor>> {
    let Some(token) = extract_bearer_token(&parts.headers) else {
        return Ok(None);
    };

    let actor = verify_token(token, &ctx.config.authentication.jwt_secret)?;
    ctx.accounts.remember(&actor).await?;

    Ok(Some(actor))
}

/// Authenticated actor - rejects the request without a valid token
#[derive(Debug, Clone)]
pub struct AuthActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppContext> for AuthActor {
    type Rejection = ReelError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
            .await?
            .map(AuthActor)
            .ok_or_else(|| ReelError::Authentication("Missing authorization header".to_string()))
    }
}

/// Optional actor for endpoints that also serve anonymous visitors
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

#[async_trait]
impl FromRequestParts<AppContext> for MaybeActor {
    type Rejection = ReelError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeActor(authenticate(parts, state).await?))
    }
}

/// Who is watching a video. `minted` is set when the browser sent no token
/// and one was created for it; handlers return it so it can be persisted.
#[derive(Debug, Clone)]
pub struct ViewerIdentity {
    pub actor: Option<Actor>,
    pub key: ViewerKey,
    pub minted: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppContext> for ViewerIdentity {
    type Rejection = ReelError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let actor = authenticate(parts, state).await?;
        let sent = parts
            .headers
            .get(VIEWER_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let minted = match (&actor, &sent) {
            (None, None) => Some(mint_anonymous_token()),
            _ => None,
        };
        let token = sent.as_deref().or(minted.as_deref());
        let key = ViewerKey::resolve(actor.as_ref(), token)?;

        Ok(ViewerIdentity { actor, key, minted })
    }
}
