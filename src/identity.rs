/// Actor identity supplied by the external identity provider
///
/// The provider signs an HS256 token per session. ClassReel only verifies
/// it and turns the claims into an explicit [`Actor`] that is passed into
/// every core operation.
use crate::error::{ReelError, ReelResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Authenticated person acting on the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub account_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub is_moderator: bool,
}

impl Actor {
    pub fn new(account_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            display_name: display_name.into(),
            avatar_ref: None,
            is_moderator: false,
        }
    }

    pub fn moderator(account_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            is_moderator: true,
            ..Self::new(account_id, display_name)
        }
    }

    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.avatar_ref = Some(avatar_ref.into());
        self
    }
}

/// Claims carried by the identity provider's session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorClaims {
    pub sub: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub moderator: bool,
    pub exp: i64,
}

impl From<ActorClaims> for Actor {
    fn from(claims: ActorClaims) -> Self {
        Actor {
            account_id: claims.sub,
            display_name: claims.name,
            avatar_ref: claims.avatar,
            is_moderator: claims.moderator,
        }
    }
}

/// Verify a session token and extract the actor
pub fn verify_token(token: &str, secret: &str) -> ReelResult<Actor> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (1 minute)
    validation.leeway = 60;

    let data = decode::<ActorClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!("Token verification failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ReelError::Authentication("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ReelError::Authentication("Invalid token signature".to_string())
            }
            _ => ReelError::Authentication(format!("Invalid token: {}", e)),
        }
    })?;

    if data.claims.sub.trim().is_empty() {
        return Err(ReelError::Authentication("Token has an empty subject".to_string()));
    }

    Ok(data.claims.into())
}

/// Sign a session token for an actor.
///
/// Used by identity-provider integrations and by tests; the HTTP surface
/// never issues tokens itself.
pub fn sign_token(actor: &Actor, secret: &str, ttl: Duration) -> ReelResult<String> {
    let claims = ActorClaims {
        sub: actor.account_id.clone(),
        name: actor.display_name.clone(),
        avatar: actor.avatar_ref.clone(),
        moderator: actor.is_moderator,
        exp: (Utc::now() + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ReelError::Internal(format!("Failed to sign token: {}", e)))
}
