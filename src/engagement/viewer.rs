/// Viewer identity for view deduplication
use crate::{
    error::{ReelError, ReelResult},
    identity::Actor,
};
use serde::{Deserialize, Serialize};

const MIN_TOKEN_LEN: usize = 16;
const MAX_TOKEN_LEN: usize = 128;

/// Who is watching: an account, or an anonymous browser token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ViewerKey {
    Account(String),
    Anonymous(String),
}

impl ViewerKey {
    /// Authenticated actors always win over a token the browser also sent
    pub fn resolve(actor: Option<&Actor>, anonymous_token: Option<&str>) -> ReelResult<Self> {
        if let Some(actor) = actor {
            return Ok(ViewerKey::Account(actor.account_id.clone()));
        }

        match anonymous_token {
            Some(token) if is_valid_anonymous_token(token) => {
                Ok(ViewerKey::Anonymous(token.to_string()))
            }
            Some(_) => Err(ReelError::Validation("Malformed viewer token".to_string())),
            None => Err(ReelError::Validation("A viewer token is required".to_string())),
        }
    }

    /// Dedup key stored with the view event. Prefixed so a token can never
    /// collide with an account id.
    pub fn as_key(&self) -> String {
        match self {
            ViewerKey::Account(id) => format!("acct:{}", id),
            ViewerKey::Anonymous(token) => format!("anon:{}", token),
        }
    }

    pub fn account_id(&self) -> Option<&str> {
        match self {
            ViewerKey::Account(id) => Some(id),
            ViewerKey::Anonymous(_) => None,
        }
    }
}

/// Fresh per-browser token for viewers without one
pub fn mint_anonymous_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

pub fn is_valid_anonymous_token(token: &str) -> bool {
    (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&token.len())
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_wins_over_token() {
        let actor = Actor::new("acct-a", "Ana");
        let key = ViewerKey::resolve(Some(&actor), Some("0123456789abcdef")).unwrap();

        assert_eq!(key, ViewerKey::Account("acct-a".to_string()));
        assert_eq!(key.as_key(), "acct:acct-a");
        assert_eq!(key.account_id(), Some("acct-a"));
    }

    #[test]
    fn test_anonymous_token_validated() {
        let token = mint_anonymous_token();
        assert_eq!(token.len(), 32);

        let key = ViewerKey::resolve(None, Some(&token)).unwrap();
        assert_eq!(key.as_key(), format!("anon:{}", token));
        assert_eq!(key.account_id(), None);

        assert!(ViewerKey::resolve(None, Some("short")).is_err());
        assert!(ViewerKey::resolve(None, Some("has spaces in it, nope")).is_err());
        assert!(ViewerKey::resolve(None, None).is_err());
    }

    #[test]
    fn test_minted_tokens_differ() {
        assert_ne!(mint_anonymous_token(), mint_anonymous_token());
    }
}
