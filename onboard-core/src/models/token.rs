//! Auth token newtypes.
//!
//! Newtypes prevent accidental logging of bearer credentials; `Debug` and
//! `Display` render a redacted form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ephemeral bearer credential produced by a successful identify flow.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for the `Authorization` header; do not log.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthToken(***)")
    }
}

impl std::fmt::Display for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

/// Purpose a scoped token is minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Device-to-phone handoff of a registration step.
    Handoff,
}

/// Narrow, time-limited credential derived from an [`AuthToken`] for one
/// cross-device purpose. Strictly weaker than the token it derives from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedAuthToken {
    token: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
}

impl ScopedAuthToken {
    pub fn new(token: impl Into<String>, purpose: TokenPurpose, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            purpose,
            expires_at,
        }
    }

    pub fn reveal(&self) -> &str {
        &self.token
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for ScopedAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedAuthToken")
            .field("token", &"***")
            .field("purpose", &self.purpose)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_auth_token_debug_is_redacted() {
        let token = AuthToken::new("tok_secret_123");
        assert!(!format!("{:?}", token).contains("secret"));
        assert_eq!(token.reveal(), "tok_secret_123");
    }

    #[test]
    fn test_scoped_token_expiry() {
        let now = Utc::now();
        let token = ScopedAuthToken::new("d2p_abc", TokenPurpose::Handoff, now + Duration::minutes(5));
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::minutes(6)));
    }
}
