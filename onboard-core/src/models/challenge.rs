//! Challenge model - one-time code or biometric assertion state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication channel a challenge runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    Sms,
    Email,
    Biometric,
}

impl ChallengeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::Sms => "sms",
            ChallengeKind::Email => "email",
            ChallengeKind::Biometric => "biometric",
        }
    }
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    Issued,
    Verified,
    Expired,
}

/// An in-flight challenge issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub kind: ChallengeKind,
    pub state: ChallengeState,
    /// Masked destination (e.g. `+1•••••4567`) for display.
    pub scrubbed_destination: String,
    pub expires_at: DateTime<Utc>,
    /// Server-supplied resend cooldown deadline.
    pub resend_disabled_until: DateTime<Utc>,
}

impl Challenge {
    /// Whether a resend may be requested at `now`.
    ///
    /// Re-compared against the wall clock on every call; the deadline is a
    /// UX guard only, the server remains authoritative.
    pub fn can_resend(&self, now: DateTime<Utc>) -> bool {
        self.state == ChallengeState::Issued && now >= self.resend_disabled_until
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == ChallengeState::Expired || now >= self.expires_at
    }
}
