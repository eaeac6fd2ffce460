//! Wire shapes exchanged with the backend collaborator.
//!
//! Transport-agnostic: the backend trait decides how these travel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AuthToken, ChallengeKind, VaultSnapshot};

/// Result of resolving an identifier to an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifierLookup {
    pub account_found: bool,
    /// Challenge kinds the account can receive. Empty when no account was
    /// found; the flow still proceeds so signup can be offered.
    pub available_challenge_kinds: Vec<ChallengeKind>,
    pub has_syncable_passkey: bool,
}

/// Server acknowledgement of an issued challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeIssued {
    pub challenge_id: String,
    pub scrubbed_destination: String,
    pub expires_at: DateTime<Utc>,
    pub resend_disabled_until: DateTime<Utc>,
}

/// User's answer to an outstanding challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeAnswer {
    /// One-time code typed by the user.
    Code(String),
    /// Platform credential assertion blob.
    Assertion(String),
}

/// Outcome of a verified challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedAuth {
    pub auth_token: AuthToken,
}

/// Fresh view of the onboarding session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingStatus {
    pub snapshot: VaultSnapshot,
}

/// Poll status of a companion handoff session, server-side view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPollStatus {
    InProgress,
    Completed,
    Failed,
    Canceled,
}

/// One `statusReceived` delivery from the polling collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HandoffPoll {
    pub status: HandoffPollStatus,
    /// Set when the scoped token is no longer valid (expired server-side).
    pub is_error: bool,
}
