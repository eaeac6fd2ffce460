//! Backend collaborator trait.
//!
//! The vault/API service is external to this core. Implementations own
//! transport and serialization; the core only sees these operations.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::dtos::{
    ChallengeAnswer, ChallengeIssued, HandoffPoll, IdentifierLookup, OnboardingStatus,
    VerifiedAuth,
};
use crate::models::{AuthToken, ChallengeKind, DataIdentifier, Identifier, ScopedAuthToken, TokenPurpose};

/// Failure reported by the backend collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure; the caller may retry in place.
    #[error("network error: {0}")]
    Network(#[from] anyhow::Error),

    /// The server rejected the request payload.
    #[error("validation rejected: {0}")]
    Validation(String),

    /// Wrong one-time code or failed assertion; retry with new input.
    #[error("challenge verification failed")]
    IncorrectAnswer,

    /// The challenge or token is past its TTL; restart the flow instance.
    #[error("expired: {0}")]
    Expired(String),

    /// Anything else the server refused.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Whether the owning machine should stay in place and allow retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BackendError::Network(_)
                | BackendError::Validation(_)
                | BackendError::IncorrectAnswer
        )
    }
}

/// Operations the core consumes from the identity-verification backend.
#[async_trait]
pub trait OnboardingBackend: Send + Sync {
    /// Resolve an identifier to an account and its usable challenge kinds.
    async fn lookup_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<IdentifierLookup, BackendError>;

    /// Issue (or reissue) a challenge over the given channel.
    async fn issue_challenge(
        &self,
        kind: ChallengeKind,
        identifier: &Identifier,
    ) -> Result<ChallengeIssued, BackendError>;

    /// Verify a code or assertion against an outstanding challenge.
    async fn verify_challenge(
        &self,
        challenge_id: &str,
        answer: &ChallengeAnswer,
    ) -> Result<VerifiedAuth, BackendError>;

    /// Fetch a fresh session view, including the vault snapshot.
    async fn get_onboarding_status(
        &self,
        token: &AuthToken,
    ) -> Result<OnboardingStatus, BackendError>;

    /// Write collected attribute values into the vault.
    async fn vault_data(
        &self,
        token: &AuthToken,
        data: HashMap<DataIdentifier, String>,
    ) -> Result<(), BackendError>;

    /// Mint a narrow, time-limited token for one cross-device purpose.
    async fn generate_scoped_token(
        &self,
        token: &AuthToken,
        purpose: TokenPurpose,
    ) -> Result<ScopedAuthToken, BackendError>;

    /// Read the companion session's status. Delivered to the coordinator as
    /// a `statusReceived` event by the polling collaborator.
    async fn poll_handoff_status(
        &self,
        token: &ScopedAuthToken,
    ) -> Result<HandoffPoll, BackendError>;
}
