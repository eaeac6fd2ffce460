//! Test helper module for onboard-core integration tests.
//!
//! Provides a scriptable in-memory backend standing in for the
//! identity-verification service.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use onboard_core::config::{PlaybookConfig, PlaybookStatus};
use onboard_core::dtos::{
    ChallengeAnswer, ChallengeIssued, HandoffPoll, HandoffPollStatus, IdentifierLookup,
    OnboardingStatus, VerifiedAuth,
};
use onboard_core::models::{
    AuthToken, ChallengeKind, CollectedDataOption, DataIdentifier, Identifier, ScopedAuthToken,
    TokenPurpose, VaultSnapshot,
};
use onboard_core::services::{BackendError, OnboardingBackend};

pub const TEST_CODE: &str = "424242";
pub const TEST_AUTH_TOKEN: &str = "tok_test_1";

/// Scriptable backend double.
pub struct MockBackend {
    pub lookup: Mutex<IdentifierLookup>,
    /// Queued lookup failures consumed before the canned response.
    pub lookup_failures: Mutex<VecDeque<BackendError>>,
    pub issued_kinds: Mutex<Vec<ChallengeKind>>,
    pub issue_count: AtomicUsize,
    pub verify_count: AtomicUsize,
    /// When set, the next verify fails with this error.
    pub verify_failures: Mutex<VecDeque<BackendError>>,
    pub resend_cooldown_secs: i64,
    pub snapshot: Mutex<VaultSnapshot>,
    pub scoped_token_fails: Mutex<bool>,
    pub handoff_polls: Mutex<VecDeque<HandoffPoll>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            lookup: Mutex::new(IdentifierLookup::default()),
            lookup_failures: Mutex::new(VecDeque::new()),
            issued_kinds: Mutex::new(Vec::new()),
            issue_count: AtomicUsize::new(0),
            verify_count: AtomicUsize::new(0),
            verify_failures: Mutex::new(VecDeque::new()),
            resend_cooldown_secs: 30,
            snapshot: Mutex::new(VaultSnapshot::default()),
            scoped_token_fails: Mutex::new(false),
            handoff_polls: Mutex::new(VecDeque::new()),
        }
    }
}

impl MockBackend {
    pub fn with_lookup(lookup: IdentifierLookup) -> Self {
        Self {
            lookup: Mutex::new(lookup),
            ..Self::default()
        }
    }

    pub fn issued(&self) -> Vec<ChallengeKind> {
        self.issued_kinds.lock().unwrap().clone()
    }
}

#[async_trait]
impl OnboardingBackend for MockBackend {
    async fn lookup_identifier(
        &self,
        _identifier: &Identifier,
    ) -> Result<IdentifierLookup, BackendError> {
        if let Some(error) = self.lookup_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.lookup.lock().unwrap().clone())
    }

    async fn issue_challenge(
        &self,
        kind: ChallengeKind,
        identifier: &Identifier,
    ) -> Result<ChallengeIssued, BackendError> {
        let n = self.issue_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.issued_kinds.lock().unwrap().push(kind);
        let now = Utc::now();
        Ok(ChallengeIssued {
            challenge_id: format!("chal_{n}"),
            scrubbed_destination: identifier.scrubbed(),
            expires_at: now + Duration::minutes(10),
            resend_disabled_until: now + Duration::seconds(self.resend_cooldown_secs),
        })
    }

    async fn verify_challenge(
        &self,
        _challenge_id: &str,
        answer: &ChallengeAnswer,
    ) -> Result<VerifiedAuth, BackendError> {
        self.verify_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.verify_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        match answer {
            ChallengeAnswer::Code(code) if code == TEST_CODE => Ok(VerifiedAuth {
                auth_token: AuthToken::new(TEST_AUTH_TOKEN),
            }),
            ChallengeAnswer::Code(_) => Err(BackendError::IncorrectAnswer),
            ChallengeAnswer::Assertion(_) => Ok(VerifiedAuth {
                auth_token: AuthToken::new(TEST_AUTH_TOKEN),
            }),
        }
    }

    async fn get_onboarding_status(
        &self,
        _token: &AuthToken,
    ) -> Result<OnboardingStatus, BackendError> {
        Ok(OnboardingStatus {
            snapshot: self.snapshot.lock().unwrap().clone(),
        })
    }

    async fn vault_data(
        &self,
        _token: &AuthToken,
        data: HashMap<DataIdentifier, String>,
    ) -> Result<(), BackendError> {
        let mut snapshot = self.snapshot.lock().unwrap();
        snapshot.populated.extend(data.keys().copied());
        Ok(())
    }

    async fn generate_scoped_token(
        &self,
        _token: &AuthToken,
        purpose: TokenPurpose,
    ) -> Result<ScopedAuthToken, BackendError> {
        if *self.scoped_token_fails.lock().unwrap() {
            return Err(BackendError::Rejected("scoped token refused".to_string()));
        }
        Ok(ScopedAuthToken::new(
            "d2p_tok_1",
            purpose,
            Utc::now() + Duration::minutes(5),
        ))
    }

    async fn poll_handoff_status(
        &self,
        _token: &ScopedAuthToken,
    ) -> Result<HandoffPoll, BackendError> {
        Ok(self
            .handoff_polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(HandoffPoll {
                status: HandoffPollStatus::InProgress,
                is_error: false,
            }))
    }
}

/// Minimal active playbook collecting basic + address.
pub fn kyc_playbook() -> PlaybookConfig {
    PlaybookConfig {
        key: "pb_test_kyc".to_string(),
        name: "Test KYC".to_string(),
        status: PlaybookStatus::Active,
        must_collect: vec![CollectedDataOption::Basic, CollectedDataOption::FullAddress],
        optional_attributes: vec![DataIdentifier::AddressLine2],
        collect_document: false,
        require_liveness: false,
        sandbox_outcome: None,
    }
}

/// Lookup for a returning user with a syncable passkey.
pub fn passkey_lookup() -> IdentifierLookup {
    IdentifierLookup {
        account_found: true,
        available_challenge_kinds: vec![ChallengeKind::Biometric, ChallengeKind::Sms],
        has_syncable_passkey: true,
    }
}

/// Lookup for a returning user reachable over SMS and email only.
pub fn otp_lookup() -> IdentifierLookup {
    IdentifierLookup {
        account_found: true,
        available_challenge_kinds: vec![ChallengeKind::Sms, ChallengeKind::Email],
        has_syncable_passkey: false,
    }
}
