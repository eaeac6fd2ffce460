//! Shared harness for cross-component onboarding workflow tests.
//!
//! [`InMemoryService`] simulates the identity-verification backend well
//! enough to run whole onboarding sessions in-process: accounts, one-time
//! codes, a vault snapshot, and a handoff status channel the tests can
//! flip from the "companion device" side.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use onboard_core::config::{PlaybookConfig, PlaybookStatus};
use onboard_core::dtos::{
    ChallengeAnswer, ChallengeIssued, HandoffPoll, HandoffPollStatus, IdentifierLookup,
    OnboardingStatus, VerifiedAuth,
};
use onboard_core::models::{
    AuthToken, CdoTable, ChallengeKind, CollectedDataOption, CompanionDeviceType, DataIdentifier,
    Identifier, Requirement, RequirementKind, ScopedAuthToken, TokenPurpose, VaultSnapshot,
};
use onboard_core::services::{
    BackendError, D2pInitiator, D2pState, OnboardingBackend, ServiceError, StepExecutor,
};

/// The one-time code the in-memory service accepts.
pub const LIVE_CODE: &str = "123456";

/// Registered account visible to `lookup_identifier`.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub available_challenge_kinds: Vec<ChallengeKind>,
    pub has_syncable_passkey: bool,
}

#[derive(Debug, Clone)]
struct OutstandingChallenge {
    kind: ChallengeKind,
}

/// In-process stand-in for the identity-verification service.
pub struct InMemoryService {
    accounts: Mutex<HashMap<String, AccountRecord>>,
    challenges: Mutex<HashMap<String, OutstandingChallenge>>,
    next_id: AtomicUsize,
    pub snapshot: Mutex<VaultSnapshot>,
    handoff: Mutex<HandoffPoll>,
    pub resend_cooldown_secs: i64,
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            challenges: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
            snapshot: Mutex::new(VaultSnapshot::default()),
            handoff: Mutex::new(HandoffPoll {
                status: HandoffPollStatus::InProgress,
                is_error: false,
            }),
            resend_cooldown_secs: 30,
        }
    }
}

impl InMemoryService {
    pub fn register_account(&self, identifier_value: &str, record: AccountRecord) {
        self.accounts
            .lock()
            .unwrap()
            .insert(identifier_value.to_string(), record);
    }

    /// Companion-device side finishing its requirement loop.
    pub fn complete_handoff(&self) {
        self.handoff.lock().unwrap().status = HandoffPollStatus::Completed;
    }

    pub fn cancel_handoff(&self) {
        self.handoff.lock().unwrap().status = HandoffPollStatus::Canceled;
    }

    /// Server-side token expiry: the poll channel reports an error flag.
    pub fn expire_handoff(&self) {
        self.handoff.lock().unwrap().is_error = true;
    }
}

#[async_trait]
impl OnboardingBackend for InMemoryService {
    async fn lookup_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<IdentifierLookup, BackendError> {
        let accounts = self.accounts.lock().unwrap();
        Ok(match accounts.get(&identifier.value) {
            Some(record) => IdentifierLookup {
                account_found: true,
                available_challenge_kinds: record.available_challenge_kinds.clone(),
                has_syncable_passkey: record.has_syncable_passkey,
            },
            None => IdentifierLookup::default(),
        })
    }

    async fn issue_challenge(
        &self,
        kind: ChallengeKind,
        identifier: &Identifier,
    ) -> Result<ChallengeIssued, BackendError> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let challenge_id = format!("chal_{n}");
        self.challenges
            .lock()
            .unwrap()
            .insert(challenge_id.clone(), OutstandingChallenge { kind });
        let now = Utc::now();
        Ok(ChallengeIssued {
            challenge_id,
            scrubbed_destination: identifier.scrubbed(),
            expires_at: now + Duration::minutes(10),
            resend_disabled_until: now + Duration::seconds(self.resend_cooldown_secs),
        })
    }

    async fn verify_challenge(
        &self,
        challenge_id: &str,
        answer: &ChallengeAnswer,
    ) -> Result<VerifiedAuth, BackendError> {
        let challenges = self.challenges.lock().unwrap();
        let Some(challenge) = challenges.get(challenge_id) else {
            return Err(BackendError::Expired(format!(
                "unknown challenge {challenge_id}"
            )));
        };
        let accepted = match (challenge.kind, answer) {
            (ChallengeKind::Biometric, ChallengeAnswer::Assertion(_)) => true,
            (ChallengeKind::Sms | ChallengeKind::Email, ChallengeAnswer::Code(code)) => {
                code == LIVE_CODE
            }
            _ => false,
        };
        if !accepted {
            return Err(BackendError::IncorrectAnswer);
        }
        Ok(VerifiedAuth {
            auth_token: AuthToken::new(format!("tok_live_{challenge_id}")),
        })
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
        self.snapshot
            .lock()
            .unwrap()
            .populated
            .extend(data.keys().copied());
        Ok(())
    }

    async fn generate_scoped_token(
        &self,
        token: &AuthToken,
        purpose: TokenPurpose,
    ) -> Result<ScopedAuthToken, BackendError> {
        Ok(ScopedAuthToken::new(
            format!("d2p_{}", token.reveal()),
            purpose,
            Utc::now() + Duration::minutes(5),
        ))
    }

    async fn poll_handoff_status(
        &self,
        _token: &ScopedAuthToken,
    ) -> Result<HandoffPoll, BackendError> {
        Ok(*self.handoff.lock().unwrap())
    }
}

/// Context shared by all workflow tests.
pub struct OnboardingTestContext {
    pub service: Arc<InMemoryService>,
    pub config: PlaybookConfig,
    pub table: Arc<CdoTable>,
}

impl OnboardingTestContext {
    pub fn new() -> Self {
        Self {
            service: Arc::new(InMemoryService::default()),
            config: kyc_playbook(),
            table: Arc::new(CdoTable::standard()),
        }
    }

    pub fn backend(&self) -> Arc<dyn OnboardingBackend> {
        self.service.clone()
    }
}

impl Default for OnboardingTestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Step executor used by workflow tests: vaults whatever is missing and
/// runs device steps either locally or through a D2P handoff.
pub struct WorkflowExecutor {
    service: Arc<InMemoryService>,
    token: AuthToken,
    /// Delegate document/liveness steps to a companion device.
    pub use_handoff: bool,
}

impl WorkflowExecutor {
    pub fn new(service: Arc<InMemoryService>, token: AuthToken) -> Self {
        Self {
            service,
            token,
            use_handoff: false,
        }
    }

    fn finish_device_step(&self, requirement: &Requirement) {
        let mut snapshot = self.service.snapshot.lock().unwrap();
        match requirement.kind {
            RequirementKind::CollectDocument => snapshot.document_uploaded = true,
            RequirementKind::Liveness => snapshot.liveness_completed = true,
            _ => {}
        }
    }
}

#[async_trait]
impl StepExecutor for WorkflowExecutor {
    async fn collect_data(&self, requirement: &Requirement) -> Result<(), ServiceError> {
        let data: HashMap<DataIdentifier, String> = requirement
            .missing_attributes
            .iter()
            .map(|di| (*di, format!("value for {di}")))
            .collect();
        tracing::info!(requirement = %requirement.kind, count = data.len(), "vaulting attributes");
        self.service.vault_data(&self.token, data).await?;
        Ok(())
    }

    async fn run_device_step(&self, requirement: &Requirement) -> Result<(), ServiceError> {
        if !self.use_handoff {
            self.finish_device_step(requirement);
            return Ok(());
        }

        tracing::info!(requirement = %requirement.kind, "delegating device step to companion");
        let mut initiator = D2pInitiator::new(self.service.clone());
        initiator
            .begin(&self.token, CompanionDeviceType::Mobile)
            .await?;
        loop {
            match initiator.poll_once().await? {
                None => continue,
                Some(D2pState::Completed) => {
                    // The companion device vaulted the capture server-side;
                    // mirror that in the shared snapshot.
                    self.finish_device_step(requirement);
                    return Ok(());
                }
                Some(state) => {
                    return Err(ServiceError::Step(format!(
                        "handoff ended without completion: {state:?}"
                    )))
                }
            }
        }
    }

    async fn register_auth_method(&self, _requirement: &Requirement) -> Result<(), ServiceError> {
        self.service.snapshot.lock().unwrap().auth_method_registered = true;
        Ok(())
    }
}

/// Active playbook collecting basic + address with a required auth method.
pub fn kyc_playbook() -> PlaybookConfig {
    PlaybookConfig {
        key: "pb_workflow".to_string(),
        name: "Workflow KYC".to_string(),
        status: PlaybookStatus::Active,
        must_collect: vec![CollectedDataOption::Basic, CollectedDataOption::FullAddress],
        optional_attributes: vec![DataIdentifier::AddressLine2],
        collect_document: false,
        require_liveness: false,
        sandbox_outcome: None,
    }
}
