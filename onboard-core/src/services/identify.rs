//! Identify flow - challenge/response authentication state machine.
//!
//! The machine itself is pure: `handle(event)` only rewrites state and
//! returns the actions the caller must execute. [`IdentifySession`] is the
//! async driver that executes those actions against the backend and feeds
//! the responses back in as events.
//!
//! Every outbound request carries a monotonically increasing tag. A response
//! whose tag is not the latest outstanding one is discarded, which makes
//! stale replies and post-reset replies no-ops.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{ConfigError, PlaybookConfig, SandboxOutcome};
use crate::dtos::{ChallengeAnswer, ChallengeIssued, IdentifierLookup, VerifiedAuth};
use crate::models::{
    CdoTable, Challenge, ChallengeKind, ChallengeState, Identifier, IdentifierKind,
};
use crate::services::client::{BackendError, OnboardingBackend};

pub type RequestTag = u64;

/// Terminal payload of a successful identify flow.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifySuccess {
    pub auth_token: crate::models::AuthToken,
    pub user_found: bool,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub id_doc_outcome: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentifyState {
    Init,
    /// Fatal: the playbook failed validation. No retry path.
    ConfigInvalid { error: ConfigError },
    /// Forced outcome for sandbox tenants; terminal.
    SandboxOutcome { outcome: SandboxOutcome },
    /// A bootstrap identifier is being looked up without prompting.
    InitBootstrap,
    EmailIdentification,
    PhoneIdentification,
    SmsChallenge,
    EmailChallenge,
    BiometricChallenge,
    Success { outcome: IdentifySuccess },
}

impl IdentifyState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IdentifyState::ConfigInvalid { .. }
                | IdentifyState::SandboxOutcome { .. }
                | IdentifyState::Success { .. }
        )
    }

    fn challenge_kind(&self) -> Option<ChallengeKind> {
        match self {
            IdentifyState::SmsChallenge => Some(ChallengeKind::Sms),
            IdentifyState::EmailChallenge => Some(ChallengeKind::Email),
            IdentifyState::BiometricChallenge => Some(ChallengeKind::Biometric),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            IdentifyState::Init => "init",
            IdentifyState::ConfigInvalid { .. } => "config_invalid",
            IdentifyState::SandboxOutcome { .. } => "sandbox_outcome",
            IdentifyState::InitBootstrap => "init_bootstrap",
            IdentifyState::EmailIdentification => "email_identification",
            IdentifyState::PhoneIdentification => "phone_identification",
            IdentifyState::SmsChallenge => "sms_challenge",
            IdentifyState::EmailChallenge => "email_challenge",
            IdentifyState::BiometricChallenge => "biometric_challenge",
            IdentifyState::Success { .. } => "success",
        }
    }
}

/// Recoverable condition surfaced alongside the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifyError {
    LookupFailed(String),
    ChallengeIssueFailed(String),
    VerificationFailed(String),
    ChallengeExpired,
    ResendThrottled { until: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub enum IdentifyEvent {
    IdentifierSubmitted { identifier: Identifier },
    LookupCompleted { tag: RequestTag, lookup: IdentifierLookup },
    LookupFailed { tag: RequestTag, error: String },
    ChallengeIssued { tag: RequestTag, issued: ChallengeIssued },
    ChallengeIssueFailed { tag: RequestTag, error: String },
    CodeSubmitted { code: String, now: DateTime<Utc> },
    AssertionProvided { assertion: String },
    ChallengeVerified { tag: RequestTag, auth: VerifiedAuth },
    ChallengeFailed { tag: RequestTag, error: String },
    ChallengeExpired { tag: RequestTag },
    ResendRequested { now: DateTime<Utc> },
    ChangeChallengeToSms,
    IdentifyReset,
}

impl IdentifyEvent {
    fn name(&self) -> &'static str {
        match self {
            IdentifyEvent::IdentifierSubmitted { .. } => "identifier_submitted",
            IdentifyEvent::LookupCompleted { .. } => "lookup_completed",
            IdentifyEvent::LookupFailed { .. } => "lookup_failed",
            IdentifyEvent::ChallengeIssued { .. } => "challenge_issued",
            IdentifyEvent::ChallengeIssueFailed { .. } => "challenge_issue_failed",
            IdentifyEvent::CodeSubmitted { .. } => "code_submitted",
            IdentifyEvent::AssertionProvided { .. } => "assertion_provided",
            IdentifyEvent::ChallengeVerified { .. } => "challenge_verified",
            IdentifyEvent::ChallengeFailed { .. } => "challenge_failed",
            IdentifyEvent::ChallengeExpired { .. } => "challenge_expired",
            IdentifyEvent::ResendRequested { .. } => "resend_requested",
            IdentifyEvent::ChangeChallengeToSms => "change_challenge_to_sms",
            IdentifyEvent::IdentifyReset => "identify_reset",
        }
    }
}

/// Side effect the driver must execute for the machine.
#[derive(Debug, Clone)]
pub enum IdentifyAction {
    LookupIdentifier {
        tag: RequestTag,
        identifier: Identifier,
    },
    IssueChallenge {
        tag: RequestTag,
        kind: ChallengeKind,
        identifier: Identifier,
    },
    VerifyChallenge {
        tag: RequestTag,
        challenge_id: String,
        answer: ChallengeAnswer,
    },
}

/// Mutable context carried across identify states.
#[derive(Debug, Clone, Default)]
pub struct IdentifyContext {
    pub identifier: Option<Identifier>,
    pub account_found: Option<bool>,
    pub available_challenge_kinds: Vec<ChallengeKind>,
    pub has_syncable_passkey: bool,
    pub challenge: Option<Challenge>,
    pub last_error: Option<IdentifyError>,
    /// Set once the user explicitly downgraded away from biometric; cleared
    /// only by a full reset.
    pub biometric_downgraded: bool,
    next_tag: RequestTag,
    pending_tag: Option<RequestTag>,
}

impl IdentifyContext {
    fn issue_tag(&mut self) -> RequestTag {
        self.next_tag += 1;
        self.pending_tag = Some(self.next_tag);
        self.next_tag
    }

    /// Whether a response tag matches the latest outstanding request.
    fn accepts(&self, tag: RequestTag) -> bool {
        self.pending_tag == Some(tag)
    }

    fn settle(&mut self, tag: RequestTag) {
        if self.pending_tag == Some(tag) {
            self.pending_tag = None;
        }
    }
}

/// The identify state machine.
pub struct IdentifyMachine {
    state: IdentifyState,
    context: IdentifyContext,
    config: PlaybookConfig,
}

impl IdentifyMachine {
    /// Build a machine, validating the playbook and routing out of `init`.
    ///
    /// Returns the machine together with any immediate actions (a bootstrap
    /// lookup when a candidate identifier was supplied by the caller).
    pub fn new(
        config: PlaybookConfig,
        table: &CdoTable,
        bootstrap: Option<Identifier>,
    ) -> (Self, Vec<IdentifyAction>) {
        let mut machine = Self {
            state: IdentifyState::Init,
            context: IdentifyContext::default(),
            config,
        };
        let actions = machine.route_from_init(table, bootstrap);
        (machine, actions)
    }

    pub fn state(&self) -> &IdentifyState {
        &self.state
    }

    pub fn context(&self) -> &IdentifyContext {
        &self.context
    }

    pub fn success(&self) -> Option<&IdentifySuccess> {
        match &self.state {
            IdentifyState::Success { outcome } => Some(outcome),
            _ => None,
        }
    }

    fn route_from_init(
        &mut self,
        table: &CdoTable,
        bootstrap: Option<Identifier>,
    ) -> Vec<IdentifyAction> {
        if let Err(error) = self.config.validate(table) {
            tracing::warn!(playbook = %self.config.key, %error, "playbook rejected");
            self.state = IdentifyState::ConfigInvalid { error };
            return vec![];
        }
        if let Some(outcome) = self.config.sandbox_outcome {
            self.state = IdentifyState::SandboxOutcome { outcome };
            return vec![];
        }
        match bootstrap {
            Some(identifier) => {
                self.state = IdentifyState::InitBootstrap;
                let tag = self.context.issue_tag();
                self.context.identifier = Some(identifier.clone());
                vec![IdentifyAction::LookupIdentifier { tag, identifier }]
            }
            None => {
                self.state = IdentifyState::EmailIdentification;
                vec![]
            }
        }
    }

    /// Process one event to completion and return follow-up actions.
    ///
    /// Events that are not valid in the current state are ignored with a
    /// log line; terminal states absorb everything unchanged.
    pub fn handle(&mut self, event: IdentifyEvent) -> Vec<IdentifyAction> {
        if self.state.is_terminal() {
            tracing::debug!(
                state = self.state.name(),
                event = event.name(),
                "event ignored in terminal state"
            );
            return vec![];
        }

        let from = self.state.name();
        let actions = self.transition(event);
        if self.state.name() != from {
            tracing::info!(from, to = self.state.name(), "identify transition");
        }
        actions
    }

    fn transition(&mut self, event: IdentifyEvent) -> Vec<IdentifyAction> {
        match event {
            IdentifyEvent::IdentifierSubmitted { identifier } => {
                self.on_identifier_submitted(identifier)
            }
            IdentifyEvent::LookupCompleted { tag, lookup } => self.on_lookup_completed(tag, lookup),
            IdentifyEvent::LookupFailed { tag, error } => {
                if self.context.accepts(tag) {
                    self.context.settle(tag);
                    self.context.last_error = Some(IdentifyError::LookupFailed(error));
                }
                vec![]
            }
            IdentifyEvent::ChallengeIssued { tag, issued } => self.on_challenge_issued(tag, issued),
            IdentifyEvent::ChallengeIssueFailed { tag, error } => {
                if self.context.accepts(tag) {
                    self.context.settle(tag);
                    self.context.last_error = Some(IdentifyError::ChallengeIssueFailed(error));
                }
                vec![]
            }
            IdentifyEvent::CodeSubmitted { code, now } => self.on_code_submitted(code, now),
            IdentifyEvent::AssertionProvided { assertion } => self.on_assertion_provided(assertion),
            IdentifyEvent::ChallengeVerified { tag, auth } => self.on_challenge_verified(tag, auth),
            IdentifyEvent::ChallengeFailed { tag, error } => {
                if self.context.accepts(tag) {
                    self.context.settle(tag);
                    self.context.last_error = Some(IdentifyError::VerificationFailed(error));
                }
                vec![]
            }
            IdentifyEvent::ChallengeExpired { tag } => {
                if self.context.accepts(tag) {
                    self.context.settle(tag);
                    if let Some(challenge) = &mut self.context.challenge {
                        challenge.state = ChallengeState::Expired;
                    }
                    self.context.last_error = Some(IdentifyError::ChallengeExpired);
                }
                vec![]
            }
            IdentifyEvent::ResendRequested { now } => self.on_resend_requested(now),
            IdentifyEvent::ChangeChallengeToSms => self.on_change_to_sms(),
            IdentifyEvent::IdentifyReset => self.on_reset(),
        }
    }

    fn on_identifier_submitted(&mut self, identifier: Identifier) -> Vec<IdentifyAction> {
        match self.state {
            IdentifyState::InitBootstrap
            | IdentifyState::EmailIdentification
            | IdentifyState::PhoneIdentification => {
                self.state = match identifier.kind {
                    IdentifierKind::Email => IdentifyState::EmailIdentification,
                    IdentifierKind::PhoneNumber => IdentifyState::PhoneIdentification,
                };
                self.context.last_error = None;
                self.context.identifier = Some(identifier.clone());
                let tag = self.context.issue_tag();
                vec![IdentifyAction::LookupIdentifier { tag, identifier }]
            }
            _ => self.ignore("identifier_submitted"),
        }
    }

    fn on_lookup_completed(
        &mut self,
        tag: RequestTag,
        lookup: IdentifierLookup,
    ) -> Vec<IdentifyAction> {
        if !self.context.accepts(tag) {
            tracing::debug!(tag, "stale lookup response discarded");
            return vec![];
        }
        if !matches!(
            self.state,
            IdentifyState::InitBootstrap
                | IdentifyState::EmailIdentification
                | IdentifyState::PhoneIdentification
        ) {
            return self.ignore("lookup_completed");
        }
        self.context.settle(tag);
        self.context.account_found = Some(lookup.account_found);
        self.context.available_challenge_kinds = lookup.available_challenge_kinds;
        self.context.has_syncable_passkey = lookup.has_syncable_passkey;
        self.context.last_error = None;

        let Some(kind) = self.select_challenge_kind() else {
            tracing::warn!("no usable challenge kind for identifier");
            self.context.last_error = Some(IdentifyError::ChallengeIssueFailed(
                "no challenge kind available".to_string(),
            ));
            return vec![];
        };
        self.enter_challenge(kind)
    }

    /// Kind selection: biometric when a syncable passkey exists and the
    /// account offers it, else sms, else email. For signup (no account, so
    /// no offered kinds) fall back to the identifier's own channel.
    fn select_challenge_kind(&self) -> Option<ChallengeKind> {
        let available = &self.context.available_challenge_kinds;
        if !available.is_empty() {
            if self.context.has_syncable_passkey
                && !self.context.biometric_downgraded
                && available.contains(&ChallengeKind::Biometric)
            {
                return Some(ChallengeKind::Biometric);
            }
            if available.contains(&ChallengeKind::Sms) {
                return Some(ChallengeKind::Sms);
            }
            if available.contains(&ChallengeKind::Email) {
                return Some(ChallengeKind::Email);
            }
            return None;
        }
        // Signup: the account does not exist yet, challenge the submitted
        // channel and let verification create the account.
        self.context
            .identifier
            .as_ref()
            .map(|identifier| match identifier.kind {
                IdentifierKind::Email => ChallengeKind::Email,
                IdentifierKind::PhoneNumber => ChallengeKind::Sms,
            })
    }

    fn enter_challenge(&mut self, kind: ChallengeKind) -> Vec<IdentifyAction> {
        let Some(identifier) = self.context.identifier.clone() else {
            return self.ignore("enter_challenge");
        };
        self.state = match kind {
            ChallengeKind::Sms => IdentifyState::SmsChallenge,
            ChallengeKind::Email => IdentifyState::EmailChallenge,
            ChallengeKind::Biometric => IdentifyState::BiometricChallenge,
        };
        self.context.challenge = None;
        let tag = self.context.issue_tag();
        vec![IdentifyAction::IssueChallenge {
            tag,
            kind,
            identifier,
        }]
    }

    fn on_challenge_issued(&mut self, tag: RequestTag, issued: ChallengeIssued) -> Vec<IdentifyAction> {
        if !self.context.accepts(tag) {
            tracing::debug!(tag, "stale challenge issue discarded");
            return vec![];
        }
        let Some(kind) = self.state.challenge_kind() else {
            return self.ignore("challenge_issued");
        };
        self.context.settle(tag);
        self.context.last_error = None;
        self.context.challenge = Some(Challenge {
            id: issued.challenge_id,
            kind,
            state: ChallengeState::Issued,
            scrubbed_destination: issued.scrubbed_destination,
            expires_at: issued.expires_at,
            resend_disabled_until: issued.resend_disabled_until,
        });
        vec![]
    }

    fn on_code_submitted(&mut self, code: String, now: DateTime<Utc>) -> Vec<IdentifyAction> {
        if !matches!(
            self.state,
            IdentifyState::SmsChallenge | IdentifyState::EmailChallenge
        ) {
            return self.ignore("code_submitted");
        }
        let Some(challenge) = self.context.challenge.clone() else {
            return self.ignore("code_submitted_without_challenge");
        };
        if challenge.is_expired(now) {
            self.context.last_error = Some(IdentifyError::ChallengeExpired);
            return vec![];
        }
        self.context.last_error = None;
        let tag = self.context.issue_tag();
        vec![IdentifyAction::VerifyChallenge {
            tag,
            challenge_id: challenge.id,
            answer: ChallengeAnswer::Code(code),
        }]
    }

    fn on_assertion_provided(&mut self, assertion: String) -> Vec<IdentifyAction> {
        if self.state != IdentifyState::BiometricChallenge {
            return self.ignore("assertion_provided");
        }
        let Some(challenge) = self.context.challenge.clone() else {
            return self.ignore("assertion_without_challenge");
        };
        self.context.last_error = None;
        let tag = self.context.issue_tag();
        vec![IdentifyAction::VerifyChallenge {
            tag,
            challenge_id: challenge.id,
            answer: ChallengeAnswer::Assertion(assertion),
        }]
    }

    fn on_challenge_verified(&mut self, tag: RequestTag, auth: VerifiedAuth) -> Vec<IdentifyAction> {
        if !self.context.accepts(tag) {
            tracing::debug!(tag, "stale verification discarded");
            return vec![];
        }
        if self.state.challenge_kind().is_none() {
            return self.ignore("challenge_verified");
        }
        self.context.settle(tag);
        if let Some(challenge) = &mut self.context.challenge {
            challenge.state = ChallengeState::Verified;
        }
        let identifier = self.context.identifier.as_ref();
        let outcome = IdentifySuccess {
            auth_token: auth.auth_token,
            user_found: self.context.account_found.unwrap_or(false),
            email: identifier
                .filter(|i| i.kind == IdentifierKind::Email)
                .map(|i| i.value.clone()),
            phone_number: identifier
                .filter(|i| i.kind == IdentifierKind::PhoneNumber)
                .map(|i| i.value.clone()),
            id_doc_outcome: None,
        };
        self.state = IdentifyState::Success { outcome };
        vec![]
    }

    fn on_resend_requested(&mut self, now: DateTime<Utc>) -> Vec<IdentifyAction> {
        if !matches!(
            self.state,
            IdentifyState::SmsChallenge | IdentifyState::EmailChallenge
        ) {
            return self.ignore("resend_requested");
        }
        let Some(challenge) = &self.context.challenge else {
            return self.ignore("resend_without_challenge");
        };
        if !challenge.can_resend(now) {
            self.context.last_error = Some(IdentifyError::ResendThrottled {
                until: challenge.resend_disabled_until,
            });
            return vec![];
        }
        let kind = challenge.kind;
        let Some(identifier) = self.context.identifier.clone() else {
            return self.ignore("resend_without_identifier");
        };
        self.context.last_error = None;
        let tag = self.context.issue_tag();
        vec![IdentifyAction::IssueChallenge {
            tag,
            kind,
            identifier,
        }]
    }

    /// Explicit downgrade to SMS. The only exit from a biometric challenge
    /// on an incapable device; strictly a downgrade, so the event is refused
    /// from every other challenge state. Biometric is never re-offered until
    /// a full reset.
    fn on_change_to_sms(&mut self) -> Vec<IdentifyAction> {
        match self.state {
            IdentifyState::SmsChallenge => vec![],
            IdentifyState::BiometricChallenge => {
                if !self.sms_allowed() {
                    tracing::warn!("sms challenge not available for this account");
                    return vec![];
                }
                self.context.biometric_downgraded = true;
                self.context.last_error = None;
                self.enter_challenge(ChallengeKind::Sms)
            }
            _ => self.ignore("change_challenge_to_sms"),
        }
    }

    /// The offered kind must stay a subset of what lookup returned; for
    /// signup the identifier's own channel is the only one that exists.
    fn sms_allowed(&self) -> bool {
        if self
            .context
            .available_challenge_kinds
            .contains(&ChallengeKind::Sms)
        {
            return true;
        }
        self.context.account_found == Some(false)
            && self
                .context
                .identifier
                .as_ref()
                .is_some_and(|i| i.kind == IdentifierKind::PhoneNumber)
    }

    /// Reset to the identification entry point, discarding in-flight
    /// request results. Valid only from non-terminal states (the caller
    /// never reaches here otherwise, terminal states absorb events).
    fn on_reset(&mut self) -> Vec<IdentifyAction> {
        let next_tag = self.context.next_tag;
        self.context = IdentifyContext {
            // Keep the counter monotonic so any response still in flight
            // can never match a future tag.
            next_tag,
            ..IdentifyContext::default()
        };
        self.state = IdentifyState::EmailIdentification;
        vec![]
    }

    fn ignore(&self, event: &str) -> Vec<IdentifyAction> {
        tracing::debug!(state = self.state.name(), event, "event not valid here, ignored");
        vec![]
    }
}

/// Async driver owning an [`IdentifyMachine`] and its backend collaborator.
///
/// Executes machine actions one at a time; the machine never sees a second
/// event while one is being processed.
pub struct IdentifySession {
    backend: Arc<dyn OnboardingBackend>,
    machine: IdentifyMachine,
}

impl IdentifySession {
    /// Start a session, running any bootstrap lookup to completion.
    pub async fn start(
        backend: Arc<dyn OnboardingBackend>,
        config: PlaybookConfig,
        table: &CdoTable,
        bootstrap: Option<Identifier>,
    ) -> Self {
        let (machine, actions) = IdentifyMachine::new(config, table, bootstrap);
        let mut session = Self { backend, machine };
        session.dispatch(actions).await;
        session
    }

    pub fn state(&self) -> &IdentifyState {
        self.machine.state()
    }

    pub fn context(&self) -> &IdentifyContext {
        self.machine.context()
    }

    pub fn success(&self) -> Option<&IdentifySuccess> {
        self.machine.success()
    }

    pub async fn submit_identifier(&mut self, identifier: Identifier) {
        let actions = self
            .machine
            .handle(IdentifyEvent::IdentifierSubmitted { identifier });
        self.dispatch(actions).await;
    }

    pub async fn submit_code(&mut self, code: impl Into<String>) {
        let actions = self.machine.handle(IdentifyEvent::CodeSubmitted {
            code: code.into(),
            now: Utc::now(),
        });
        self.dispatch(actions).await;
    }

    pub async fn submit_assertion(&mut self, assertion: impl Into<String>) {
        let actions = self.machine.handle(IdentifyEvent::AssertionProvided {
            assertion: assertion.into(),
        });
        self.dispatch(actions).await;
    }

    pub async fn request_resend(&mut self) {
        let actions = self
            .machine
            .handle(IdentifyEvent::ResendRequested { now: Utc::now() });
        self.dispatch(actions).await;
    }

    pub async fn change_to_sms(&mut self) {
        let actions = self.machine.handle(IdentifyEvent::ChangeChallengeToSms);
        self.dispatch(actions).await;
    }

    pub fn reset(&mut self) {
        self.machine.handle(IdentifyEvent::IdentifyReset);
    }

    /// Execute actions, feeding each response back as an event. Collaborator
    /// failures are translated to the nearest recoverable event; they never
    /// cross this boundary as errors.
    async fn dispatch(&mut self, actions: Vec<IdentifyAction>) {
        let mut queue = actions;
        while !queue.is_empty() {
            let mut next = Vec::new();
            for action in queue {
                let event = self.execute(action).await;
                next.extend(self.machine.handle(event));
            }
            queue = next;
        }
    }

    async fn execute(&self, action: IdentifyAction) -> IdentifyEvent {
        match action {
            IdentifyAction::LookupIdentifier { tag, identifier } => {
                match self.backend.lookup_identifier(&identifier).await {
                    Ok(lookup) => IdentifyEvent::LookupCompleted { tag, lookup },
                    Err(error) => IdentifyEvent::LookupFailed {
                        tag,
                        error: error.to_string(),
                    },
                }
            }
            IdentifyAction::IssueChallenge {
                tag,
                kind,
                identifier,
            } => match self.backend.issue_challenge(kind, &identifier).await {
                Ok(issued) => IdentifyEvent::ChallengeIssued { tag, issued },
                Err(error) => IdentifyEvent::ChallengeIssueFailed {
                    tag,
                    error: error.to_string(),
                },
            },
            IdentifyAction::VerifyChallenge {
                tag,
                challenge_id,
                answer,
            } => match self.backend.verify_challenge(&challenge_id, &answer).await {
                Ok(auth) => IdentifyEvent::ChallengeVerified { tag, auth },
                Err(BackendError::Expired(_)) => IdentifyEvent::ChallengeExpired { tag },
                Err(error) => IdentifyEvent::ChallengeFailed {
                    tag,
                    error: error.to_string(),
                },
            },
        }
    }
}
