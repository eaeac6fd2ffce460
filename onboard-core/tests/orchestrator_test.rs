//! Orchestrator loop tests with a scripted step executor.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use common::{kyc_playbook, MockBackend};
use onboard_core::models::{
    AuthToken, CdoTable, DataIdentifier, Requirement, RequirementKind, VaultSnapshot,
};
use onboard_core::services::{OnboardingBackend, Orchestrator, ServiceError, StepExecutor};

/// Executor that vaults every missing attribute and flips the snapshot
/// flags through the backend, recording the order it was driven in.
struct RecordingExecutor {
    backend: Arc<MockBackend>,
    token: AuthToken,
    driven: Mutex<Vec<RequirementKind>>,
    /// When set, steps report success without doing anything.
    inert: bool,
}

impl RecordingExecutor {
    fn new(backend: Arc<MockBackend>, token: AuthToken) -> Self {
        Self {
            backend,
            token,
            driven: Mutex::new(Vec::new()),
            inert: false,
        }
    }
}

#[async_trait]
impl StepExecutor for RecordingExecutor {
    async fn collect_data(&self, requirement: &Requirement) -> Result<(), ServiceError> {
        self.driven.lock().unwrap().push(requirement.kind);
        if self.inert {
            return Ok(());
        }
        let data: HashMap<DataIdentifier, String> = requirement
            .missing_attributes
            .iter()
            .map(|di| (*di, format!("value for {di}")))
            .collect();
        self.backend.vault_data(&self.token, data).await?;
        Ok(())
    }

    async fn run_device_step(&self, requirement: &Requirement) -> Result<(), ServiceError> {
        self.driven.lock().unwrap().push(requirement.kind);
        if self.inert {
            return Ok(());
        }
        let mut snapshot = self.backend.snapshot.lock().unwrap();
        match requirement.kind {
            RequirementKind::CollectDocument => snapshot.document_uploaded = true,
            RequirementKind::Liveness => snapshot.liveness_completed = true,
            _ => {}
        }
        Ok(())
    }

    async fn register_auth_method(&self, requirement: &Requirement) -> Result<(), ServiceError> {
        self.driven.lock().unwrap().push(requirement.kind);
        if !self.inert {
            self.backend.snapshot.lock().unwrap().auth_method_registered = true;
        }
        Ok(())
    }
}

#[tokio::test]
async fn drives_all_requirements_in_priority_order() {
    let mut config = kyc_playbook();
    config.collect_document = true;
    config.require_liveness = true;

    let backend = Arc::new(MockBackend::default());
    let token = AuthToken::new("tok_1");
    let executor = RecordingExecutor::new(backend.clone(), token.clone());
    let orchestrator = Orchestrator::new(backend, config, Arc::new(CdoTable::standard()));

    orchestrator.run(&token, &executor).await.expect("should finish");

    let driven = executor.driven.lock().unwrap().clone();
    let kinds: Vec<&str> = driven
        .iter()
        .map(|k| match k {
            RequirementKind::CollectData(_) => "data",
            RequirementKind::CollectDocument => "document",
            RequirementKind::Liveness => "liveness",
            RequirementKind::RegisterAuthMethod => "auth",
            RequirementKind::CollectBusinessData(_) => "business",
        })
        .collect();
    assert_eq!(kinds, vec!["data", "data", "document", "liveness", "auth"]);
}

#[tokio::test]
async fn completes_immediately_when_nothing_outstanding() {
    let backend = Arc::new(MockBackend::default());
    {
        let mut snapshot = backend.snapshot.lock().unwrap();
        *snapshot = VaultSnapshot::with_populated([
            DataIdentifier::FirstName,
            DataIdentifier::LastName,
            DataIdentifier::Email,
            DataIdentifier::AddressLine1,
            DataIdentifier::City,
            DataIdentifier::State,
            DataIdentifier::Zip,
            DataIdentifier::Country,
        ]);
        snapshot.auth_method_registered = true;
    }

    let token = AuthToken::new("tok_1");
    let executor = RecordingExecutor::new(backend.clone(), token.clone());
    let orchestrator = Orchestrator::new(backend, kyc_playbook(), Arc::new(CdoTable::standard()));

    orchestrator.run(&token, &executor).await.unwrap();
    assert!(executor.driven.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tolerates_out_of_order_collection() {
    // Address arrives in the vault from elsewhere between iterations; the
    // loop re-resolves instead of trusting its previous plan.
    let backend = Arc::new(MockBackend::default());
    backend
        .snapshot
        .lock()
        .unwrap()
        .populated
        .extend([DataIdentifier::AddressLine1]);

    let token = AuthToken::new("tok_1");
    let executor = RecordingExecutor::new(backend.clone(), token.clone());
    let orchestrator = Orchestrator::new(backend, kyc_playbook(), Arc::new(CdoTable::standard()));

    orchestrator.run(&token, &executor).await.unwrap();
}

#[tokio::test]
async fn stalled_step_fails_instead_of_spinning() {
    let backend = Arc::new(MockBackend::default());
    let token = AuthToken::new("tok_1");
    let mut executor = RecordingExecutor::new(backend.clone(), token.clone());
    executor.inert = true;
    let orchestrator = Orchestrator::new(backend, kyc_playbook(), Arc::new(CdoTable::standard()));

    let result = orchestrator.run(&token, &executor).await;
    assert!(matches!(result, Err(ServiceError::Stalled(_))));
    // The stalled requirement was attempted once and then refused.
    assert_eq!(executor.driven.lock().unwrap().len(), 1);
}
