//! Onboarding orchestrator - the composition loop.
//!
//! Repeatedly asks the resolver what is left, routes the highest-priority
//! unmet requirement to its owning flow, refreshes the snapshot, and loops
//! until nothing remains. Always re-resolves from a fresh snapshot; never
//! patches a previous requirement list.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::PlaybookConfig;
use crate::models::{AuthToken, CdoTable, Requirement, RequirementKind};
use crate::services::client::OnboardingBackend;
use crate::services::error::ServiceError;
use crate::services::resolver::RequirementResolver;

/// Flow owner for one requirement, implemented by the embedding frontend.
///
/// Each method must drive its flow to completion (vault the data, finish
/// the capture, register the method) before returning; the orchestrator
/// verifies progress against a fresh snapshot afterwards.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Direct collection flow: gather and vault the missing attributes.
    async fn collect_data(&self, requirement: &Requirement) -> Result<(), ServiceError>;

    /// Document capture or liveness. The executor decides whether to run
    /// locally or delegate to a companion device over a D2P handoff.
    async fn run_device_step(&self, requirement: &Requirement) -> Result<(), ServiceError>;

    /// Register an authentication method, driving the identify flow.
    async fn register_auth_method(&self, requirement: &Requirement) -> Result<(), ServiceError>;
}

pub struct Orchestrator {
    backend: Arc<dyn OnboardingBackend>,
    config: PlaybookConfig,
    table: Arc<CdoTable>,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn OnboardingBackend>,
        config: PlaybookConfig,
        table: Arc<CdoTable>,
    ) -> Self {
        Self {
            backend,
            config,
            table,
        }
    }

    /// Drive the session until every requirement is met.
    ///
    /// Tolerates the snapshot changing shape between iterations (fields
    /// collected out of order elsewhere). Fails with [`ServiceError::Stalled`]
    /// when an executor reports success but its requirement stays unmet,
    /// instead of looping forever.
    pub async fn run(
        &self,
        auth_token: &AuthToken,
        executor: &dyn StepExecutor,
    ) -> Result<(), ServiceError> {
        let resolver = RequirementResolver::new(&self.table);
        let mut last_attempted: Option<(RequirementKind, crate::models::VaultSnapshot)> = None;

        loop {
            let status = self.backend.get_onboarding_status(auth_token).await?;
            let requirements = resolver.resolve(&self.config, &status.snapshot);

            let Some(next) = requirements.iter().find(|r| !r.is_met(&status.snapshot)) else {
                tracing::info!(playbook = %self.config.key, "onboarding complete");
                return Ok(());
            };

            // A step that "succeeded" without moving the snapshot would
            // otherwise spin here forever.
            if last_attempted
                .as_ref()
                .is_some_and(|(kind, snapshot)| *kind == next.kind && *snapshot == status.snapshot)
            {
                return Err(ServiceError::Stalled(next.kind.to_string()));
            }
            last_attempted = Some((next.kind, status.snapshot.clone()));

            tracing::info!(requirement = %next.kind, "driving next requirement");
            match next.kind {
                RequirementKind::CollectData(_) | RequirementKind::CollectBusinessData(_) => {
                    executor.collect_data(next).await?
                }
                RequirementKind::CollectDocument | RequirementKind::Liveness => {
                    executor.run_device_step(next).await?
                }
                RequirementKind::RegisterAuthMethod => {
                    executor.register_auth_method(next).await?
                }
            }
        }
    }
}
