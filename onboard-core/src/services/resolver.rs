//! Requirement resolution service.
//!
//! Pure: given a playbook and a vault snapshot, produce the ordered list of
//! outstanding requirements. Identical inputs always yield identical output,
//! so the orchestrator can re-resolve after every mutation and after a
//! reload without the flow jumping around.

use std::collections::BTreeSet;

use crate::config::PlaybookConfig;
use crate::models::{
    CdoTable, CollectedDataOption, DataIdentifier, Requirement, RequirementKind, VaultSnapshot,
};

/// Requirement resolution over an injected expansion table.
#[derive(Debug, Clone)]
pub struct RequirementResolver<'a> {
    table: &'a CdoTable,
}

impl<'a> RequirementResolver<'a> {
    pub fn new(table: &'a CdoTable) -> Self {
        Self { table }
    }

    /// Resolve the full requirement list for one session.
    ///
    /// Requirements are recomputed wholesale; callers must never patch a
    /// previous result in place.
    pub fn resolve(&self, config: &PlaybookConfig, snapshot: &VaultSnapshot) -> Vec<Requirement> {
        let mut requirements = Vec::with_capacity(config.must_collect.len() + 3);

        for (position, option) in config.must_collect.iter().enumerate() {
            let kind = if option.is_business() {
                RequirementKind::CollectBusinessData(*option)
            } else {
                RequirementKind::CollectData(*option)
            };
            requirements.push((position, self.data_requirement(kind, *option, config, snapshot)));
        }

        let task_base = config.must_collect.len();
        if config.collect_document {
            requirements.push((task_base, Self::task(RequirementKind::CollectDocument)));
        }
        if config.require_liveness {
            requirements.push((task_base + 1, Self::task(RequirementKind::Liveness)));
        }
        requirements.push((task_base + 2, Self::task(RequirementKind::RegisterAuthMethod)));

        // Kind priority first, playbook declaration order as tie-break.
        requirements.sort_by_key(|(position, req)| (req.kind.priority(), *position));

        tracing::debug!(
            playbook = %config.key,
            count = requirements.len(),
            "resolved requirements"
        );

        requirements.into_iter().map(|(_, req)| req).collect()
    }

    fn data_requirement(
        &self,
        kind: RequirementKind,
        option: CollectedDataOption,
        config: &PlaybookConfig,
        snapshot: &VaultSnapshot,
    ) -> Requirement {
        let expansion = self.table.expand(option);
        let optional_set: BTreeSet<DataIdentifier> =
            config.optional_attributes.iter().copied().collect();

        let mut missing = Vec::new();
        let mut optional = Vec::new();
        let mut populated = Vec::new();

        // Expansion slices are declared in canonical attribute order, which
        // keeps the partitions sorted without an extra pass.
        for &di in expansion {
            if optional_set.contains(&di) {
                optional.push(di);
            } else if snapshot.has(di) {
                populated.push(di);
            } else {
                missing.push(di);
            }
        }

        Requirement {
            kind,
            missing_attributes: missing,
            optional_attributes: optional,
            populated_attributes: populated,
        }
    }

    fn task(kind: RequirementKind) -> Requirement {
        Requirement {
            kind,
            missing_attributes: vec![],
            optional_attributes: vec![],
            populated_attributes: vec![],
        }
    }
}
