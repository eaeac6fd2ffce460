//! Requirement model - one unit of outstanding onboarding work.

use serde::{Deserialize, Serialize};

use super::data_identifier::{CollectedDataOption, DataIdentifier};
use super::snapshot::VaultSnapshot;

/// Kind of onboarding work a requirement represents.
///
/// Data-collection kinds carry the collected-data option they cover so
/// downstream flows stay keyed by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    CollectData(CollectedDataOption),
    CollectDocument,
    Liveness,
    RegisterAuthMethod,
    CollectBusinessData(CollectedDataOption),
}

impl RequirementKind {
    /// Fixed flow priority: identity/basic data, then address, then
    /// document and liveness, then authentication method, then business
    /// data. Ties within a band are broken by playbook declaration order.
    pub fn priority(&self) -> u8 {
        match self {
            RequirementKind::CollectData(CollectedDataOption::FullAddress) => 1,
            RequirementKind::CollectData(_) => 0,
            RequirementKind::CollectDocument => 2,
            RequirementKind::Liveness => 3,
            RequirementKind::RegisterAuthMethod => 4,
            RequirementKind::CollectBusinessData(_) => 5,
        }
    }
}

impl std::fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequirementKind::CollectData(cdo) => write!(f, "collect_data({})", cdo),
            RequirementKind::CollectDocument => f.write_str("collect_document"),
            RequirementKind::Liveness => f.write_str("liveness"),
            RequirementKind::RegisterAuthMethod => f.write_str("register_auth_method"),
            RequirementKind::CollectBusinessData(cdo) => {
                write!(f, "collect_business_data({})", cdo)
            }
        }
    }
}

/// One unit of outstanding onboarding work, with its attribute partition.
///
/// The three partitions are pairwise disjoint and together equal the full
/// expansion of the requirement's category. Task-style requirements
/// (document, liveness, auth method) have empty partitions and are judged
/// by their snapshot side condition instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub missing_attributes: Vec<DataIdentifier>,
    pub optional_attributes: Vec<DataIdentifier>,
    pub populated_attributes: Vec<DataIdentifier>,
}

impl Requirement {
    /// Whether this requirement is satisfied, computed against the
    /// snapshot. Never stored: requirements are recomputed wholesale after
    /// every mutation.
    pub fn is_met(&self, snapshot: &VaultSnapshot) -> bool {
        if !self.missing_attributes.is_empty() {
            return false;
        }
        match self.kind {
            RequirementKind::CollectData(_) | RequirementKind::CollectBusinessData(_) => true,
            RequirementKind::CollectDocument => snapshot.document_uploaded,
            RequirementKind::Liveness => snapshot.liveness_completed,
            RequirementKind::RegisterAuthMethod => snapshot.auth_method_registered,
        }
    }
}
