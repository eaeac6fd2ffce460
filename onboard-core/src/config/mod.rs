//! Playbook configuration - the tenant policy driving an onboarding session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::models::{CdoTable, CollectedDataOption, DataIdentifier};

/// Fatal configuration problems. No retry path: the session routes to a
/// terminal invalid-config state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("playbook key is empty")]
    EmptyKey,
    #[error("playbook '{0}' is disabled")]
    Disabled(String),
    #[error("playbook '{key}' declares {option} more than once")]
    DuplicateOption {
        key: String,
        option: CollectedDataOption,
    },
    #[error("playbook '{key}' marks {attribute} optional but no declared option collects it")]
    OptionalOutsideExpansion {
        key: String,
        attribute: DataIdentifier,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybookStatus {
    Active,
    Disabled,
}

/// Forced terminal outcome for sandbox tenants, bypassing real verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxOutcome {
    Pass,
    Fail,
    ManualReview,
    StepUp,
    DocumentDecision,
}

/// Tenant policy for one onboarding playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookConfig {
    pub key: String,
    pub name: String,
    pub status: PlaybookStatus,
    /// Data categories the tenant requires, in declaration order.
    pub must_collect: Vec<CollectedDataOption>,
    /// Attributes the user may skip even when their category is declared.
    #[serde(default)]
    pub optional_attributes: Vec<DataIdentifier>,
    #[serde(default)]
    pub collect_document: bool,
    #[serde(default)]
    pub require_liveness: bool,
    /// Present only on sandbox tenants.
    #[serde(default)]
    pub sandbox_outcome: Option<SandboxOutcome>,
}

impl PlaybookConfig {
    /// Validate the playbook before driving any flow from it.
    pub fn validate(&self, table: &CdoTable) -> Result<(), ConfigError> {
        if self.key.trim().is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        if self.status == PlaybookStatus::Disabled {
            return Err(ConfigError::Disabled(self.key.clone()));
        }

        let mut seen = BTreeSet::new();
        for option in &self.must_collect {
            if !seen.insert(*option) {
                return Err(ConfigError::DuplicateOption {
                    key: self.key.clone(),
                    option: *option,
                });
            }
        }

        let expansion: BTreeSet<DataIdentifier> = self
            .must_collect
            .iter()
            .flat_map(|option| table.expand(*option).iter().copied())
            .collect();
        for attribute in &self.optional_attributes {
            if !expansion.contains(attribute) {
                return Err(ConfigError::OptionalOutsideExpansion {
                    key: self.key.clone(),
                    attribute: *attribute,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playbook() -> PlaybookConfig {
        PlaybookConfig {
            key: "pb_live_1".to_string(),
            name: "KYC".to_string(),
            status: PlaybookStatus::Active,
            must_collect: vec![CollectedDataOption::Basic, CollectedDataOption::FullAddress],
            optional_attributes: vec![DataIdentifier::AddressLine2],
            collect_document: false,
            require_liveness: false,
            sandbox_outcome: None,
        }
    }

    #[test]
    fn test_valid_playbook() {
        assert!(playbook().validate(&CdoTable::standard()).is_ok());
    }

    #[test]
    fn test_disabled_playbook_is_fatal() {
        let mut config = playbook();
        config.status = PlaybookStatus::Disabled;
        assert_eq!(
            config.validate(&CdoTable::standard()),
            Err(ConfigError::Disabled("pb_live_1".to_string()))
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut config = playbook();
        config.key = "  ".to_string();
        assert_eq!(
            config.validate(&CdoTable::standard()),
            Err(ConfigError::EmptyKey)
        );
    }

    #[test]
    fn test_duplicate_option_rejected() {
        let mut config = playbook();
        config.must_collect.push(CollectedDataOption::Basic);
        assert!(matches!(
            config.validate(&CdoTable::standard()),
            Err(ConfigError::DuplicateOption { .. })
        ));
    }

    #[test]
    fn test_optional_outside_expansion_rejected() {
        let mut config = playbook();
        config.optional_attributes.push(DataIdentifier::Ssn9);
        assert!(matches!(
            config.validate(&CdoTable::standard()),
            Err(ConfigError::OptionalOutsideExpansion { .. })
        ));
    }
}
