//! Vault snapshot - what the backend already knows about a session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::data_identifier::DataIdentifier;

/// Read-only view of the data vault for one onboarding session.
///
/// Owned by the backend collaborator; the orchestrator fetches a fresh copy
/// every iteration instead of mutating a cached one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Attributes with a value in the vault.
    pub populated: BTreeSet<DataIdentifier>,
    /// An identity document image has been uploaded.
    pub document_uploaded: bool,
    /// A liveness capture has been completed.
    pub liveness_completed: bool,
    /// At least one authentication method is registered on the account.
    pub auth_method_registered: bool,
}

impl VaultSnapshot {
    pub fn has(&self, di: DataIdentifier) -> bool {
        self.populated.contains(&di)
    }

    pub fn with_populated(dis: impl IntoIterator<Item = DataIdentifier>) -> Self {
        Self {
            populated: dis.into_iter().collect(),
            ..Self::default()
        }
    }
}
