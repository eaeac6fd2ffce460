pub mod challenge;
pub mod data_identifier;
pub mod handoff;
pub mod identifier;
pub mod requirement;
pub mod snapshot;
pub mod token;

pub use challenge::{Challenge, ChallengeKind, ChallengeState};
pub use data_identifier::{CdoTable, CollectedDataOption, DataIdentifier};
pub use handoff::{CompanionDeviceType, HandoffSession, HandoffStatus};
pub use identifier::{Identifier, IdentifierKind, InvalidIdentifier};
pub use requirement::{Requirement, RequirementKind};
pub use snapshot::VaultSnapshot;
pub use token::{AuthToken, ScopedAuthToken, TokenPurpose};
