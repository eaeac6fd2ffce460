//! Handoff session model - cross-device delegation of an onboarding step.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token::ScopedAuthToken;

/// Lifecycle status of a handoff session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Init,
    Requirements,
    Completed,
    Canceled,
    Expired,
    Error,
}

impl HandoffStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandoffStatus::Completed
                | HandoffStatus::Canceled
                | HandoffStatus::Expired
                | HandoffStatus::Error
        )
    }
}

/// Device class running the companion side of a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanionDeviceType {
    Mobile,
    Desktop,
}

/// A live cross-device handoff, destroyed once it reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffSession {
    pub id: Uuid,
    pub scoped_auth_token: ScopedAuthToken,
    pub status: HandoffStatus,
    pub companion_device_type: CompanionDeviceType,
}

impl HandoffSession {
    pub fn new(scoped_auth_token: ScopedAuthToken, companion_device_type: CompanionDeviceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            scoped_auth_token,
            status: HandoffStatus::Init,
            companion_device_type,
        }
    }
}
