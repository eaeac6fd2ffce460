use thiserror::Error;

use crate::config::ConfigError;
use crate::services::client::BackendError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("handoff bootstrap failed: {0}")]
    HandoffBootstrap(String),

    #[error("requirement {0} did not become met after its step completed")]
    Stalled(String),

    #[error("step execution failed: {0}")]
    Step(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
