pub mod client;
pub mod error;
pub mod handoff;
pub mod identify;
pub mod orchestrator;
pub mod resolver;

pub use client::{BackendError, OnboardingBackend};
pub use error::ServiceError;
pub use handoff::{D2pCoordinator, D2pEvent, D2pInitiator, D2pState};
pub use identify::{
    IdentifyAction, IdentifyContext, IdentifyError, IdentifyEvent, IdentifyMachine,
    IdentifySession, IdentifyState, IdentifySuccess, RequestTag,
};
pub use orchestrator::{Orchestrator, StepExecutor};
pub use resolver::RequirementResolver;
