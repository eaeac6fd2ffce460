//! onboard-core: Orchestration core for identity-verification onboarding.
//!
//! Decides what a user still has to prove or supply before an onboarding
//! session is complete, drives the multi-channel challenge/response
//! protocol used to authenticate them, and coordinates device-to-phone
//! handoff of steps that must run on a companion device.
//!
//! Rendering, transport and persistence live outside: collaborators
//! implement [`services::OnboardingBackend`] and
//! [`services::StepExecutor`], and this crate produces states for them to
//! render and transition functions for them to call.

pub mod config;
pub mod dtos;
pub mod models;
pub mod services;
pub mod utils;
