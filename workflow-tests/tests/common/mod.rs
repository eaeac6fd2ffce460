//! Common test utilities for workflow integration tests.

#![allow(dead_code)]

use workflow_tests::OnboardingTestContext;

/// Create a workflow test context with logging wired up.
pub fn setup() -> OnboardingTestContext {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
    OnboardingTestContext::new()
}
