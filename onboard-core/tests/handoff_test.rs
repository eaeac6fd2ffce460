//! D2P initiator driver tests. Pure coordinator transitions are covered by
//! unit tests next to the machine; these exercise the driver against the
//! mock backend.

mod common;

use std::sync::Arc;

use common::MockBackend;
use onboard_core::dtos::{HandoffPoll, HandoffPollStatus};
use onboard_core::models::{AuthToken, CompanionDeviceType, HandoffStatus, TokenPurpose};
use onboard_core::services::{D2pInitiator, D2pState, ServiceError};

fn poll(status: HandoffPollStatus, is_error: bool) -> HandoffPoll {
    HandoffPoll { status, is_error }
}

#[tokio::test]
async fn begin_mints_scoped_token_and_enters_requirements() {
    let backend = Arc::new(MockBackend::default());
    let mut initiator = D2pInitiator::new(backend);
    let token = initiator
        .begin(&AuthToken::new("tok_1"), CompanionDeviceType::Mobile)
        .await
        .expect("bootstrap should succeed");
    assert_eq!(token.purpose, TokenPurpose::Handoff);
    assert_eq!(initiator.state(), D2pState::Requirements);
    // The session record tracks the coordinator from the first transition.
    assert_eq!(
        initiator.session().map(|s| s.status),
        Some(HandoffStatus::Requirements)
    );
}

#[tokio::test]
async fn begin_failure_lands_in_error() {
    let backend = Arc::new(MockBackend::default());
    *backend.scoped_token_fails.lock().unwrap() = true;
    let mut initiator = D2pInitiator::new(backend);
    let result = initiator
        .begin(&AuthToken::new("tok_1"), CompanionDeviceType::Mobile)
        .await;
    assert!(matches!(result, Err(ServiceError::HandoffBootstrap(_))));
    assert_eq!(initiator.state(), D2pState::Error);
}

#[tokio::test]
async fn polling_to_completion() {
    let backend = Arc::new(MockBackend::default());
    backend.handoff_polls.lock().unwrap().extend([
        poll(HandoffPollStatus::InProgress, false),
        poll(HandoffPollStatus::Completed, false),
    ]);

    let mut initiator = D2pInitiator::new(backend);
    initiator
        .begin(&AuthToken::new("tok_1"), CompanionDeviceType::Mobile)
        .await
        .unwrap();

    assert_eq!(initiator.poll_once().await.unwrap(), None);
    assert_eq!(initiator.poll_once().await.unwrap(), Some(D2pState::Completed));
    assert_eq!(
        initiator.session().map(|s| s.status),
        Some(HandoffStatus::Completed)
    );
}

#[tokio::test]
async fn error_flag_expires_the_handoff_mid_requirements() {
    let backend = Arc::new(MockBackend::default());
    let mut initiator = D2pInitiator::new(backend);
    initiator
        .begin(&AuthToken::new("tok_1"), CompanionDeviceType::Mobile)
        .await
        .unwrap();
    assert_eq!(initiator.state(), D2pState::Requirements);

    let terminal = initiator.on_status(poll(HandoffPollStatus::InProgress, true));
    assert_eq!(terminal, Some(D2pState::Expired));
    assert_eq!(
        initiator.session().map(|s| s.status),
        Some(HandoffStatus::Expired)
    );
}

#[tokio::test]
async fn terminal_status_is_idempotent_for_the_driver() {
    let backend = Arc::new(MockBackend::default());
    let mut initiator = D2pInitiator::new(backend);
    initiator
        .begin(&AuthToken::new("tok_1"), CompanionDeviceType::Mobile)
        .await
        .unwrap();
    initiator.on_status(poll(HandoffPollStatus::Canceled, false));
    assert_eq!(initiator.state(), D2pState::Canceled);

    // Late or repeated polls change nothing; canceled stays canceled.
    initiator.on_status(poll(HandoffPollStatus::Completed, false));
    initiator.on_status(poll(HandoffPollStatus::Canceled, true));
    assert_eq!(initiator.state(), D2pState::Canceled);
    assert_eq!(
        initiator.session().map(|s| s.status),
        Some(HandoffStatus::Canceled)
    );

    // Once terminal, poll_once short-circuits without calling the backend.
    assert_eq!(initiator.poll_once().await.unwrap(), Some(D2pState::Canceled));
}
