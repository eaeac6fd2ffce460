//! Device-to-phone handoff coordination.
//!
//! Two independent runtimes share this machine shape: the initiating device
//! and the companion device. They never share memory; the only channel
//! between them is the server-mediated status that a polling collaborator
//! delivers as `StatusReceived` events.

use std::sync::Arc;

use crate::dtos::{HandoffPoll, HandoffPollStatus};
use crate::models::{
    AuthToken, CompanionDeviceType, HandoffSession, HandoffStatus, ScopedAuthToken, TokenPurpose,
};
use crate::services::client::OnboardingBackend;
use crate::services::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum D2pState {
    Init,
    Requirements,
    Completed,
    Canceled,
    Expired,
    Error,
}

impl D2pState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            D2pState::Completed | D2pState::Canceled | D2pState::Expired | D2pState::Error
        )
    }

    fn name(&self) -> &'static str {
        match self {
            D2pState::Init => "init",
            D2pState::Requirements => "requirements",
            D2pState::Completed => "completed",
            D2pState::Canceled => "canceled",
            D2pState::Expired => "expired",
            D2pState::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub enum D2pEvent {
    /// Companion session bootstrap finished (token minted or consumed).
    InitCompleted,
    InitFailed,
    /// The companion device finished its local requirement loop.
    RequirementsCompleted,
    /// One poll result from the status channel.
    StatusReceived(HandoffPoll),
}

/// Pure coordinator for one side of a handoff.
///
/// Terminal transitions are irreversible: once completed, canceled or
/// expired, every further event is a no-op, so repeated terminal polls
/// never re-trigger side effects.
#[derive(Debug, Clone)]
pub struct D2pCoordinator {
    state: D2pState,
}

impl Default for D2pCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl D2pCoordinator {
    pub fn new() -> Self {
        Self {
            state: D2pState::Init,
        }
    }

    pub fn state(&self) -> D2pState {
        self.state
    }

    /// Process one event. Returns the new state when the event caused a
    /// transition, `None` when it was a no-op.
    pub fn handle(&mut self, event: D2pEvent) -> Option<D2pState> {
        if self.state.is_terminal() {
            return None;
        }

        let next = match (&self.state, &event) {
            // The status channel is the source of truth and overrides local
            // transition history, in fixed priority order.
            (_, D2pEvent::StatusReceived(poll)) => {
                if poll.is_error {
                    Some(D2pState::Expired)
                } else {
                    match poll.status {
                        HandoffPollStatus::Canceled => Some(D2pState::Canceled),
                        HandoffPollStatus::Completed | HandoffPollStatus::Failed => {
                            Some(D2pState::Completed)
                        }
                        HandoffPollStatus::InProgress => None,
                    }
                }
            }
            (D2pState::Init, D2pEvent::InitCompleted) => Some(D2pState::Requirements),
            (D2pState::Init, D2pEvent::InitFailed) => Some(D2pState::Error),
            (D2pState::Requirements, D2pEvent::RequirementsCompleted) => Some(D2pState::Completed),
            _ => None,
        };

        if let Some(next) = next {
            if next != self.state {
                tracing::info!(from = self.state.name(), to = next.name(), "d2p transition");
                self.state = next;
                return Some(next);
            }
        }
        None
    }
}

/// Initiating-device driver: mints the scoped token, owns the session
/// record, and feeds poll results into the coordinator.
pub struct D2pInitiator {
    backend: Arc<dyn OnboardingBackend>,
    coordinator: D2pCoordinator,
    session: Option<HandoffSession>,
}

impl D2pInitiator {
    pub fn new(backend: Arc<dyn OnboardingBackend>) -> Self {
        Self {
            backend,
            coordinator: D2pCoordinator::new(),
            session: None,
        }
    }

    pub fn state(&self) -> D2pState {
        self.coordinator.state()
    }

    pub fn session(&self) -> Option<&HandoffSession> {
        self.session.as_ref()
    }

    /// Mint the scoped token and open the companion session. On failure the
    /// coordinator lands in `Error` and the error is returned.
    pub async fn begin(
        &mut self,
        auth_token: &AuthToken,
        companion: CompanionDeviceType,
    ) -> Result<&ScopedAuthToken, ServiceError> {
        match self
            .backend
            .generate_scoped_token(auth_token, TokenPurpose::Handoff)
            .await
        {
            Ok(scoped) => {
                let mut session = HandoffSession::new(scoped, companion);
                tracing::info!(session_id = %session.id, "handoff session opened");
                self.coordinator.handle(D2pEvent::InitCompleted);
                session.status = HandoffStatus::Requirements;
                let session = self.session.insert(session);
                Ok(&session.scoped_auth_token)
            }
            Err(error) => {
                self.coordinator.handle(D2pEvent::InitFailed);
                Err(ServiceError::HandoffBootstrap(error.to_string()))
            }
        }
    }

    /// Deliver one poll result. Returns the terminal state once reached so
    /// the polling collaborator knows to stop.
    pub fn on_status(&mut self, poll: HandoffPoll) -> Option<D2pState> {
        let transition = self.coordinator.handle(D2pEvent::StatusReceived(poll));
        if let Some(state) = transition {
            if state.is_terminal() {
                if let Some(session) = &mut self.session {
                    session.status = match state {
                        D2pState::Completed => HandoffStatus::Completed,
                        D2pState::Canceled => HandoffStatus::Canceled,
                        D2pState::Expired => HandoffStatus::Expired,
                        _ => HandoffStatus::Error,
                    };
                }
            }
        }
        let state = self.coordinator.state();
        state.is_terminal().then_some(state)
    }

    /// Poll once through the backend and deliver the result.
    pub async fn poll_once(&mut self) -> Result<Option<D2pState>, ServiceError> {
        let Some(session) = &self.session else {
            return Err(ServiceError::HandoffBootstrap(
                "poll before begin".to_string(),
            ));
        };
        if self.coordinator.state().is_terminal() {
            return Ok(Some(self.coordinator.state()));
        }
        let poll = self
            .backend
            .poll_handoff_status(&session.scoped_auth_token)
            .await?;
        Ok(self.on_status(poll))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(status: HandoffPollStatus, is_error: bool) -> D2pEvent {
        D2pEvent::StatusReceived(HandoffPoll { status, is_error })
    }

    #[test]
    fn test_happy_path() {
        let mut c = D2pCoordinator::new();
        assert_eq!(c.handle(D2pEvent::InitCompleted), Some(D2pState::Requirements));
        assert_eq!(
            c.handle(D2pEvent::RequirementsCompleted),
            Some(D2pState::Completed)
        );
    }

    #[test]
    fn test_init_failure() {
        let mut c = D2pCoordinator::new();
        assert_eq!(c.handle(D2pEvent::InitFailed), Some(D2pState::Error));
    }

    #[test]
    fn test_error_flag_wins_over_status() {
        let mut c = D2pCoordinator::new();
        c.handle(D2pEvent::InitCompleted);
        assert_eq!(
            c.handle(poll(HandoffPollStatus::Completed, true)),
            Some(D2pState::Expired)
        );
    }

    #[test]
    fn test_status_overrides_any_nonterminal_state() {
        // Still in init, never saw init_completed.
        let mut c = D2pCoordinator::new();
        assert_eq!(
            c.handle(poll(HandoffPollStatus::Canceled, false)),
            Some(D2pState::Canceled)
        );
    }

    #[test]
    fn test_failed_status_maps_to_completed() {
        let mut c = D2pCoordinator::new();
        c.handle(D2pEvent::InitCompleted);
        assert_eq!(
            c.handle(poll(HandoffPollStatus::Failed, false)),
            Some(D2pState::Completed)
        );
    }

    #[test]
    fn test_in_progress_is_noop() {
        let mut c = D2pCoordinator::new();
        c.handle(D2pEvent::InitCompleted);
        assert_eq!(c.handle(poll(HandoffPollStatus::InProgress, false)), None);
        assert_eq!(c.state(), D2pState::Requirements);
    }

    #[test]
    fn test_terminal_states_absorb_everything() {
        let mut c = D2pCoordinator::new();
        c.handle(D2pEvent::InitCompleted);
        c.handle(poll(HandoffPollStatus::Canceled, false));
        assert_eq!(c.state(), D2pState::Canceled);

        // Repeated and conflicting terminal statuses are no-ops.
        assert_eq!(c.handle(poll(HandoffPollStatus::Canceled, false)), None);
        assert_eq!(c.handle(poll(HandoffPollStatus::Completed, false)), None);
        assert_eq!(c.handle(D2pEvent::RequirementsCompleted), None);
        assert_eq!(c.state(), D2pState::Canceled);
    }

    #[test]
    fn test_expired_and_canceled_stay_distinguishable() {
        let mut expired = D2pCoordinator::new();
        expired.handle(poll(HandoffPollStatus::InProgress, true));
        let mut canceled = D2pCoordinator::new();
        canceled.handle(poll(HandoffPollStatus::Canceled, false));
        assert_ne!(expired.state(), canceled.state());
    }
}
