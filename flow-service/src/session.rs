//! Participant-side stage session
//!
//! One session exists per stage invocation and is owned exclusively by the
//! stage handler for its duration. It enforces the protocol sequence:
//! immediate acknowledgement before any work, exactly one terminal
//! response, a hard cap on audit entries, and cooperative cancellation
//! once the orchestrator force-finishes the stage.

use crate::error::{ServiceError, ServiceResult};
use parking_lot::Mutex;
use serde::Serialize;
use shared::error::FlowError;
use shared::message::{
    AppMessage, AuditEntry, AuditSeverity, FailurePayload, FlowEvent, MessageType,
    ServiceEventPayload, MAX_AUDIT_ENTRIES,
};
use shared::stage::FlowStage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Result of a terminal send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was handed to the transport
    Delivered,
    /// The stage was force-finished first; the message was dropped
    /// silently (not an error)
    DroppedAfterFinish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    AwaitingAck,
    Acked,
    Responded,
    Finished,
}

struct SessionInner {
    state: SessionState,
    audit_sent: usize,
}

/// One stage invocation on the participant side
pub struct StageSession {
    stage: FlowStage,
    outbound: mpsc::Sender<AppMessage>,
    inner: Mutex<SessionInner>,
    cancellation: CancellationToken,
}

impl StageSession {
    pub fn new(stage: FlowStage, outbound: mpsc::Sender<AppMessage>) -> Self {
        Self {
            stage,
            outbound,
            inner: Mutex::new(SessionInner {
                state: SessionState::AwaitingAck,
                audit_sent: 0,
            }),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    /// Token that fires when the orchestrator force-finishes this stage
    ///
    /// Cancellation is cooperative: handlers check it at their own yield
    /// points.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.lock().state == SessionState::Finished
    }

    /// Whether a terminal message already left this session
    pub fn has_responded(&self) -> bool {
        self.inner.lock().state == SessionState::Responded
    }

    /// Send the liveness acknowledgement; must precede any work
    pub async fn send_ack(&self) -> ServiceResult<()> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::AwaitingAck => inner.state = SessionState::Acked,
                SessionState::Finished => return Ok(()),
                _ => {
                    return Err(FlowError::Protocol(
                        "duplicate acknowledgement for stage invocation".into(),
                    )
                    .into());
                }
            }
        }
        self.send(AppMessage::request_ack()).await
    }

    /// Send the terminal stage response
    ///
    /// Exactly one terminal message is allowed: a second call fails with
    /// `IllegalState` and the first response remains the one delivered.
    /// After a force-finish the message is dropped silently.
    pub async fn send_response<T: Serialize>(&self, payload: &T) -> ServiceResult<SendOutcome> {
        self.send_terminal(AppMessage::response(payload)).await
    }

    /// Send a terminal failure
    pub async fn send_failure(&self, failure: &FailurePayload) -> ServiceResult<SendOutcome> {
        self.send_terminal(AppMessage::failure(failure)).await
    }

    /// Send a terminal response with an empty payload
    ///
    /// Used for fire-and-forget stages where the response carries nothing.
    pub async fn send_empty_response(&self) -> ServiceResult<SendOutcome> {
        self.send_terminal(AppMessage::new(MessageType::Response, ""))
            .await
    }

    async fn send_terminal(&self, message: AppMessage) -> ServiceResult<SendOutcome> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Finished => {
                    tracing::warn!(
                        stage = %self.stage,
                        "dropping terminal message sent after force-finish"
                    );
                    return Ok(SendOutcome::DroppedAfterFinish);
                }
                SessionState::Responded => {
                    return Err(FlowError::IllegalState(
                        "a terminal response was already sent for this stage invocation".into(),
                    )
                    .into());
                }
                SessionState::AwaitingAck => {
                    return Err(FlowError::Protocol(
                        "terminal response sent before acknowledgement".into(),
                    )
                    .into());
                }
                SessionState::Acked => inner.state = SessionState::Responded,
            }
        }
        self.send(message).await?;
        Ok(SendOutcome::Delivered)
    }

    /// Emit an audit entry, capped at [`MAX_AUDIT_ENTRIES`] per session
    ///
    /// Overflow is dropped silently; audit is informational only and never
    /// an error path.
    pub async fn audit(&self, severity: AuditSeverity, message: impl Into<String>) -> ServiceResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Finished {
                return Ok(());
            }
            if inner.audit_sent >= MAX_AUDIT_ENTRIES {
                tracing::debug!(stage = %self.stage, "audit cap reached, entry dropped");
                return Ok(());
            }
            inner.audit_sent += 1;
        }
        let entry = AuditEntry::new(severity, message);
        self.send(AppMessage::service_event(&ServiceEventPayload::Audit(entry)))
            .await
    }

    /// React to an orchestrator event
    pub fn handle_event(&self, event: &FlowEvent) {
        match event {
            FlowEvent::FinishImmediately => {
                let mut inner = self.inner.lock();
                if inner.state != SessionState::Finished {
                    tracing::info!(stage = %self.stage, "stage force-finished by orchestrator");
                    inner.state = SessionState::Finished;
                }
                drop(inner);
                self.cancellation.cancel();
            }
            FlowEvent::ResponseRejected { reason } => {
                tracing::warn!(stage = %self.stage, reason, "stage response rejected");
            }
            FlowEvent::ResponseAccepted => {
                tracing::debug!(stage = %self.stage, "stage response accepted");
            }
            FlowEvent::ResumeUserInterface | FlowEvent::CancelOrResumeUserInterface => {
                tracing::debug!(stage = %self.stage, event = ?event, "user interface event");
            }
        }
    }

    async fn send(&self, message: AppMessage) -> ServiceResult<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| ServiceError::from(FlowError::Protocol("message channel closed".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::MessageType;
    use shared::response::FlowResponse;

    fn session(stage: FlowStage) -> (StageSession, mpsc::Receiver<AppMessage>) {
        let (tx, rx) = mpsc::channel(16);
        (StageSession::new(stage, tx), rx)
    }

    #[tokio::test]
    async fn test_ack_then_single_response() {
        let (session, mut rx) = session(FlowStage::PreFlow);
        session.send_ack().await.unwrap();
        let outcome = session.send_response(&FlowResponse::new()).await.unwrap();
        assert_eq!(outcome, SendOutcome::Delivered);

        assert_eq!(rx.recv().await.unwrap().message_type, MessageType::RequestAck);
        assert_eq!(rx.recv().await.unwrap().message_type, MessageType::Response);
    }

    #[tokio::test]
    async fn test_second_response_is_illegal_and_first_stands() {
        let (session, mut rx) = session(FlowStage::PreFlow);
        session.send_ack().await.unwrap();

        let mut first = FlowResponse::new();
        first.add_reference("attempt", 1i64);
        session.send_response(&first).await.unwrap();

        let err = session.send_response(&FlowResponse::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Flow(FlowError::IllegalState(_))));

        // Only ack + the first response ever reached the transport
        rx.recv().await.unwrap();
        let delivered = rx.recv().await.unwrap();
        let parsed: FlowResponse = delivered.parse_payload().unwrap();
        assert_eq!(parsed.references.get_integer("attempt"), Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_response_before_ack_is_a_protocol_error() {
        let (session, _rx) = session(FlowStage::PreFlow);
        let err = session.send_response(&FlowResponse::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Flow(FlowError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_force_finish_cancels_and_drops_late_response() {
        let (session, mut rx) = session(FlowStage::TransactionProcessing);
        session.send_ack().await.unwrap();
        rx.recv().await.unwrap();

        session.handle_event(&FlowEvent::FinishImmediately);
        assert!(session.is_finished());
        assert!(session.cancellation_token().is_cancelled());

        // Late response is dropped, not an error
        let outcome = session.send_response(&FlowResponse::new()).await.unwrap();
        assert_eq!(outcome, SendOutcome::DroppedAfterFinish);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_audit_cap_drops_sixth_entry() {
        let (session, mut rx) = session(FlowStage::Split);
        session.send_ack().await.unwrap();
        rx.recv().await.unwrap();

        for i in 0..7 {
            session
                .audit(AuditSeverity::Info, format!("entry {}", i))
                .await
                .unwrap();
        }

        let mut received = 0;
        while let Ok(msg) = rx.try_recv() {
            assert_eq!(msg.message_type, MessageType::ServiceEvent);
            received += 1;
        }
        assert_eq!(received, MAX_AUDIT_ENTRIES);
    }
}
