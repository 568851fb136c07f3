//! Orchestrator-side stage exchange
//!
//! Tracks one stage invocation from the orchestrator's point of view and
//! enforces the message sequence: acknowledgement before the terminal
//! message, exactly one terminal message, and silent dropping of responses
//! that arrive after a force-finish. The exchange does not measure time;
//! timeout policy lives with the caller, which reacts by calling
//! [`StageExchange::force_finish`].

use shared::error::{FlowError, FlowResult};
use shared::message::{
    AppMessage, AuditEntry, FailurePayload, FlowEvent, MessageType, RequestPayload,
    ServiceEventPayload, MAX_AUDIT_ENTRIES,
};
use shared::stage::FlowStage;

/// Terminal result of a stage invocation
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Serialized stage response payload
    Response(String),
    /// Structured error from the participant
    Failure(FailurePayload),
}

/// What an inbound message meant for the exchange
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeEvent {
    /// The participant acknowledged the request
    Acknowledged,
    /// The participant sent its terminal message
    Completed(StageOutcome),
    /// An audit entry was recorded
    AuditRecorded,
    /// A response arrived after force-finish and was dropped
    LateResponseDropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    Sent,
    Acked,
    Completed,
    ForceFinished,
}

/// One stage invocation on the orchestrator side
pub struct StageExchange {
    /// Correlation id for this invocation, usable as a response-store key
    invocation_id: String,
    stage: FlowStage,
    state: ExchangeState,
    outcome: Option<StageOutcome>,
    audit_trail: Vec<AuditEntry>,
}

impl StageExchange {
    /// Start an exchange and produce the request message to deliver
    pub fn begin(stage: FlowStage, stage_payload: impl Into<String>) -> (Self, AppMessage) {
        let request = AppMessage::request(&RequestPayload::new(stage, stage_payload));
        (
            Self {
                invocation_id: uuid::Uuid::new_v4().to_string(),
                stage,
                state: ExchangeState::Sent,
                outcome: None,
                audit_trail: Vec::new(),
            },
            request,
        )
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    /// Feed an inbound message from the participant
    pub fn on_message(&mut self, message: &AppMessage) -> FlowResult<ExchangeEvent> {
        match message.message_type {
            MessageType::RequestAck => match self.state {
                ExchangeState::Sent => {
                    self.state = ExchangeState::Acked;
                    Ok(ExchangeEvent::Acknowledged)
                }
                _ => Err(FlowError::Protocol(
                    "unexpected acknowledgement for stage invocation".into(),
                )),
            },

            MessageType::Response | MessageType::Failure => match self.state {
                ExchangeState::Acked => {
                    let outcome = if message.message_type == MessageType::Response {
                        StageOutcome::Response(message.payload.clone())
                    } else {
                        StageOutcome::Failure(message.parse_payload()?)
                    };
                    self.outcome = Some(outcome.clone());
                    self.state = ExchangeState::Completed;
                    Ok(ExchangeEvent::Completed(outcome))
                }
                ExchangeState::Sent => Err(FlowError::Protocol(
                    "terminal message received before acknowledgement".into(),
                )),
                ExchangeState::Completed => Err(FlowError::IllegalState(
                    "duplicate terminal message for stage invocation".into(),
                )),
                ExchangeState::ForceFinished => {
                    // Late message: dropped, never signaled back as an error
                    tracing::warn!(
                        stage = %self.stage,
                        invocation_id = %self.invocation_id,
                        message_type = %message.message_type,
                        "dropping terminal message received after force-finish"
                    );
                    Ok(ExchangeEvent::LateResponseDropped)
                }
            },

            MessageType::ServiceEvent => {
                let payload: ServiceEventPayload = message.parse_payload()?;
                match payload {
                    ServiceEventPayload::Audit(entry) => {
                        // Defensive cap: a conforming participant stops at
                        // the limit already
                        if self.audit_trail.len() < MAX_AUDIT_ENTRIES {
                            self.audit_trail.push(entry);
                        }
                        Ok(ExchangeEvent::AuditRecorded)
                    }
                    ServiceEventPayload::Flow(event) => Err(FlowError::Protocol(format!(
                        "participant may not send flow events (got {:?})",
                        event
                    ))),
                }
            }

            MessageType::Request | MessageType::ForceFinish => Err(FlowError::Protocol(format!(
                "unexpected {} from participant",
                message.message_type
            ))),
        }
    }

    /// Abort the stage; the participant must stop and any later response
    /// will be dropped
    ///
    /// Returns `None` when the exchange already completed.
    pub fn force_finish(&mut self) -> Option<AppMessage> {
        match self.state {
            ExchangeState::Completed => None,
            _ => {
                self.state = ExchangeState::ForceFinished;
                Some(AppMessage::force_finish())
            }
        }
    }

    /// Produce an event notification message for the participant
    pub fn notify(&self, event: FlowEvent) -> AppMessage {
        AppMessage::service_event(&ServiceEventPayload::Flow(event))
    }

    /// Terminal outcome, once completed
    pub fn outcome(&self) -> Option<&StageOutcome> {
        self.outcome.as_ref()
    }

    /// Audit entries collected during this invocation
    pub fn audit_trail(&self) -> &[AuditEntry] {
        &self.audit_trail
    }

    /// Whether no further terminal message is expected
    pub fn is_settled(&self) -> bool {
        matches!(
            self.state,
            ExchangeState::Completed | ExchangeState::ForceFinished
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;
    use shared::response::FlowResponse;

    #[test]
    fn test_happy_path_sequence() {
        let (mut exchange, request) = StageExchange::begin(FlowStage::PreFlow, "{}");
        assert_eq!(request.message_type, MessageType::Request);

        let event = exchange.on_message(&AppMessage::request_ack()).unwrap();
        assert_eq!(event, ExchangeEvent::Acknowledged);

        let event = exchange
            .on_message(&AppMessage::response(&FlowResponse::new()))
            .unwrap();
        assert!(matches!(event, ExchangeEvent::Completed(StageOutcome::Response(_))));
        assert!(exchange.is_settled());
    }

    #[test]
    fn test_terminal_before_ack_is_a_protocol_error() {
        let (mut exchange, _) = StageExchange::begin(FlowStage::PreFlow, "{}");
        let err = exchange
            .on_message(&AppMessage::response(&FlowResponse::new()))
            .unwrap_err();
        assert!(matches!(err, FlowError::Protocol(_)));
    }

    #[test]
    fn test_duplicate_terminal_is_illegal_and_first_outcome_stands() {
        let (mut exchange, _) = StageExchange::begin(FlowStage::PreFlow, "{}");
        exchange.on_message(&AppMessage::request_ack()).unwrap();

        let mut first = FlowResponse::new();
        first.add_reference("attempt", 1i64);
        exchange.on_message(&AppMessage::response(&first)).unwrap();

        let err = exchange
            .on_message(&AppMessage::response(&FlowResponse::new()))
            .unwrap_err();
        assert!(matches!(err, FlowError::IllegalState(_)));

        let Some(StageOutcome::Response(payload)) = exchange.outcome() else {
            panic!("expected a response outcome");
        };
        let parsed: FlowResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.references.get_integer("attempt"), Some(1));
    }

    #[test]
    fn test_late_response_after_force_finish_is_dropped_silently() {
        let (mut exchange, _) = StageExchange::begin(FlowStage::Split, "{}");
        exchange.on_message(&AppMessage::request_ack()).unwrap();

        let finish = exchange.force_finish();
        assert!(finish.is_some());

        let event = exchange
            .on_message(&AppMessage::response(&FlowResponse::new()))
            .unwrap();
        assert_eq!(event, ExchangeEvent::LateResponseDropped);
        assert!(exchange.outcome().is_none());
    }

    #[test]
    fn test_force_finish_after_completion_is_a_noop() {
        let (mut exchange, _) = StageExchange::begin(FlowStage::PreFlow, "{}");
        exchange.on_message(&AppMessage::request_ack()).unwrap();
        exchange
            .on_message(&AppMessage::response(&FlowResponse::new()))
            .unwrap();

        assert!(exchange.force_finish().is_none());
        assert!(exchange.outcome().is_some());
    }

    #[test]
    fn test_failure_outcome_carries_code() {
        let (mut exchange, _) = StageExchange::begin(FlowStage::PreFlow, "{}");
        exchange.on_message(&AppMessage::request_ack()).unwrap();

        let failure = FailurePayload::new(ErrorCode::CurrencyMismatch, "GBP vs EUR");
        let event = exchange.on_message(&AppMessage::failure(&failure)).unwrap();
        let ExchangeEvent::Completed(StageOutcome::Failure(received)) = event else {
            panic!("expected a failure outcome");
        };
        assert_eq!(received.code, ErrorCode::CurrencyMismatch);
    }

    #[test]
    fn test_notify_wraps_events_as_service_events() {
        let (exchange, _) = StageExchange::begin(FlowStage::PreFlow, "{}");
        let message = exchange.notify(FlowEvent::ResponseAccepted);
        assert_eq!(message.message_type, MessageType::ServiceEvent);

        let payload: ServiceEventPayload = message.parse_payload().unwrap();
        assert!(matches!(
            payload,
            ServiceEventPayload::Flow(FlowEvent::ResponseAccepted)
        ));
    }

    #[test]
    fn test_audit_entries_collected_with_defensive_cap() {
        let (mut exchange, _) = StageExchange::begin(FlowStage::Split, "{}");
        exchange.on_message(&AppMessage::request_ack()).unwrap();

        for i in 0..8 {
            let entry = AuditEntry::info(format!("entry {}", i));
            exchange
                .on_message(&AppMessage::service_event(&ServiceEventPayload::Audit(entry)))
                .unwrap();
        }
        assert_eq!(exchange.audit_trail().len(), MAX_AUDIT_ENTRIES);
    }
}
