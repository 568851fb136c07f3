//! Out-of-band payloads: flow events, audit entries, failures

use crate::error::ErrorCode;
use crate::util::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum audit entries one stage invocation may emit; overflow is
/// silently dropped
pub const MAX_AUDIT_ENTRIES: usize = 5;

// ==================== Audit ====================

/// Severity of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Rate-limited diagnostic message attached to a stage session
///
/// Non-authoritative, informational only; never part of the financial
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub severity: AuditSeverity,
    pub message: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

impl AuditEntry {
    pub fn new(severity: AuditSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: now_millis(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(AuditSeverity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(AuditSeverity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(AuditSeverity::Error, message)
    }
}

// ==================== Flow Events ====================

/// One-directional notifications from the orchestrator to a participant
///
/// Events are not requests: no response is expected and none is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowEvent {
    /// Bring the participant UI back to the foreground
    ResumeUserInterface,
    /// The customer may cancel or resume; participant decides how to react
    CancelOrResumeUserInterface,
    /// Cease processing and release resources immediately; no response
    /// will be accepted after this point
    FinishImmediately,
    /// The previously sent response passed validation and was merged
    ResponseAccepted,
    /// The previously sent response was rejected
    ResponseRejected { reason: String },
}

/// Payload of a `SERVICE_EVENT` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ServiceEventPayload {
    /// Out-of-band audit entry (participant -> orchestrator)
    Audit(AuditEntry),
    /// Flow event (orchestrator -> participant)
    Flow(FlowEvent),
}

// ==================== Failure ====================

/// Payload of a `FAILURE` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePayload {
    /// Stable error code
    pub code: ErrorCode,
    /// Human-readable description
    pub message: String,
}

impl FailurePayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_entry_constructors() {
        let entry = AuditEntry::warning("card reader slow to respond");
        assert_eq!(entry.severity, AuditSeverity::Warning);
        assert!(entry.timestamp > 0);
    }

    #[test]
    fn test_flow_event_serde() {
        let event = FlowEvent::ResponseRejected {
            reason: "currency mismatch".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("RESPONSE_REJECTED"));
        let back: FlowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_service_event_payload_discriminates() {
        let audit = ServiceEventPayload::Audit(AuditEntry::info("starting"));
        let json = serde_json::to_string(&audit).unwrap();
        let back: ServiceEventPayload = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ServiceEventPayload::Audit(_)));

        let flow = ServiceEventPayload::Flow(FlowEvent::FinishImmediately);
        let json = serde_json::to_string(&flow).unwrap();
        let back: ServiceEventPayload = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            ServiceEventPayload::Flow(FlowEvent::FinishImmediately)
        ));
    }

    #[test]
    fn test_failure_payload_serializes_numeric_code() {
        let failure = FailurePayload::new(ErrorCode::CurrencyMismatch, "GBP vs EUR");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("1001"));
    }
}
