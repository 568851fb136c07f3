//! Wire messages between orchestrator and participant
//!
//! One stage invocation is a small, strictly ordered exchange: the
//! orchestrator sends `REQUEST`, the participant acknowledges with
//! `REQUEST_ACK` before doing any work, then sends exactly one terminal
//! `RESPONSE` or `FAILURE`. Audit entries travel out-of-band as
//! `SERVICE_EVENT` messages; `FORCE_FINISH` lets the orchestrator abort a
//! stage unilaterally.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod payload;
pub use payload::*;

/// Envelope message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Stage request (orchestrator -> participant)
    Request,
    /// Immediate liveness acknowledgement (participant -> orchestrator)
    RequestAck,
    /// Terminal stage response (participant -> orchestrator)
    Response,
    /// Terminal structured error (participant -> orchestrator)
    Failure,
    /// Unilateral abort (orchestrator -> participant)
    ForceFinish,
    /// Out-of-band event or audit entry
    ServiceEvent,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Request => write!(f, "REQUEST"),
            MessageType::RequestAck => write!(f, "REQUEST_ACK"),
            MessageType::Response => write!(f, "RESPONSE"),
            MessageType::Failure => write!(f, "FAILURE"),
            MessageType::ForceFinish => write!(f, "FORCE_FINISH"),
            MessageType::ServiceEvent => write!(f, "SERVICE_EVENT"),
        }
    }
}

/// The message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMessage {
    pub message_type: MessageType,
    /// Serialized payload; empty for ack and force-finish
    pub payload: String,
    /// Version of the framework that produced this message
    pub sender_version: String,
}

impl AppMessage {
    /// Create a message with the current framework version
    pub fn new(message_type: MessageType, payload: impl Into<String>) -> Self {
        Self {
            message_type,
            payload: payload.into(),
            sender_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Create a stage request message
    pub fn request(payload: &RequestPayload) -> Self {
        Self::new(
            MessageType::Request,
            serde_json::to_string(payload).expect("Failed to serialize request payload"),
        )
    }

    /// Create an empty acknowledgement
    pub fn request_ack() -> Self {
        Self::new(MessageType::RequestAck, "")
    }

    /// Create a terminal response carrying a stage-specific payload
    pub fn response<T: Serialize>(payload: &T) -> Self {
        Self::new(
            MessageType::Response,
            serde_json::to_string(payload).expect("Failed to serialize response payload"),
        )
    }

    /// Create a terminal failure
    pub fn failure(payload: &FailurePayload) -> Self {
        Self::new(
            MessageType::Failure,
            serde_json::to_string(payload).expect("Failed to serialize failure payload"),
        )
    }

    /// Create an empty force-finish
    pub fn force_finish() -> Self {
        Self::new(MessageType::ForceFinish, "")
    }

    /// Create an out-of-band service event
    pub fn service_event(payload: &ServiceEventPayload) -> Self {
        Self::new(
            MessageType::ServiceEvent,
            serde_json::to_string(payload).expect("Failed to serialize service event"),
        )
    }

    /// Parse the payload as the given type
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    /// Serialize for the transport
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse from the transport
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Payload of a `REQUEST` envelope: the stage name plus the serialized
/// stage-specific request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Wire name of the stage
    pub stage: String,
    /// Serialized stage request
    pub payload: String,
}

impl RequestPayload {
    pub fn new(stage: crate::stage::FlowStage, payload: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            payload: payload.into(),
        }
    }
}
