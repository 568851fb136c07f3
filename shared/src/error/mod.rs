//! Unified error system for the payment flow framework
//!
//! - [`ErrorCode`]: stable numeric codes carried on `FAILURE` messages
//! - [`FlowError`]: rich domain error raised by the engines and the
//!   stage protocol
//!
//! Validation errors are recoverable by the caller (reject the mutation,
//! not the flow); protocol errors are fatal to the current stage
//! invocation only.

mod codes;

pub use codes::{ErrorCategory, ErrorCode, InvalidErrorCode};

use crate::message::FailurePayload;
use thiserror::Error;

/// Domain error for amounts, baskets, the ledger and the stage protocol
#[derive(Debug, Error)]
pub enum FlowError {
    /// Amounts with different currencies were combined
    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// A mutation was rejected by a validation rule
    #[error("{0}")]
    InvalidArgument(String),

    /// An operation was attempted in a state that forbids it
    #[error("{0}")]
    IllegalState(String),

    /// The request cannot support the operation at all
    #[error("{0}")]
    UnsupportedOperation(String),

    /// Amounts paid exceed the updated request amounts
    #[error("amounts paid ({paid}) exceed updated request amounts ({requested})")]
    PaidExceedsRequested { paid: i64, requested: i64 },

    /// Exchange rate is not a finite positive number
    #[error("invalid exchange rate: {0}")]
    InvalidExchangeRate(f64),

    /// Basket item lookup failed
    #[error("basket item not found: {0}")]
    BasketItemNotFound(String),

    /// Stage name is not part of the flow contract
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// Stage is valid but this service does not handle it
    #[error("stage not handled by this service: {0}")]
    StageNotSupported(String),

    /// Message sequencing violated the stage protocol
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Cancellation requested from a stage that cannot cancel
    #[error("transaction cancellation is not allowed from stage {0}")]
    CancelNotAllowed(String),

    /// Payload could not be serialized or deserialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Get the stable error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CurrencyMismatch { .. } => ErrorCode::CurrencyMismatch,
            Self::InvalidArgument(_) => ErrorCode::ValidationFailed,
            Self::IllegalState(_) => ErrorCode::IllegalState,
            Self::UnsupportedOperation(_) => ErrorCode::UnsupportedOperation,
            Self::PaidExceedsRequested { .. } => ErrorCode::PaidExceedsRequested,
            Self::InvalidExchangeRate(_) => ErrorCode::InvalidExchangeRate,
            Self::BasketItemNotFound(_) => ErrorCode::BasketItemNotFound,
            Self::UnknownStage(_) => ErrorCode::UnknownStage,
            Self::StageNotSupported(_) => ErrorCode::StageNotSupported,
            Self::Protocol(_) => ErrorCode::ProtocolViolation,
            Self::CancelNotAllowed(_) => ErrorCode::CancelNotAllowed,
            Self::Serialization(_) => ErrorCode::SerializationFailed,
        }
    }

    /// Convert into the wire representation for a `FAILURE` message
    pub fn to_failure(&self) -> FailurePayload {
        FailurePayload::new(self.code(), self.to_string())
    }

    /// Shorthand for a currency mismatch between two currency codes
    pub fn currency_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::CurrencyMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Result type for flow operations
pub type FlowResult<T> = Result<T, FlowError>;
