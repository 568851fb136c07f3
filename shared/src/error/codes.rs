//! Unified error codes for the payment flow framework
//!
//! Error codes are shared between participant apps and the orchestrator so
//! that a `FAILURE` message carries a stable, language-neutral identifier.
//! Codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Amount errors
//! - 2xxx: Basket errors
//! - 4xxx: Stage / protocol errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility with non-Rust participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,
    /// Payload could not be serialized or deserialized
    SerializationFailed = 6,
    /// Operation is not supported for this request
    UnsupportedOperation = 7,
    /// Operation is illegal in the current state
    IllegalState = 8,

    // ==================== 1xxx: Amounts ====================
    /// Amounts with different currencies were combined
    CurrencyMismatch = 1001,
    /// An additional amount would be reduced without the reduction flag
    AmountReductionNotAllowed = 1002,
    /// Exchange rate is not a finite positive number
    InvalidExchangeRate = 1003,
    /// Amounts paid exceed the updated request amounts
    PaidExceedsRequested = 1004,

    // ==================== 2xxx: Basket ====================
    /// The request carries no basket
    BasketRequired = 2001,
    /// Basket item not found
    BasketItemNotFound = 2002,
    /// Not enough units of the item left to pay for
    InsufficientQuantity = 2003,

    // ==================== 4xxx: Stage / Protocol ====================
    /// Stage name is not part of the flow contract
    UnknownStage = 4001,
    /// Stage is valid but not handled by this service
    StageNotSupported = 4002,
    /// Message sequence violated the stage protocol
    ProtocolViolation = 4003,
    /// Transaction cancellation requested from a stage that cannot cancel
    CancelNotAllowed = 4004,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
}

/// Error category, derived from the code range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    General,
    Amounts,
    Basket,
    Protocol,
    System,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            0..=999 => ErrorCategory::General,
            1000..=1999 => ErrorCategory::Amounts,
            2000..=2999 => ErrorCategory::Basket,
            4000..=4999 => ErrorCategory::Protocol,
            _ => ErrorCategory::System,
        }
    }

    /// Get the default English message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::SerializationFailed => "Payload serialization failed",
            ErrorCode::UnsupportedOperation => "Operation not supported",
            ErrorCode::IllegalState => "Operation illegal in current state",

            // Amounts
            ErrorCode::CurrencyMismatch => "Amount currencies do not match",
            ErrorCode::AmountReductionNotAllowed => {
                "Reducing an additional amount requires the reduction flag"
            }
            ErrorCode::InvalidExchangeRate => "Exchange rate is invalid",
            ErrorCode::PaidExceedsRequested => "Amounts paid exceed the request amounts",

            // Basket
            ErrorCode::BasketRequired => "Request has no basket",
            ErrorCode::BasketItemNotFound => "Basket item not found",
            ErrorCode::InsufficientQuantity => "Insufficient item quantity",

            // Stage / Protocol
            ErrorCode::UnknownStage => "Unknown flow stage",
            ErrorCode::StageNotSupported => "Stage not handled by this service",
            ErrorCode::ProtocolViolation => "Stage message protocol violated",
            ErrorCode::CancelNotAllowed => "Cancellation not allowed from this stage",

            // System
            ErrorCode::InternalError => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::SerializationFailed),
            7 => Ok(ErrorCode::UnsupportedOperation),
            8 => Ok(ErrorCode::IllegalState),
            1001 => Ok(ErrorCode::CurrencyMismatch),
            1002 => Ok(ErrorCode::AmountReductionNotAllowed),
            1003 => Ok(ErrorCode::InvalidExchangeRate),
            1004 => Ok(ErrorCode::PaidExceedsRequested),
            2001 => Ok(ErrorCode::BasketRequired),
            2002 => Ok(ErrorCode::BasketItemNotFound),
            2003 => Ok(ErrorCode::InsufficientQuantity),
            4001 => Ok(ErrorCode::UnknownStage),
            4002 => Ok(ErrorCode::StageNotSupported),
            4003 => Ok(ErrorCode::ProtocolViolation),
            4004 => Ok(ErrorCode::CancelNotAllowed),
            9001 => Ok(ErrorCode::InternalError),
            other => Err(InvalidErrorCode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        let codes = [
            ErrorCode::Unknown,
            ErrorCode::CurrencyMismatch,
            ErrorCode::BasketItemNotFound,
            ErrorCode::ProtocolViolation,
            ErrorCode::InternalError,
        ];
        for code in codes {
            assert_eq!(ErrorCode::try_from(code.code()).unwrap(), code);
        }
    }

    #[test]
    fn test_invalid_code_rejected() {
        assert_eq!(ErrorCode::try_from(12345), Err(InvalidErrorCode(12345)));
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorCode::ValidationFailed.category(), ErrorCategory::General);
        assert_eq!(ErrorCode::CurrencyMismatch.category(), ErrorCategory::Amounts);
        assert_eq!(ErrorCode::BasketRequired.category(), ErrorCategory::Basket);
        assert_eq!(ErrorCode::UnknownStage.category(), ErrorCategory::Protocol);
        assert_eq!(ErrorCode::InternalError.category(), ErrorCategory::System);
    }

    #[test]
    fn test_serde_as_u16() {
        let json = serde_json::to_string(&ErrorCode::CurrencyMismatch).unwrap();
        assert_eq!(json, "1001");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::CurrencyMismatch);
    }
}
