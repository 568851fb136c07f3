//! Service-level errors
//!
//! Everything a stage handler can raise is either a domain [`FlowError`]
//! or an internal failure wrapped in `anyhow`. The dispatch boundary
//! converts both into `FAILURE` messages; nothing escapes to the
//! orchestrator as a crash.

use shared::error::{ErrorCode, FlowError};
use shared::message::FailurePayload;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Domain or protocol error
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Unexpected internal failure (including handler panics)
    #[error("internal service error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Stable error code for the wire
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Flow(err) => err.code(),
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Convert into the `FAILURE` message payload
    pub fn to_failure(&self) -> FailurePayload {
        match self {
            Self::Flow(err) => err.to_failure(),
            // Internal detail stays in the log, not on the wire
            Self::Internal(err) => {
                tracing::error!(error = ?err, "internal service error");
                FailurePayload::new(ErrorCode::InternalError, "internal service error")
            }
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_error_code_passes_through() {
        let err = ServiceError::from(FlowError::UnknownStage("X".into()));
        assert_eq!(err.code(), ErrorCode::UnknownStage);
    }

    #[test]
    fn test_internal_error_is_not_leaked_to_the_wire() {
        let err = ServiceError::from(anyhow::anyhow!("secret connection string"));
        let failure = err.to_failure();
        assert_eq!(failure.code, ErrorCode::InternalError);
        assert!(!failure.message.contains("secret"));
    }
}
