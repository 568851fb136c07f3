//! Flow stages
//!
//! A payment flow is a fixed chain of named stages; exactly one participant
//! acts during each stage and its validated response feeds the next. The
//! `GENERIC` and `STATUS_UPDATE` stages live outside the chain for ad-hoc
//! requests and fire-and-forget notifications.

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One named step in the flow state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStage {
    PreFlow,
    /// May repeat until the payment is fully reconciled
    Split,
    PreTransaction,
    /// Optional; skipped when the payment app reads the card itself
    PaymentCardReading,
    PostCardReading,
    TransactionProcessing,
    PostTransaction,
    PostFlow,
    /// Ad-hoc requests outside the payment chain
    Generic,
    /// Fire-and-forget notifications
    StatusUpdate,
}

/// The standard payment chain in execution order (SPLIT may repeat)
pub const STANDARD_CHAIN: &[FlowStage] = &[
    FlowStage::PreFlow,
    FlowStage::Split,
    FlowStage::PreTransaction,
    FlowStage::PaymentCardReading,
    FlowStage::PostCardReading,
    FlowStage::TransactionProcessing,
    FlowStage::PostTransaction,
    FlowStage::PostFlow,
];

impl FlowStage {
    /// Wire name of this stage
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStage::PreFlow => "PRE_FLOW",
            FlowStage::Split => "SPLIT",
            FlowStage::PreTransaction => "PRE_TRANSACTION",
            FlowStage::PaymentCardReading => "PAYMENT_CARD_READING",
            FlowStage::PostCardReading => "POST_CARD_READING",
            FlowStage::TransactionProcessing => "TRANSACTION_PROCESSING",
            FlowStage::PostTransaction => "POST_TRANSACTION",
            FlowStage::PostFlow => "POST_FLOW",
            FlowStage::Generic => "GENERIC",
            FlowStage::StatusUpdate => "STATUS_UPDATE",
        }
    }

    /// Whether a participant may request transaction cancellation here
    pub fn can_cancel_transaction(&self) -> bool {
        matches!(self, FlowStage::Split | FlowStage::PreTransaction)
    }

    /// Whether this stage is part of the standard payment chain
    pub fn in_standard_chain(&self) -> bool {
        STANDARD_CHAIN.contains(self)
    }

    /// Next stage in the standard chain, `None` at the end or outside it
    pub fn next(&self) -> Option<FlowStage> {
        let index = STANDARD_CHAIN.iter().position(|stage| stage == self)?;
        STANDARD_CHAIN.get(index + 1).copied()
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FlowStage {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRE_FLOW" => Ok(FlowStage::PreFlow),
            "SPLIT" => Ok(FlowStage::Split),
            "PRE_TRANSACTION" => Ok(FlowStage::PreTransaction),
            "PAYMENT_CARD_READING" => Ok(FlowStage::PaymentCardReading),
            "POST_CARD_READING" => Ok(FlowStage::PostCardReading),
            "TRANSACTION_PROCESSING" => Ok(FlowStage::TransactionProcessing),
            "POST_TRANSACTION" => Ok(FlowStage::PostTransaction),
            "POST_FLOW" => Ok(FlowStage::PostFlow),
            "GENERIC" => Ok(FlowStage::Generic),
            "STATUS_UPDATE" => Ok(FlowStage::StatusUpdate),
            other => Err(FlowError::UnknownStage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_name_roundtrip() {
        for stage in STANDARD_CHAIN {
            assert_eq!(stage.as_str().parse::<FlowStage>().unwrap(), *stage);
        }
        assert_eq!("GENERIC".parse::<FlowStage>().unwrap(), FlowStage::Generic);
        assert_eq!(
            "STATUS_UPDATE".parse::<FlowStage>().unwrap(),
            FlowStage::StatusUpdate
        );
    }

    #[test]
    fn test_unknown_stage_rejected() {
        assert!(matches!(
            "CHECKOUT".parse::<FlowStage>(),
            Err(FlowError::UnknownStage(_))
        ));
    }

    #[test]
    fn test_cancellation_only_from_split_and_pre_transaction() {
        assert!(FlowStage::Split.can_cancel_transaction());
        assert!(FlowStage::PreTransaction.can_cancel_transaction());
        assert!(!FlowStage::PreFlow.can_cancel_transaction());
        assert!(!FlowStage::TransactionProcessing.can_cancel_transaction());
        assert!(!FlowStage::PostFlow.can_cancel_transaction());
    }

    #[test]
    fn test_standard_chain_order() {
        assert_eq!(FlowStage::PreFlow.next(), Some(FlowStage::Split));
        assert_eq!(FlowStage::Split.next(), Some(FlowStage::PreTransaction));
        assert_eq!(FlowStage::PostFlow.next(), None);
        assert_eq!(FlowStage::Generic.next(), None);
        assert!(!FlowStage::StatusUpdate.in_standard_chain());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&FlowStage::PaymentCardReading).unwrap();
        assert_eq!(json, "\"PAYMENT_CARD_READING\"");
    }
}
