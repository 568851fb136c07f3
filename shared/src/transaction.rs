//! Transaction ledger
//!
//! A [`Transaction`] is one attempt to collect all or part of a payment's
//! amount. It may accumulate several responses over its lifetime (partial
//! approvals, retries); processed and remaining amounts are always derived
//! fresh from the response list so the ledger can never diverge from its
//! own history.

use crate::amounts::Amounts;
use crate::basket::Basket;
use crate::data::AdditionalData;
use crate::error::FlowResult;
use serde::{Deserialize, Serialize};

/// Outcome reported by a payment app for one processing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionOutcome {
    /// Funds were collected for the reported amounts
    Approved,
    /// The host or card declined the attempt
    Declined,
    /// The attempt failed before a decision was made
    Failed,
}

impl std::fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionOutcome::Approved => write!(f, "APPROVED"),
            TransactionOutcome::Declined => write!(f, "DECLINED"),
            TransactionOutcome::Failed => write!(f, "FAILED"),
        }
    }
}

/// One response within a transaction's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// Response id
    pub id: String,
    /// Outcome of this attempt
    pub outcome: TransactionOutcome,
    /// Human-readable outcome detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_message: Option<String>,
    /// Amounts actually processed by this attempt (approved outcomes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amounts_processed: Option<Amounts>,
    /// Payment method that collected the funds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// References returned by the payment app (authorization code, ...)
    #[serde(default, skip_serializing_if = "AdditionalData::is_empty")]
    pub references: AdditionalData,
}

impl TransactionResponse {
    /// An approved response for the given amounts and method
    pub fn approved(amounts: Amounts, method: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            outcome: TransactionOutcome::Approved,
            outcome_message: None,
            amounts_processed: Some(amounts),
            payment_method: Some(method.into()),
            references: AdditionalData::new(),
        }
    }

    /// A declined response with a reason
    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            outcome: TransactionOutcome::Declined,
            outcome_message: Some(message.into()),
            amounts_processed: None,
            payment_method: None,
            references: AdditionalData::new(),
        }
    }

    /// A failed response with a reason
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            outcome: TransactionOutcome::Failed,
            outcome_message: Some(message.into()),
            amounts_processed: None,
            payment_method: None,
            references: AdditionalData::new(),
        }
    }

    /// Attach a reference entry
    pub fn with_reference(
        mut self,
        key: impl Into<String>,
        value: impl Into<crate::data::DataValue>,
    ) -> Self {
        self.references.insert(key, value);
        self
    }
}

/// One attempt (possibly multi-response) to collect part of a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id
    pub id: String,
    /// Amounts this attempt was asked to collect
    pub requested_amounts: Amounts,
    /// Baskets associated with this attempt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub baskets: Vec<Basket>,
    /// Responses accumulated over the attempt's lifetime, append-only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<TransactionResponse>,
}

impl Transaction {
    /// New transaction for the requested amounts
    pub fn new(requested_amounts: Amounts) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            requested_amounts,
            baskets: Vec::new(),
            responses: Vec::new(),
        }
    }

    /// Attach a basket to this attempt
    pub fn with_basket(mut self, basket: Basket) -> Self {
        self.baskets.push(basket);
        self
    }

    /// Append a response; prior responses are never replaced
    pub fn add_response(&mut self, response: TransactionResponse) {
        self.responses.push(response);
    }

    /// Whether any response was approved
    pub fn has_approval(&self) -> bool {
        self.responses
            .iter()
            .any(|r| r.outcome == TransactionOutcome::Approved)
    }

    /// Amounts processed so far, summed over approved responses only
    ///
    /// Always derived fresh from the response list, never stored.
    pub fn processed_amounts(&self) -> FlowResult<Amounts> {
        let mut processed = Amounts::zero(self.requested_amounts.currency.clone());
        for response in &self.responses {
            if response.outcome != TransactionOutcome::Approved {
                continue;
            }
            if let Some(amounts) = &response.amounts_processed {
                processed = processed.checked_add(amounts)?;
            }
        }
        Ok(processed)
    }

    /// Requested minus processed, component-wise, clamped at zero
    pub fn remaining_amounts(&self) -> FlowResult<Amounts> {
        let processed = self.processed_amounts()?;
        self.requested_amounts.saturating_sub(&processed)
    }

    /// Whether this attempt fully satisfied its requested amounts
    pub fn fully_processed(&self) -> FlowResult<bool> {
        if !self.has_approval() {
            return Ok(false);
        }
        let processed = self.processed_amounts()?;
        Ok(processed.total() >= self.requested_amounts.total())
    }
}
