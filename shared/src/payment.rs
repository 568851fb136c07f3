//! Payment request model
//!
//! A [`Payment`] is the top-level customer request before any splitting.
//! The remaining types here are the stage-specific request/response
//! payloads that do not belong to a dedicated engine: card capture
//! results, the end-of-flow summary and the generic/status payloads.

use crate::amounts::Amounts;
use crate::basket::Basket;
use crate::data::AdditionalData;
use crate::error::FlowResult;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// The overall customer transaction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id
    pub id: String,
    /// Flow type requested by the client app (e.g. "sale", "refund")
    pub flow_type: String,
    /// Requested amounts
    pub amounts: Amounts,
    /// Primary basket, when the request is itemized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basket: Option<Basket>,
    /// Baskets added by flow apps during the flow
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_baskets: Vec<Basket>,
    /// Whether the client allows this payment to be split
    #[serde(default)]
    pub split_enabled: bool,
    /// Open key/value data carried with the request
    #[serde(default, skip_serializing_if = "AdditionalData::is_empty")]
    pub additional_data: AdditionalData,
}

impl Payment {
    /// New payment request for the given flow type and amounts
    pub fn new(flow_type: impl Into<String>, amounts: Amounts) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            flow_type: flow_type.into(),
            amounts,
            basket: None,
            additional_baskets: Vec::new(),
            split_enabled: false,
            additional_data: AdditionalData::new(),
        }
    }

    /// Attach the primary basket
    pub fn with_basket(mut self, basket: Basket) -> Self {
        self.basket = Some(basket);
        self
    }

    /// Allow split flows for this payment
    pub fn with_split_enabled(mut self) -> Self {
        self.split_enabled = true;
        self
    }

    /// Find a basket (primary or additional) by id
    pub fn basket_by_id(&self, basket_id: &str) -> Option<&Basket> {
        self.basket
            .iter()
            .chain(self.additional_baskets.iter())
            .find(|basket| basket.id == basket_id)
    }
}

/// Card data captured by a card reading stage
///
/// All fields are optional: a payment app may capture as little or as much
/// as its hardware provides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Opaque token identifying the card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_token: Option<String>,
    /// Masked primary account number (e.g. "476173******0119")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_pan: Option<String>,
    /// Expiry date as "YYMM"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    /// Cardholder name as read from the card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardholder_name: Option<String>,
    /// Additional card data (EMV tags, network data, ...)
    #[serde(default, skip_serializing_if = "AdditionalData::is_empty")]
    pub additional_data: AdditionalData,
}

impl Card {
    /// Whether no card data was captured at all
    pub fn is_empty(&self) -> bool {
        self.card_token.is_none()
            && self.masked_pan.is_none()
            && self.expiry_date.is_none()
            && self.cardholder_name.is_none()
            && self.additional_data.is_empty()
    }
}

/// Terminal message of a card reading stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardResponse {
    /// Captured card data; empty when reading was skipped or aborted
    #[serde(default)]
    pub card: Card,
    /// References produced during reading
    #[serde(default, skip_serializing_if = "AdditionalData::is_empty")]
    pub references: AdditionalData,
}

/// A transaction together with the card captured for it
///
/// Request payload for the post-card-reading and transaction-processing
/// stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardTransaction {
    pub transaction: Transaction,
    #[serde(default)]
    pub card: Card,
}

/// End-of-flow summary handed to post-flow participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    /// The request as it looks after all stages ran
    pub payment: Payment,
    /// Every transaction executed for this payment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<Transaction>,
}

impl FlowSummary {
    /// Total processed across all transactions
    pub fn total_processed(&self) -> FlowResult<Amounts> {
        let mut total = Amounts::zero(self.payment.amounts.currency.clone());
        for transaction in &self.transactions {
            total = total.checked_add(&transaction.processed_amounts()?)?;
        }
        Ok(total)
    }
}

/// Ad-hoc request outside the payment chain (reversal, tokenisation,
/// receipt printing, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRequest {
    /// Request type identifier, agreed between orchestrator and service
    pub request_type: String,
    /// Request parameters
    #[serde(default, skip_serializing_if = "AdditionalData::is_empty")]
    pub data: AdditionalData,
}

/// Terminal message of a generic stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericResponse {
    /// Whether the request was handled
    pub success: bool,
    /// Response message / error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response data
    #[serde(default, skip_serializing_if = "AdditionalData::is_empty")]
    pub data: AdditionalData,
}

impl GenericResponse {
    pub fn success(data: AdditionalData) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: AdditionalData::new(),
        }
    }
}

/// Fire-and-forget notification payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    /// Update type identifier (e.g. "basket_updated")
    pub update_type: String,
    /// Update parameters
    #[serde(default, skip_serializing_if = "AdditionalData::is_empty")]
    pub data: AdditionalData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amounts::Amount;
    use crate::basket::BasketItem;
    use crate::transaction::TransactionResponse;

    #[test]
    fn test_basket_lookup_spans_primary_and_additional() {
        let mut basket = Basket::with_id("main", "order");
        basket
            .add_items([BasketItem::new("a", "A", Amount::new(100, "GBP"), 1)])
            .unwrap();
        let extra = Basket::with_id("upsell", "upsell");

        let mut payment = Payment::new("sale", Amounts::new(100, "GBP")).with_basket(basket);
        payment.additional_baskets.push(extra);

        assert!(payment.basket_by_id("main").is_some());
        assert!(payment.basket_by_id("upsell").is_some());
        assert!(payment.basket_by_id("nope").is_none());
    }

    #[test]
    fn test_flow_summary_totals_across_transactions() {
        let payment = Payment::new("sale", Amounts::new(1000, "GBP"));
        let mut txn_a = Transaction::new(Amounts::new(600, "GBP"));
        txn_a.add_response(TransactionResponse::approved(Amounts::new(600, "GBP"), "card"));
        let mut txn_b = Transaction::new(Amounts::new(400, "GBP"));
        txn_b.add_response(TransactionResponse::approved(Amounts::new(400, "GBP"), "cash"));

        let summary = FlowSummary {
            payment,
            transactions: vec![txn_a, txn_b],
        };
        assert_eq!(summary.total_processed().unwrap().total(), 1000);
    }

    #[test]
    fn test_empty_card_detection() {
        assert!(Card::default().is_empty());
        let card = Card {
            card_token: Some("tok_1".into()),
            ..Default::default()
        };
        assert!(!card.is_empty());
    }
}
