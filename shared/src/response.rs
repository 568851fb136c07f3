//! Flow response contract
//!
//! A [`FlowResponse`] is the structured declaration of changes a stage
//! participant wants applied to the shared request state. The participant
//! builds it up through the mutators, the framework validates it before it
//! may leave the stage, and the orchestrator merges it atomically.

use crate::amounts::Amounts;
use crate::basket::{Basket, BasketItem};
use crate::data::{AdditionalData, DataValue};
use crate::error::{FlowError, FlowResult};
use crate::stage::FlowStage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Amounts collected by a flow app outside the payment app (loyalty,
/// vouchers, prepaid), together with the method that collected them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountsPaid {
    pub amounts: Amounts,
    pub method: String,
}

/// Changes to an existing basket
///
/// Listed items upsert the matching lines: an existing id takes the listed
/// quantity and price, a new id is appended. `paid_with` marks the listed
/// items as already paid for by the given method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketModification {
    /// Id of the basket to modify
    pub basket_id: String,
    /// Upserted lines
    pub items: Vec<BasketItem>,
    /// Payment that covered the listed items, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_with: Option<AmountsPaid>,
}

/// The mutation contract a stage participant builds up
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowResponse {
    /// Replacement for the request amounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_request_amounts: Option<Amounts>,
    /// A basket to add to the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_basket: Option<Basket>,
    /// Changes to an existing basket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_basket: Option<BasketModification>,
    /// Amounts this participant already collected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amounts_paid: Option<AmountsPaid>,
    /// Request cancellation of the transaction (SPLIT / PRE_TRANSACTION only)
    #[serde(default)]
    pub cancel_transaction: bool,
    /// References to attach to the request
    #[serde(default, skip_serializing_if = "AdditionalData::is_empty")]
    pub references: AdditionalData,
    /// Data keys this participant wants delivered in later stages
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub requested_data_keys: BTreeSet<String>,
}

impl FlowResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the request amounts
    pub fn update_request_amounts(&mut self, amounts: Amounts) -> &mut Self {
        self.updated_request_amounts = Some(amounts);
        self
    }

    /// Add a basket to the request
    pub fn set_additional_basket(&mut self, basket: Basket) -> &mut Self {
        self.additional_basket = Some(basket);
        self
    }

    /// Declare changes to an existing basket
    pub fn set_modified_basket(&mut self, modification: BasketModification) -> &mut Self {
        self.modified_basket = Some(modification);
        self
    }

    /// Record amounts this participant collected itself
    pub fn record_amounts_paid(&mut self, amounts: Amounts, method: impl Into<String>) -> &mut Self {
        self.amounts_paid = Some(AmountsPaid {
            amounts,
            method: method.into(),
        });
        self
    }

    /// Request cancellation of the transaction
    pub fn request_cancellation(&mut self) -> &mut Self {
        self.cancel_transaction = true;
        self
    }

    /// Attach a reference entry
    pub fn add_reference(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> &mut Self {
        self.references.insert(key, value);
        self
    }

    /// Ask for a data key to be delivered in later stages
    pub fn request_data_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.requested_data_keys.insert(key.into());
        self
    }

    /// Whether this response declares no changes at all ("skip")
    pub fn is_empty(&self) -> bool {
        self.updated_request_amounts.is_none()
            && self.additional_basket.is_none()
            && self.modified_basket.is_none()
            && self.amounts_paid.is_none()
            && !self.cancel_transaction
            && self.references.is_empty()
            && self.requested_data_keys.is_empty()
    }

    /// Validate the internal consistency of this response
    ///
    /// Raised synchronously before the response may leave the participant;
    /// a failure rejects this response only, not the whole flow.
    pub fn validate(&self) -> FlowResult<()> {
        if let (Some(updated), Some(paid)) = (&self.updated_request_amounts, &self.amounts_paid) {
            updated.require_same_currency(&paid.amounts)?;
            if paid.amounts.total() > updated.total() {
                return Err(FlowError::PaidExceedsRequested {
                    paid: paid.amounts.total(),
                    requested: updated.total(),
                });
            }
        }

        if let Some(modification) = &self.modified_basket {
            let mut currency: Option<&str> = None;
            for item in &modification.items {
                match currency {
                    None => currency = Some(&item.amount.currency),
                    Some(expected) if expected != item.amount.currency => {
                        return Err(FlowError::currency_mismatch(
                            expected,
                            item.amount.currency.clone(),
                        ));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }

    /// Validate, including stage-dependent rules
    pub fn validate_for_stage(&self, stage: FlowStage) -> FlowResult<()> {
        self.validate()?;
        if self.cancel_transaction && !stage.can_cancel_transaction() {
            return Err(FlowError::CancelNotAllowed(stage.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amounts::Amount;

    #[test]
    fn test_empty_response_is_a_skip() {
        let response = FlowResponse::new();
        assert!(response.is_empty());
        assert!(response.validate().is_ok());
    }

    #[test]
    fn test_paid_exceeding_updated_amounts_fails() {
        let mut response = FlowResponse::new();
        response
            .update_request_amounts(Amounts::new(1000, "GBP"))
            .record_amounts_paid(Amounts::new(2000, "GBP"), "loyalty");

        assert!(matches!(
            response.validate(),
            Err(FlowError::PaidExceedsRequested {
                paid: 2000,
                requested: 1000
            })
        ));
    }

    #[test]
    fn test_paid_currency_mismatch_fails() {
        let mut response = FlowResponse::new();
        response
            .update_request_amounts(Amounts::new(1000, "EUR"))
            .record_amounts_paid(Amounts::new(500, "GBP"), "loyalty");

        assert!(matches!(
            response.validate(),
            Err(FlowError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_paid_within_updated_amounts_passes() {
        let mut response = FlowResponse::new();
        response
            .update_request_amounts(Amounts::new(1000, "GBP"))
            .record_amounts_paid(Amounts::new(1000, "GBP"), "voucher");

        assert!(response.validate().is_ok());
    }

    #[test]
    fn test_cancel_only_from_cancellable_stages() {
        let mut response = FlowResponse::new();
        response.request_cancellation();

        assert!(response.validate_for_stage(FlowStage::Split).is_ok());
        assert!(response.validate_for_stage(FlowStage::PreTransaction).is_ok());
        assert!(matches!(
            response.validate_for_stage(FlowStage::PostTransaction),
            Err(FlowError::CancelNotAllowed(_))
        ));
    }

    #[test]
    fn test_modified_basket_currency_consistency() {
        let mut response = FlowResponse::new();
        response.set_modified_basket(BasketModification {
            basket_id: "main".into(),
            items: vec![
                BasketItem::new("a", "A", Amount::new(100, "GBP"), 1),
                BasketItem::new("b", "B", Amount::new(100, "EUR"), 1),
            ],
            paid_with: None,
        });

        assert!(matches!(
            response.validate(),
            Err(FlowError::CurrencyMismatch { .. })
        ));
    }
}
