//! Split reconciliation
//!
//! A split divides one payment into multiple transactions, each potentially
//! handled independently. [`SplitRequest`] tracks what has been executed so
//! far; [`SplitBasketHelper`] assists a split-capable app in carving out
//! the next sub-payment by basket items, without ever re-charging items a
//! prior leg already paid for.

use crate::amounts::Amounts;
use crate::basket::Basket;
use crate::error::{FlowError, FlowResult};
use crate::payment::Payment;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Request payload of the SPLIT stage
///
/// Created once per payment when the split stage is first entered;
/// transactions accumulate monotonically as each leg completes and are
/// never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRequest {
    /// The payment being split
    pub source_payment: Payment,
    /// Full amounts the payment asks to collect
    pub total_amounts: Amounts,
    /// Transactions executed so far, append-only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<Transaction>,
}

impl SplitRequest {
    /// Start splitting the given payment
    pub fn from_payment(payment: Payment) -> Self {
        let total_amounts = payment.amounts.clone();
        Self {
            source_payment: payment,
            total_amounts,
            transactions: Vec::new(),
        }
    }

    /// True before any leg has executed
    pub fn is_first_split(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Record a completed leg
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Sum of processed amounts across all legs
    pub fn processed_amounts(&self) -> FlowResult<Amounts> {
        let mut processed = Amounts::zero(self.total_amounts.currency.clone());
        for transaction in &self.transactions {
            processed = processed.checked_add(&transaction.processed_amounts()?)?;
        }
        Ok(processed)
    }

    /// What is still left to pay, component-wise, clamped at zero
    pub fn remaining_amounts(&self) -> FlowResult<Amounts> {
        let processed = self.processed_amounts()?;
        self.total_amounts.saturating_sub(&processed)
    }
}

/// Helper for carving the next split leg out of a basket
///
/// Holds two baskets: "remaining" starts as the source basket minus
/// everything prior fully-satisfied legs paid for, and "next split"
/// receives the units the app moves over for the upcoming leg. Transfers
/// always retain zeroed lines in "remaining" so the original basket stays
/// auditable.
#[derive(Debug, Clone)]
pub struct SplitBasketHelper {
    remaining: Basket,
    next_split: Basket,
    currency: String,
}

impl SplitBasketHelper {
    /// Build the helper from a split request
    ///
    /// Fails with `UnsupportedOperation` when the source payment carries no
    /// basket. With `retain_zero_quantity_remaining` fully-paid lines stay
    /// in "remaining" as zero-quantity placeholders (so a payer-facing UI
    /// can still show them); otherwise they are dropped.
    pub fn from_split_request(
        split_request: &SplitRequest,
        retain_zero_quantity_remaining: bool,
    ) -> FlowResult<Self> {
        let source = split_request.source_payment.basket.as_ref().ok_or_else(|| {
            FlowError::UnsupportedOperation(
                "cannot build a split basket helper for a payment with no basket".into(),
            )
        })?;

        let mut remaining = source.clone();
        for transaction in &split_request.transactions {
            // TODO: what if a leg was only partially fulfilled - currently
            // treated as if nothing was paid (see DESIGN.md)
            if !transaction.fully_processed()? {
                tracing::debug!(
                    transaction_id = %transaction.id,
                    "skipping partially fulfilled transaction in paid-item subtraction"
                );
                continue;
            }
            for basket in &transaction.baskets {
                for item in &basket.items {
                    remaining.remove_items(item, retain_zero_quantity_remaining);
                }
            }
        }

        Ok(Self {
            remaining,
            next_split: Basket::new("next_split"),
            currency: split_request.total_amounts.currency.clone(),
        })
    }

    /// Move units of an item from "remaining" into "next split"
    ///
    /// Moving more units than remain clamps to what is there; the zeroed
    /// line always stays in "remaining". Returns the units actually moved.
    pub fn transfer_to_next_split(&mut self, item_id: &str, quantity: i64) -> FlowResult<i64> {
        let line = self
            .remaining
            .item_by_id(item_id)
            .cloned()
            .ok_or_else(|| FlowError::BasketItemNotFound(item_id.to_string()))?;

        let moved = quantity.max(0).min(line.quantity);
        if moved == 0 {
            return Ok(0);
        }

        self.remaining.remove_items(&line.with_quantity(moved), true);
        self.next_split.add_items([line.with_quantity(moved)])?;
        Ok(moved)
    }

    /// What is left to pay for after prior legs and pending transfers
    pub fn remaining_basket(&self) -> &Basket {
        &self.remaining
    }

    /// The basket for the upcoming leg
    pub fn next_split_basket(&self) -> &Basket {
        &self.next_split
    }

    /// Amounts for the upcoming leg, derived from the next-split basket
    pub fn next_split_amounts(&self) -> Amounts {
        Amounts::new(self.next_split.total_value(), self.currency.clone())
    }

    /// Whether every unit of the source basket is now paid for or carved out
    pub fn all_units_transferred(&self) -> bool {
        self.remaining.total_units() == 0
    }
}
