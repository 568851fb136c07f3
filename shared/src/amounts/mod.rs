//! Monetary amounts
//!
//! All values are `i64` minor units (pennies, cents) in a single currency.
//! An [`Amounts`] instance is a base amount plus named additional amounts
//! (tip, cashback, ...); derived copies are produced through
//! [`AmountsModifier`], never by mutating a published instance.
//!
//! Combining amounts of different currencies anywhere in the framework
//! fails with a currency mismatch error; the only legal way to change a
//! currency is [`AmountsModifier::change_currency`].

use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod modifier;

pub use modifier::AmountsModifier;

/// Well-known additional amount names
pub mod names {
    /// Gratuity added on top of the base amount
    pub const TIP: &str = "tip";
    /// Cash handed out with a card payment
    pub const CASHBACK: &str = "cashback";
    /// Fee added by the merchant or acquirer
    pub const SURCHARGE: &str = "surcharge";
    /// Donation collected with the payment
    pub const CHARITY_DONATION: &str = "charity_donation";
}

/// A single monetary value with its currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Value in minor currency units
    pub value: i64,
    /// ISO 4217 currency code
    pub currency: String,
}

impl Amount {
    /// Create a new amount; negative values are clamped to zero
    pub fn new(value: i64, currency: impl Into<String>) -> Self {
        Self {
            value: value.max(0),
            currency: currency.into(),
        }
    }

    /// Zero in the given currency
    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0, currency)
    }
}

/// Monetary totals for a request, transaction or response
///
/// Invariant: every component shares [`Amounts::currency`];
/// `total() = base_amount + sum(additional_amounts)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amounts {
    /// Base amount in minor currency units
    pub base_amount: i64,
    /// Named additional amounts (name unique), minor units
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_amounts: BTreeMap<String, i64>,
    /// ISO 4217 currency code
    pub currency: String,
    /// Currency before the first conversion; set once, never overwritten
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_currency: Option<String>,
    /// Rate used for the most recent conversion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<f64>,
}

impl Amounts {
    /// Create amounts with a base value only; negative bases clamp to zero
    pub fn new(base_amount: i64, currency: impl Into<String>) -> Self {
        Self {
            base_amount: base_amount.max(0),
            additional_amounts: BTreeMap::new(),
            currency: currency.into(),
            original_currency: None,
            exchange_rate: None,
        }
    }

    /// Zero in the given currency
    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0, currency)
    }

    /// Total of base and all additional amounts
    pub fn total(&self) -> i64 {
        self.base_amount + self.additional_total()
    }

    /// Sum of the additional amounts only
    pub fn additional_total(&self) -> i64 {
        self.additional_amounts.values().sum()
    }

    /// Value of a named additional amount, zero when absent
    pub fn additional_amount(&self, name: &str) -> i64 {
        self.additional_amounts.get(name).copied().unwrap_or(0)
    }

    /// Collapse to a single [`Amount`] carrying the total
    pub fn to_amount(&self) -> Amount {
        Amount::new(self.total(), self.currency.clone())
    }

    /// Fail with [`FlowError::CurrencyMismatch`] unless `other` shares this currency
    pub fn require_same_currency(&self, other: &Amounts) -> FlowResult<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(FlowError::currency_mismatch(
                self.currency.clone(),
                other.currency.clone(),
            ))
        }
    }

    /// Component-wise addition; additional amounts with the same name sum
    pub fn checked_add(&self, other: &Amounts) -> FlowResult<Amounts> {
        self.require_same_currency(other)?;

        let mut result = self.clone();
        result.base_amount += other.base_amount;
        for (name, value) in &other.additional_amounts {
            *result.additional_amounts.entry(name.clone()).or_insert(0) += value;
        }
        // Conversion metadata does not survive aggregation
        result.original_currency = None;
        result.exchange_rate = None;
        Ok(result)
    }

    /// Component-wise subtraction, each component floor-clamped at zero
    ///
    /// Additional amounts present only in `other` are ignored (there is
    /// nothing left to reduce).
    pub fn saturating_sub(&self, other: &Amounts) -> FlowResult<Amounts> {
        self.require_same_currency(other)?;

        let mut result = self.clone();
        result.base_amount = (result.base_amount - other.base_amount).max(0);
        for (name, value) in result.additional_amounts.iter_mut() {
            *value = (*value - other.additional_amount(name)).max(0);
        }
        result.original_currency = None;
        result.exchange_rate = None;
        Ok(result)
    }
}
