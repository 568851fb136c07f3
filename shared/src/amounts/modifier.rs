//! Amounts builder/modifier
//!
//! The only supported way to derive a new [`Amounts`] from an existing one.
//! Mutations enforce the validation rules; [`AmountsModifier::build`]
//! returns an immutable snapshot.

use super::Amounts;
use crate::error::{FlowError, FlowResult};
use rust_decimal::prelude::*;
use std::collections::BTreeMap;

/// Builder for deriving new [`Amounts`] values
#[derive(Debug, Clone)]
pub struct AmountsModifier {
    base_amount: i64,
    additional_amounts: BTreeMap<String, i64>,
    currency: String,
    original_currency: Option<String>,
    exchange_rate: Option<f64>,
}

impl AmountsModifier {
    /// Start from zero in the given currency
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            base_amount: 0,
            additional_amounts: BTreeMap::new(),
            currency: currency.into(),
            original_currency: None,
            exchange_rate: None,
        }
    }

    /// Start from an existing snapshot
    pub fn from_amounts(amounts: &Amounts) -> Self {
        Self {
            base_amount: amounts.base_amount,
            additional_amounts: amounts.additional_amounts.clone(),
            currency: amounts.currency.clone(),
            original_currency: amounts.original_currency.clone(),
            exchange_rate: amounts.exchange_rate,
        }
    }

    /// Replace the base amount
    ///
    /// Negative values are ignored without error (soft-fail policy).
    pub fn update_base_amount(&mut self, new_base: i64) -> &mut Self {
        if new_base < 0 {
            tracing::warn!(new_base, "ignoring negative base amount update");
        } else {
            self.base_amount = new_base;
        }
        self
    }

    /// Add a (possibly negative) delta to the base amount, floor-clamped at zero
    pub fn offset_base_amount(&mut self, delta: i64) -> &mut Self {
        self.base_amount = (self.base_amount + delta).max(0);
        self
    }

    /// Set a named additional amount
    ///
    /// Negative values are ignored without error. Replacing an existing
    /// value with a smaller one requires `allow_reduction`, otherwise the
    /// call fails and leaves the modifier untouched.
    pub fn set_additional_amount(
        &mut self,
        name: impl Into<String>,
        value: i64,
        allow_reduction: bool,
    ) -> FlowResult<&mut Self> {
        let name = name.into();
        if value < 0 {
            tracing::warn!(%name, value, "ignoring negative additional amount");
            return Ok(self);
        }

        if let Some(existing) = self.additional_amounts.get(&name)
            && value < *existing
            && !allow_reduction
        {
            return Err(FlowError::InvalidArgument(format!(
                "setting additional amount '{}' to {} would reduce it from {}",
                name, value, existing
            )));
        }

        self.additional_amounts.insert(name, value);
        Ok(self)
    }

    /// Convert every component to a new currency
    ///
    /// Each component is multiplied by `rate` and rounded to the nearest
    /// minor unit, half away from zero. The original currency is recorded
    /// the first time only; repeated conversions keep it.
    pub fn change_currency(&mut self, currency: impl Into<String>, rate: f64) -> FlowResult<&mut Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(FlowError::InvalidExchangeRate(rate));
        }
        let rate_dec =
            Decimal::from_f64(rate).ok_or(FlowError::InvalidExchangeRate(rate))?;

        let base = convert_minor_units(self.base_amount, rate_dec, rate)?;
        let mut additional = BTreeMap::new();
        for (name, value) in &self.additional_amounts {
            additional.insert(name.clone(), convert_minor_units(*value, rate_dec, rate)?);
        }

        let previous_currency = std::mem::replace(&mut self.currency, currency.into());
        self.original_currency.get_or_insert(previous_currency);
        self.exchange_rate = Some(rate);
        self.base_amount = base;
        self.additional_amounts = additional;
        Ok(self)
    }

    /// Return the immutable snapshot
    pub fn build(&self) -> Amounts {
        Amounts {
            base_amount: self.base_amount,
            additional_amounts: self.additional_amounts.clone(),
            currency: self.currency.clone(),
            original_currency: self.original_currency.clone(),
            exchange_rate: self.exchange_rate,
        }
    }
}

/// Multiply minor units by a rate, rounding half away from zero
fn convert_minor_units(value: i64, rate: Decimal, raw_rate: f64) -> FlowResult<i64> {
    (Decimal::from(value) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(FlowError::InvalidExchangeRate(raw_rate))
}
