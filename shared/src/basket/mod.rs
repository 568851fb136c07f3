//! Itemized baskets
//!
//! A basket is the line-item representation of a monetary amount. Item
//! order is display order; item identity is the item id, and quantity is
//! the unit of reconciliation. No operation can ever produce a negative
//! quantity; excess removal clamps at zero.

use crate::amounts::Amount;
use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};

/// A single basket line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketItem {
    /// Stable id per logical item
    pub id: String,
    /// Customer-facing label
    pub label: String,
    /// Optional reporting category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Per-unit price
    pub amount: Amount,
    /// Unit count, never negative
    pub quantity: i64,
}

impl BasketItem {
    /// Create a new line; negative quantities clamp to zero
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        amount: Amount,
        quantity: i64,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category: None,
            amount,
            quantity: quantity.max(0),
        }
    }

    /// Set the reporting category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Line total: unit price times quantity
    pub fn total_value(&self) -> i64 {
        self.amount.value * self.quantity
    }

    /// Copy of this line with a different quantity (clamped at zero)
    pub fn with_quantity(&self, quantity: i64) -> Self {
        let mut item = self.clone();
        item.quantity = quantity.max(0);
        item
    }
}

/// An ordered collection of basket lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    /// Basket id, unique within a payment
    pub id: String,
    /// Display name
    pub name: String,
    /// Lines in display order
    pub items: Vec<BasketItem>,
}

impl Basket {
    /// Create an empty basket with a generated id
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), name)
    }

    /// Create an empty basket with an explicit id
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Currency of this basket, taken from the first line
    pub fn currency(&self) -> Option<&str> {
        self.items.first().map(|item| item.amount.currency.as_str())
    }

    /// Append lines; a line with an id already present merges quantities
    /// instead of duplicating the entry
    pub fn add_items(&mut self, items: impl IntoIterator<Item = BasketItem>) -> FlowResult<()> {
        for item in items {
            if let Some(currency) = self.currency()
                && currency != item.amount.currency
            {
                return Err(FlowError::currency_mismatch(
                    currency,
                    item.amount.currency.clone(),
                ));
            }
            match self.items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => existing.quantity += item.quantity,
                None => self.items.push(item),
            }
        }
        Ok(())
    }

    /// Add a single unit of the given item
    pub fn add_one_of(&mut self, item: &BasketItem) -> FlowResult<()> {
        self.add_items([item.with_quantity(1)])
    }

    /// Remove a single unit of the item with the given id
    ///
    /// With `retain_if_zero` the line stays as a zero-quantity placeholder
    /// once the last unit is removed; otherwise it is deleted.
    pub fn remove_one_of(&mut self, item_id: &str, retain_if_zero: bool) -> i64 {
        self.remove_units(item_id, 1, retain_if_zero)
    }

    /// Remove up to `item.quantity` units of the matching line
    ///
    /// Removing more than present clamps at zero. Returns the number of
    /// units actually removed.
    pub fn remove_items(&mut self, item: &BasketItem, retain_if_zero: bool) -> i64 {
        self.remove_units(&item.id, item.quantity, retain_if_zero)
    }

    fn remove_units(&mut self, item_id: &str, quantity: i64, retain_if_zero: bool) -> i64 {
        let quantity = quantity.max(0);
        let Some(index) = self.items.iter().position(|item| item.id == item_id) else {
            return 0;
        };

        let line = &mut self.items[index];
        let removed = quantity.min(line.quantity);
        line.quantity -= removed;
        if removed < quantity {
            tracing::warn!(
                item_id,
                requested = quantity,
                removed,
                "basket removal clamped at zero"
            );
        }
        if line.quantity == 0 && !retain_if_zero {
            self.items.remove(index);
        }
        removed
    }

    /// Find a line by id
    pub fn item_by_id(&self, item_id: &str) -> Option<&BasketItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Sum of all line totals
    pub fn total_value(&self) -> i64 {
        self.items.iter().map(BasketItem::total_value).sum()
    }

    /// Sum of all unit counts
    pub fn total_units(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Split into two baskets of ⌊N/2⌋ and ⌈N/2⌉ units
    ///
    /// Walks lines in display order, handing whole lines to the first half
    /// until the next line would push it past ⌊N/2⌋, then splits that line
    /// across both halves. Deterministic and order-stable for identical
    /// input; lines that end up empty on one side are omitted there.
    pub fn split_in_half(&self) -> (Basket, Basket) {
        let target = self.total_units() / 2;
        let mut first = Basket::with_id(format!("{}-a", self.id), self.name.clone());
        let mut second = Basket::with_id(format!("{}-b", self.id), self.name.clone());

        let mut running = 0;
        for item in &self.items {
            let to_first = item.quantity.min(target - running);
            if to_first > 0 {
                first.items.push(item.with_quantity(to_first));
                running += to_first;
            }
            let to_second = item.quantity - to_first;
            if to_second > 0 {
                second.items.push(item.with_quantity(to_second));
            }
        }

        (first, second)
    }
}
