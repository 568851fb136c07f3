//! Typed additional-data bag
//!
//! Requests, responses and transaction references all carry an open set of
//! key/value pairs next to the structured fields. Values are typed rather
//! than free-form JSON so well-known keys stay machine-checkable, with
//! [`DataValue::Json`] as the escape hatch for anything a participant wants
//! to pass through untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known data keys
///
/// Unknown keys are legal and pass through every stage untouched; these
/// constants only name the keys the framework itself understands.
pub mod keys {
    /// Merchant identifier as configured on the device
    pub const MERCHANT_ID: &str = "merchant_id";
    /// Terminal identifier as configured on the device
    pub const TERMINAL_ID: &str = "terminal_id";
    /// Customer identifier, when known
    pub const CUSTOMER_ID: &str = "customer_id";
    /// Opaque card token produced by a card reading stage
    pub const CARD_TOKEN: &str = "card_token";
    /// ISO language tag for customer-facing text
    pub const TRANSACTION_LANGUAGE: &str = "transaction_language";
    /// Free-form line appended to the customer receipt
    pub const RECEIPT_TEXT: &str = "receipt_text";
}

/// A single typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DataValue {
    /// UTF-8 text
    Text(String),
    /// 64-bit integer
    Integer(i64),
    /// Boolean flag
    Boolean(bool),
    /// Opaque JSON, passed through untouched
    Json(serde_json::Value),
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Ordered key/value bag attached to requests and responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdditionalData(BTreeMap<String, DataValue>);

impl AdditionalData {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.0.get(key)
    }

    /// Get a text value by key
    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(DataValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer value by key
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(DataValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get a boolean value by key
    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(DataValue::Boolean(v)) => Some(*v),
            _ => None,
        }
    }

    /// Remove a value by key
    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        self.0.remove(key)
    }

    /// Merge another bag into this one; colliding keys take the new value,
    /// unknown keys pass through untouched
    pub fn merge(&mut self, other: &AdditionalData) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let mut data = AdditionalData::new();
        data.insert(keys::MERCHANT_ID, "M-001");
        data.insert("retry_count", 3i64);
        data.insert("contactless", true);

        assert_eq!(data.get_text(keys::MERCHANT_ID), Some("M-001"));
        assert_eq!(data.get_integer("retry_count"), Some(3));
        assert_eq!(data.get_boolean("contactless"), Some(true));
        // Wrong type reads as absent
        assert_eq!(data.get_integer(keys::MERCHANT_ID), None);
    }

    #[test]
    fn test_unknown_keys_pass_through_merge() {
        let mut base = AdditionalData::new().with_value(keys::TERMINAL_ID, "T-9");
        let incoming = AdditionalData::new()
            .with_value("vendor_x_custom", DataValue::Json(serde_json::json!({"a": 1})))
            .with_value(keys::TERMINAL_ID, "T-10");

        base.merge(&incoming);

        assert_eq!(base.get_text(keys::TERMINAL_ID), Some("T-10"));
        assert!(base.contains_key("vendor_x_custom"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let data = AdditionalData::new()
            .with_value(keys::CARD_TOKEN, "tok_123")
            .with_value("attempts", 2i64);

        let json = serde_json::to_string(&data).unwrap();
        let back: AdditionalData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }
}
