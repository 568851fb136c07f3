//! Last-response store
//!
//! Keeps the most recent terminal response per correlation id so the
//! orchestrator can answer reversal and redelivery lookups. The store is
//! an explicitly constructed value with a caller-defined lifetime
//! (per-process or per-session) and is shared via `Arc`; there is no
//! process-wide static.

use dashmap::DashMap;
use shared::stage::FlowStage;
use shared::util::now_millis;

/// One stored terminal response
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    /// Stage that produced the response
    pub stage: FlowStage,
    /// Serialized response payload
    pub payload: String,
    /// Unix milliseconds when the response was stored
    pub stored_at: i64,
}

/// Lock-free store of the latest response per correlation id
#[derive(Debug, Default)]
pub struct ResponseStore {
    responses: DashMap<String, StoredResponse>,
}

impl ResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivered response; a later response for the same key
    /// replaces the earlier one
    pub fn record(&self, correlation_id: impl Into<String>, stage: FlowStage, payload: impl Into<String>) {
        self.responses.insert(
            correlation_id.into(),
            StoredResponse {
                stage,
                payload: payload.into(),
                stored_at: now_millis(),
            },
        );
    }

    /// Latest response for the key, if any
    pub fn latest(&self, correlation_id: &str) -> Option<StoredResponse> {
        self.responses.get(correlation_id).map(|entry| entry.clone())
    }

    /// Remove and return the latest response for the key
    pub fn take(&self, correlation_id: &str) -> Option<StoredResponse> {
        self.responses.remove(correlation_id).map(|(_, value)| value)
    }

    /// Drop everything; called when the owning scope ends
    pub fn clear(&self) {
        self.responses.clear();
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_response_wins() {
        let store = ResponseStore::new();
        store.record("txn-1", FlowStage::TransactionProcessing, "{\"attempt\":1}");
        store.record("txn-1", FlowStage::TransactionProcessing, "{\"attempt\":2}");

        let stored = store.latest("txn-1").unwrap();
        assert_eq!(stored.payload, "{\"attempt\":2}");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_take_removes_the_entry() {
        let store = ResponseStore::new();
        store.record("txn-1", FlowStage::Generic, "{}");

        assert!(store.take("txn-1").is_some());
        assert!(store.latest("txn-1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_empties_the_store() {
        let store = ResponseStore::new();
        store.record("a", FlowStage::PreFlow, "{}");
        store.record("b", FlowStage::PostFlow, "{}");

        store.clear();
        assert!(store.is_empty());
    }
}
