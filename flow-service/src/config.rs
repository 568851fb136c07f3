//! Service configuration
//!
//! Merchant/terminal identifiers and declared capabilities gate which
//! stages a service is handed; the framework treats all of them as opaque
//! strings.
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | FLOW_SERVICE_ID | flow-service | Unique service id |
//! | FLOW_SERVICE_NAME | Flow Service | Display name |
//! | FLOW_SERVICE_VENDOR | (empty) | Vendor name |
//! | MERCHANT_ID | (empty) | Merchant identifier |
//! | TERMINAL_ID | (empty) | Terminal identifier |
//! | HANDLED_STAGES | all stages | Comma-separated stage wire names |
//! | SUPPORTED_FLOW_TYPES | (empty = all) | Comma-separated flow types |
//! | SUPPORTED_PAYMENT_METHODS | (empty = all) | Comma-separated methods |
//! | SUPPORTED_CURRENCIES | (empty = all) | Comma-separated ISO codes |
//! | SUPPORTED_REQUEST_TYPES | (empty = all) | Generic request types |

use shared::stage::FlowStage;

/// Capabilities and identity of one participant service
#[derive(Debug, Clone)]
pub struct FlowServiceConfig {
    /// Unique service id
    pub service_id: String,
    /// Display name
    pub display_name: String,
    /// Vendor name
    pub vendor: String,
    /// Service version, reported on every envelope
    pub version: String,
    /// Merchant identifier (opaque)
    pub merchant_id: String,
    /// Terminal identifier (opaque)
    pub terminal_id: String,
    /// Stages this service handles
    pub handled_stages: Vec<FlowStage>,
    /// Flow types this service accepts; empty means all
    pub supported_flow_types: Vec<String>,
    /// Payment methods this service can collect; empty means all
    pub supported_payment_methods: Vec<String>,
    /// Currencies this service can process; empty means all
    pub supported_currencies: Vec<String>,
    /// Generic request types this service answers; empty means all
    pub supported_request_types: Vec<String>,
}

impl FlowServiceConfig {
    /// Load configuration from environment variables, using defaults for
    /// anything unset
    pub fn from_env() -> Self {
        Self {
            service_id: std::env::var("FLOW_SERVICE_ID").unwrap_or_else(|_| "flow-service".into()),
            display_name: std::env::var("FLOW_SERVICE_NAME")
                .unwrap_or_else(|_| "Flow Service".into()),
            vendor: std::env::var("FLOW_SERVICE_VENDOR").unwrap_or_default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            merchant_id: std::env::var("MERCHANT_ID").unwrap_or_default(),
            terminal_id: std::env::var("TERMINAL_ID").unwrap_or_default(),
            handled_stages: parse_stages(std::env::var("HANDLED_STAGES").ok().as_deref()),
            supported_flow_types: parse_csv(std::env::var("SUPPORTED_FLOW_TYPES").ok().as_deref()),
            supported_payment_methods: parse_csv(
                std::env::var("SUPPORTED_PAYMENT_METHODS").ok().as_deref(),
            ),
            supported_currencies: parse_csv(std::env::var("SUPPORTED_CURRENCIES").ok().as_deref()),
            supported_request_types: parse_csv(
                std::env::var("SUPPORTED_REQUEST_TYPES").ok().as_deref(),
            ),
        }
    }

    /// Override the identity and handled stages
    ///
    /// Mostly useful in tests.
    pub fn with_overrides(service_id: impl Into<String>, handled_stages: Vec<FlowStage>) -> Self {
        let mut config = Self::from_env();
        config.service_id = service_id.into();
        config.handled_stages = handled_stages;
        config
    }

    /// Whether this service handles the given stage
    pub fn handles_stage(&self, stage: FlowStage) -> bool {
        self.handled_stages.contains(&stage)
    }

    /// Whether this service accepts the given flow type
    pub fn supports_flow_type(&self, flow_type: &str) -> bool {
        self.supported_flow_types.is_empty()
            || self.supported_flow_types.iter().any(|t| t == flow_type)
    }

    /// Whether this service can collect with the given payment method
    pub fn supports_payment_method(&self, method: &str) -> bool {
        self.supported_payment_methods.is_empty()
            || self.supported_payment_methods.iter().any(|m| m == method)
    }

    /// Whether this service can process the given currency
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.supported_currencies.is_empty()
            || self.supported_currencies.iter().any(|c| c == currency)
    }

    /// Whether this service answers the given generic request type
    pub fn supports_request_type(&self, request_type: &str) -> bool {
        self.supported_request_types.is_empty()
            || self.supported_request_types.iter().any(|t| t == request_type)
    }
}

fn parse_csv(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_stages(value: Option<&str>) -> Vec<FlowStage> {
    match value {
        None => vec![
            FlowStage::PreFlow,
            FlowStage::Split,
            FlowStage::PreTransaction,
            FlowStage::PaymentCardReading,
            FlowStage::PostCardReading,
            FlowStage::TransactionProcessing,
            FlowStage::PostTransaction,
            FlowStage::PostFlow,
            FlowStage::Generic,
            FlowStage::StatusUpdate,
        ],
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match entry.parse() {
                Ok(stage) => Some(stage),
                Err(_) => {
                    tracing::warn!(stage = entry, "ignoring unknown stage in HANDLED_STAGES");
                    None
                }
            })
            .collect(),
    }
}
