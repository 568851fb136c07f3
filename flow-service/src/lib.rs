//! Payment flow participant runtime
//!
//! Everything a flow or payment app needs to take part in a staged payment
//! flow: service configuration, the stage router with its dispatch
//! boundary, the participant-side stage session (ack, single terminal
//! response, audit cap, cancellation), the orchestrator-side exchange
//! sequencing, response merging and the injectable last-response store.

pub mod config;
pub mod error;
pub mod exchange;
pub mod merge;
pub mod session;
pub mod stages;
pub mod store;

pub use config::FlowServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use exchange::{ExchangeEvent, StageExchange, StageOutcome};
pub use session::{SendOutcome, StageSession};
pub use stages::{StageContext, StageHandler, StageModel, StageRouter};
pub use store::ResponseStore;

/// Initialize tracing with an env-filter subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
