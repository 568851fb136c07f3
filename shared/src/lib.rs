//! Shared types for the payment flow framework
//!
//! Domain model and engines used by every flow participant: monetary
//! amounts, baskets, the transaction ledger, split reconciliation, the
//! stage response contract and the wire message envelope.

pub mod amounts;
pub mod basket;
pub mod data;
pub mod error;
pub mod message;
pub mod payment;
pub mod response;
pub mod split;
pub mod stage;
pub mod transaction;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use amounts::{Amount, Amounts, AmountsModifier};
pub use basket::{Basket, BasketItem};
pub use error::{ErrorCode, FlowError, FlowResult};
pub use message::{AppMessage, MessageType};
pub use response::FlowResponse;
pub use split::{SplitBasketHelper, SplitRequest};
pub use stage::FlowStage;
pub use transaction::{Transaction, TransactionOutcome, TransactionResponse};
