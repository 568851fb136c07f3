//! Stage-scoped mutation models
//!
//! One generic model carries the flow-response contract for every stage
//! that answers with a [`FlowResponse`]; card reading, transaction
//! processing, generic and status-update stages get their own focused
//! models. Stage-dependent rules (who may cancel) are enforced when the
//! response is validated, before it leaves the participant.

use crate::error::ServiceResult;
use crate::session::{SendOutcome, StageSession};
use shared::amounts::Amounts;
use shared::basket::Basket;
use shared::data::{AdditionalData, DataValue};
use shared::error::FlowResult;
use shared::payment::{
    Card, CardResponse, CardTransaction, FlowSummary, GenericRequest, GenericResponse, Payment,
    StatusUpdateRequest,
};
use shared::response::{BasketModification, FlowResponse};
use shared::split::{SplitBasketHelper, SplitRequest};
use shared::stage::FlowStage;
use shared::transaction::{Transaction, TransactionResponse};
use std::sync::Arc;

/// Generic model for stages whose terminal message is a [`FlowResponse`]
///
/// `R` is the stage request type; the response contract is identical
/// across these stages, so one parameterized model replaces a hierarchy of
/// per-stage types.
pub struct FlowResponseModel<R> {
    stage: FlowStage,
    /// The deserialized stage request
    pub request: R,
    response: FlowResponse,
    session: Arc<StageSession>,
}

impl<R> FlowResponseModel<R> {
    pub(crate) fn new(stage: FlowStage, request: R, session: Arc<StageSession>) -> Self {
        Self {
            stage,
            request,
            response: FlowResponse::new(),
            session,
        }
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    /// Replace the request amounts
    pub fn update_request_amounts(&mut self, amounts: Amounts) -> &mut Self {
        self.response.update_request_amounts(amounts);
        self
    }

    /// Add a basket to the request
    pub fn set_additional_basket(&mut self, basket: Basket) -> &mut Self {
        self.response.set_additional_basket(basket);
        self
    }

    /// Declare changes to an existing basket
    pub fn modify_basket(&mut self, modification: BasketModification) -> &mut Self {
        self.response.set_modified_basket(modification);
        self
    }

    /// Record amounts this participant collected itself
    pub fn record_amounts_paid(&mut self, amounts: Amounts, method: impl Into<String>) -> &mut Self {
        self.response.record_amounts_paid(amounts, method);
        self
    }

    /// Request cancellation of the transaction
    ///
    /// Only legal from SPLIT and PRE_TRANSACTION; validation rejects the
    /// response anywhere else.
    pub fn cancel_flow(&mut self) -> &mut Self {
        self.response.request_cancellation();
        self
    }

    /// Attach a reference entry
    pub fn add_reference(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> &mut Self {
        self.response.add_reference(key, value);
        self
    }

    /// Ask for a data key to be delivered in later stages
    pub fn request_data_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.response.request_data_key(key);
        self
    }

    /// Current state of the response being built
    pub fn response(&self) -> &FlowResponse {
        &self.response
    }

    /// Validate and send the built response
    pub async fn finish(self) -> ServiceResult<SendOutcome> {
        self.response.validate_for_stage(self.stage)?;
        self.session.send_response(&self.response).await
    }

    /// Send an empty response, declaring no changes
    pub async fn skip(self) -> ServiceResult<SendOutcome> {
        self.session.send_response(&FlowResponse::new()).await
    }
}

impl FlowResponseModel<SplitRequest> {
    /// Build the basket reconciliation helper for this split request
    pub fn basket_helper(&self, retain_zero_quantity_remaining: bool) -> FlowResult<SplitBasketHelper> {
        SplitBasketHelper::from_split_request(&self.request, retain_zero_quantity_remaining)
    }
}

/// Model for the PAYMENT_CARD_READING stage
pub struct CardReadingModel {
    /// The transaction the card is being read for
    pub request: Transaction,
    card: Card,
    references: AdditionalData,
    session: Arc<StageSession>,
}

impl CardReadingModel {
    pub(crate) fn new(request: Transaction, session: Arc<StageSession>) -> Self {
        Self {
            request,
            card: Card::default(),
            references: AdditionalData::new(),
            session,
        }
    }

    pub fn set_card_token(&mut self, token: impl Into<String>) -> &mut Self {
        self.card.card_token = Some(token.into());
        self
    }

    pub fn set_masked_pan(&mut self, masked_pan: impl Into<String>) -> &mut Self {
        self.card.masked_pan = Some(masked_pan.into());
        self
    }

    pub fn set_expiry_date(&mut self, expiry: impl Into<String>) -> &mut Self {
        self.card.expiry_date = Some(expiry.into());
        self
    }

    pub fn set_cardholder_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.card.cardholder_name = Some(name.into());
        self
    }

    pub fn add_card_data(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> &mut Self {
        self.card.additional_data.insert(key, value);
        self
    }

    pub fn add_reference(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> &mut Self {
        self.references.insert(key, value);
        self
    }

    /// Send the captured card
    pub async fn finish(self) -> ServiceResult<SendOutcome> {
        let response = CardResponse {
            card: self.card,
            references: self.references,
        };
        self.session.send_response(&response).await
    }

    /// Send an empty card, declining to read
    pub async fn skip(self) -> ServiceResult<SendOutcome> {
        self.session.send_response(&CardResponse::default()).await
    }
}

/// Model for the TRANSACTION_PROCESSING stage
pub struct TransactionProcessingModel {
    /// The transaction to process, with the captured card
    pub request: CardTransaction,
    references: AdditionalData,
    session: Arc<StageSession>,
}

impl TransactionProcessingModel {
    pub(crate) fn new(request: CardTransaction, session: Arc<StageSession>) -> Self {
        Self {
            request,
            references: AdditionalData::new(),
            session,
        }
    }

    pub fn add_reference(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> &mut Self {
        self.references.insert(key, value);
        self
    }

    /// Report funds collected for the given amounts
    pub async fn approve(
        self,
        amounts_processed: Amounts,
        method: impl Into<String>,
    ) -> ServiceResult<SendOutcome> {
        let mut response = TransactionResponse::approved(amounts_processed, method);
        response.references = self.references;
        self.session.send_response(&response).await
    }

    /// Report a decline
    pub async fn decline(self, message: impl Into<String>) -> ServiceResult<SendOutcome> {
        let mut response = TransactionResponse::declined(message);
        response.references = self.references;
        self.session.send_response(&response).await
    }

    /// Report a processing failure
    pub async fn fail(self, message: impl Into<String>) -> ServiceResult<SendOutcome> {
        let mut response = TransactionResponse::failed(message);
        response.references = self.references;
        self.session.send_response(&response).await
    }
}

/// Model for the GENERIC stage
pub struct GenericModel {
    pub request: GenericRequest,
    session: Arc<StageSession>,
}

impl GenericModel {
    pub(crate) fn new(request: GenericRequest, session: Arc<StageSession>) -> Self {
        Self { request, session }
    }

    /// Answer with data
    pub async fn succeed(self, data: AdditionalData) -> ServiceResult<SendOutcome> {
        self.session.send_response(&GenericResponse::success(data)).await
    }

    /// Answer with an error description
    pub async fn reject(self, message: impl Into<String>) -> ServiceResult<SendOutcome> {
        self.session.send_response(&GenericResponse::error(message)).await
    }
}

/// Model for the STATUS_UPDATE stage
///
/// Fire-and-forget: the handler only observes the update; the router
/// completes the exchange itself.
pub struct StatusUpdateModel {
    pub request: StatusUpdateRequest,
}

impl StatusUpdateModel {
    pub(crate) fn new(request: StatusUpdateRequest) -> Self {
        Self { request }
    }
}

/// Tagged union over every stage model
///
/// A single dispatcher matches on this instead of a subclass per stage.
pub enum StageModel {
    PreFlow(FlowResponseModel<Payment>),
    Split(FlowResponseModel<SplitRequest>),
    PreTransaction(FlowResponseModel<Transaction>),
    PaymentCardReading(CardReadingModel),
    PostCardReading(FlowResponseModel<CardTransaction>),
    TransactionProcessing(TransactionProcessingModel),
    PostTransaction(FlowResponseModel<Transaction>),
    PostFlow(FlowResponseModel<FlowSummary>),
    Generic(GenericModel),
    StatusUpdate(StatusUpdateModel),
}

impl StageModel {
    /// The stage this model belongs to
    pub fn stage(&self) -> FlowStage {
        match self {
            StageModel::PreFlow(_) => FlowStage::PreFlow,
            StageModel::Split(_) => FlowStage::Split,
            StageModel::PreTransaction(_) => FlowStage::PreTransaction,
            StageModel::PaymentCardReading(_) => FlowStage::PaymentCardReading,
            StageModel::PostCardReading(_) => FlowStage::PostCardReading,
            StageModel::TransactionProcessing(_) => FlowStage::TransactionProcessing,
            StageModel::PostTransaction(_) => FlowStage::PostTransaction,
            StageModel::PostFlow(_) => FlowStage::PostFlow,
            StageModel::Generic(_) => FlowStage::Generic,
            StageModel::StatusUpdate(_) => FlowStage::StatusUpdate,
        }
    }
}
