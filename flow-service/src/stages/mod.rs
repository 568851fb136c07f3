//! Stage dispatch
//!
//! A single router maps incoming stage requests to registered handlers.
//! The dispatch boundary owns the protocol bookkeeping: it acknowledges
//! before any work, deserializes the stage payload into the stage model,
//! invokes the handler, and converts every error or panic into a `FAILURE`
//! message. It never crashes the orchestrator and never lets a stage end
//! without a terminal message.

use crate::config::FlowServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::session::StageSession;
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use shared::error::FlowError;
use shared::message::{AppMessage, FlowEvent, MessageType, RequestPayload, ServiceEventPayload};
use shared::response::FlowResponse;
use shared::stage::FlowStage;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

pub mod models;

pub use models::{
    CardReadingModel, FlowResponseModel, GenericModel, StageModel, StatusUpdateModel,
    TransactionProcessingModel,
};

/// Context handed to every stage handler
#[derive(Clone)]
pub struct StageContext {
    /// The session for this stage invocation
    pub session: Arc<StageSession>,
    /// Service identity and capabilities
    pub config: Arc<FlowServiceConfig>,
}

/// A participant's implementation of one or more stages
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn handle(&self, ctx: StageContext, model: StageModel) -> ServiceResult<()>;
}

/// Routes stage requests to registered handlers
pub struct StageRouter {
    config: Arc<FlowServiceConfig>,
    handlers: HashMap<FlowStage, Arc<dyn StageHandler>>,
    outbound: mpsc::Sender<AppMessage>,
    /// Stages run sequentially; at most one session is live at a time
    active: Mutex<Option<Arc<StageSession>>>,
}

impl StageRouter {
    pub fn new(config: Arc<FlowServiceConfig>, outbound: mpsc::Sender<AppMessage>) -> Self {
        Self {
            config,
            handlers: HashMap::new(),
            outbound,
            active: Mutex::new(None),
        }
    }

    /// Register a handler for a stage
    pub fn register(&mut self, stage: FlowStage, handler: Arc<dyn StageHandler>) -> &mut Self {
        self.handlers.insert(stage, handler);
        self
    }

    /// Stage dispatch entry point
    ///
    /// Deserializes the payload, builds the stage model and invokes the
    /// registered handler. All failures surface as `FAILURE` messages to
    /// the orchestrator; `Err` is returned only when the transport itself
    /// is gone.
    pub async fn handle(&self, stage_name: &str, request_payload: &str) -> ServiceResult<()> {
        let stage: FlowStage = match stage_name.parse() {
            Ok(stage) => stage,
            Err(err) => {
                tracing::error!(stage = stage_name, "request for unknown stage");
                return self.refuse(err).await;
            }
        };

        if !self.config.handles_stage(stage) {
            return self
                .refuse(FlowError::StageNotSupported(stage.to_string()))
                .await;
        }
        let Some(handler) = self.handlers.get(&stage).cloned() else {
            return self
                .refuse(FlowError::StageNotSupported(stage.to_string()))
                .await;
        };

        let session = Arc::new(StageSession::new(stage, self.outbound.clone()));
        *self.active.lock() = Some(Arc::clone(&session));

        // Step 2 of the protocol: acknowledge before any work
        session.send_ack().await?;

        let model = match build_model(stage, request_payload, Arc::clone(&session)) {
            Ok(model) => model,
            Err(err) => {
                tracing::error!(stage = %stage, error = %err, "stage payload rejected");
                session.send_failure(&ServiceError::from(err).to_failure()).await?;
                return Ok(());
            }
        };

        let ctx = StageContext {
            session: Arc::clone(&session),
            config: Arc::clone(&self.config),
        };

        let outcome = AssertUnwindSafe(handler.handle(ctx, model))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let detail = panic_message(panic.as_ref());
                Err(ServiceError::Internal(anyhow::anyhow!(
                    "stage handler panicked: {detail}"
                )))
            });

        match outcome {
            Ok(()) => self.complete_silent_handler(stage, &session).await?,
            Err(err) => {
                tracing::error!(stage = %stage, error = %err, "stage handler failed");
                if session.has_responded() || session.is_finished() {
                    tracing::warn!(stage = %stage, "handler failed after its terminal message");
                } else {
                    session.send_failure(&err.to_failure()).await?;
                }
            }
        }

        *self.active.lock() = None;
        Ok(())
    }

    /// Feed an inbound envelope from the transport
    pub async fn on_inbound(&self, message: &AppMessage) -> ServiceResult<()> {
        match message.message_type {
            MessageType::Request => {
                let request: RequestPayload = message
                    .parse_payload()
                    .map_err(|err| ServiceError::from(FlowError::from(err)))?;
                self.handle(&request.stage, &request.payload).await
            }
            MessageType::ForceFinish => {
                self.dispatch_event(&FlowEvent::FinishImmediately);
                Ok(())
            }
            MessageType::ServiceEvent => {
                match message.parse_payload::<ServiceEventPayload>() {
                    Ok(ServiceEventPayload::Flow(event)) => self.dispatch_event(&event),
                    Ok(ServiceEventPayload::Audit(_)) => {
                        tracing::warn!("ignoring audit entry sent to a participant");
                    }
                    Err(err) => tracing::warn!(error = %err, "unparseable service event"),
                }
                Ok(())
            }
            other => {
                tracing::warn!(message_type = %other, "unexpected inbound message type");
                Ok(())
            }
        }
    }

    fn dispatch_event(&self, event: &FlowEvent) {
        let active = self.active.lock();
        match active.as_ref() {
            Some(session) => session.handle_event(event),
            None => tracing::debug!(event = ?event, "flow event with no active stage"),
        }
    }

    /// Refuse a request that never produced a session: ack, then fail, so
    /// the orchestrator still sees a well-formed exchange
    async fn refuse(&self, err: FlowError) -> ServiceResult<()> {
        self.send_raw(AppMessage::request_ack()).await?;
        self.send_raw(AppMessage::failure(&err.to_failure())).await?;
        Ok(())
    }

    /// Close out a handler that returned without sending a terminal message
    async fn complete_silent_handler(
        &self,
        stage: FlowStage,
        session: &Arc<StageSession>,
    ) -> ServiceResult<()> {
        if session.has_responded() || session.is_finished() {
            return Ok(());
        }
        match stage {
            // An empty flow response is a legal "skip"
            FlowStage::PreFlow
            | FlowStage::Split
            | FlowStage::PreTransaction
            | FlowStage::PostCardReading
            | FlowStage::PostTransaction
            | FlowStage::PostFlow => {
                tracing::debug!(stage = %stage, "handler sent no response, skipping stage");
                session.send_response(&FlowResponse::new()).await?;
            }
            FlowStage::PaymentCardReading => {
                tracing::debug!(stage = %stage, "handler read no card, sending empty card");
                session
                    .send_response(&shared::payment::CardResponse::default())
                    .await?;
            }
            // Fire-and-forget: the router completes the exchange itself
            FlowStage::StatusUpdate => {
                session.send_empty_response().await?;
            }
            // These stages have no meaningful default
            FlowStage::TransactionProcessing | FlowStage::Generic => {
                let err = FlowError::IllegalState(
                    "stage handler finished without sending a response".into(),
                );
                session.send_failure(&err.to_failure()).await?;
            }
        }
        Ok(())
    }

    async fn send_raw(&self, message: AppMessage) -> ServiceResult<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| ServiceError::from(FlowError::Protocol("message channel closed".into())))
    }
}

/// Deserialize the stage payload into its model
fn build_model(
    stage: FlowStage,
    payload: &str,
    session: Arc<StageSession>,
) -> Result<StageModel, FlowError> {
    let model = match stage {
        FlowStage::PreFlow => {
            StageModel::PreFlow(FlowResponseModel::new(stage, serde_json::from_str(payload)?, session))
        }
        FlowStage::Split => {
            StageModel::Split(FlowResponseModel::new(stage, serde_json::from_str(payload)?, session))
        }
        FlowStage::PreTransaction => StageModel::PreTransaction(FlowResponseModel::new(
            stage,
            serde_json::from_str(payload)?,
            session,
        )),
        FlowStage::PaymentCardReading => {
            StageModel::PaymentCardReading(CardReadingModel::new(serde_json::from_str(payload)?, session))
        }
        FlowStage::PostCardReading => StageModel::PostCardReading(FlowResponseModel::new(
            stage,
            serde_json::from_str(payload)?,
            session,
        )),
        FlowStage::TransactionProcessing => StageModel::TransactionProcessing(
            TransactionProcessingModel::new(serde_json::from_str(payload)?, session),
        ),
        FlowStage::PostTransaction => StageModel::PostTransaction(FlowResponseModel::new(
            stage,
            serde_json::from_str(payload)?,
            session,
        )),
        FlowStage::PostFlow => {
            StageModel::PostFlow(FlowResponseModel::new(stage, serde_json::from_str(payload)?, session))
        }
        FlowStage::Generic => {
            StageModel::Generic(GenericModel::new(serde_json::from_str(payload)?, session))
        }
        FlowStage::StatusUpdate => {
            StageModel::StatusUpdate(StatusUpdateModel::new(serde_json::from_str(payload)?))
        }
    };
    Ok(model)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
