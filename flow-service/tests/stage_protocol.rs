//! Stage dispatch and protocol sequencing
//!
//! Drives the router the way a transport would: a REQUEST envelope goes
//! in, the ack / terminal / audit messages come out of the channel, and an
//! orchestrator-side exchange validates the sequence.

use async_trait::async_trait;
use flow_service::{
    merge::merge_response, ExchangeEvent, FlowServiceConfig, ServiceResult, StageContext,
    StageExchange, StageModel, StageOutcome, StageRouter,
};
use shared::amounts::{Amounts, AmountsModifier};
use shared::error::ErrorCode;
use shared::message::{AppMessage, AuditSeverity, MessageType};
use shared::payment::Payment;
use shared::response::FlowResponse;
use shared::stage::FlowStage;
use std::sync::Arc;
use tokio::sync::mpsc;

struct TipAddingHandler;

#[async_trait]
impl flow_service::StageHandler for TipAddingHandler {
    async fn handle(&self, ctx: StageContext, model: StageModel) -> ServiceResult<()> {
        let StageModel::PreFlow(mut model) = model else {
            panic!("registered for PRE_FLOW only");
        };
        ctx.session
            .audit(AuditSeverity::Info, "adding service tip")
            .await?;

        let mut modifier = AmountsModifier::from_amounts(&model.request.amounts);
        modifier.set_additional_amount("tip", 150, false)?;
        model.update_request_amounts(modifier.build());
        model.finish().await?;
        Ok(())
    }
}

struct PanickingHandler;

#[async_trait]
impl flow_service::StageHandler for PanickingHandler {
    async fn handle(&self, _ctx: StageContext, _model: StageModel) -> ServiceResult<()> {
        panic!("boom");
    }
}

struct SilentHandler;

#[async_trait]
impl flow_service::StageHandler for SilentHandler {
    async fn handle(&self, _ctx: StageContext, _model: StageModel) -> ServiceResult<()> {
        Ok(())
    }
}

fn router_with(
    stage: FlowStage,
    handler: Arc<dyn flow_service::StageHandler>,
) -> (StageRouter, mpsc::Receiver<AppMessage>) {
    let (tx, rx) = mpsc::channel(32);
    let config = Arc::new(FlowServiceConfig::with_overrides("test-service", vec![stage]));
    let mut router = StageRouter::new(config, tx);
    router.register(stage, handler);
    (router, rx)
}

#[tokio::test]
async fn full_stage_invocation_merges_back_into_the_payment() {
    let (router, mut rx) = router_with(FlowStage::PreFlow, Arc::new(TipAddingHandler));

    let mut payment = Payment::new("sale", Amounts::new(1000, "GBP"));
    let (mut exchange, request_msg) =
        StageExchange::begin(FlowStage::PreFlow, serde_json::to_string(&payment).unwrap());

    router.on_inbound(&request_msg).await.unwrap();

    // Feed everything the participant produced into the exchange
    let mut completed = None;
    while let Ok(msg) = rx.try_recv() {
        if let ExchangeEvent::Completed(outcome) = exchange.on_message(&msg).unwrap() {
            completed = Some(outcome);
        }
    }

    let Some(StageOutcome::Response(payload)) = completed else {
        panic!("expected a response outcome");
    };
    let response: FlowResponse = serde_json::from_str(&payload).unwrap();
    merge_response(&mut payment, &response, FlowStage::PreFlow).unwrap();

    assert_eq!(payment.amounts.additional_amount("tip"), 150);
    assert_eq!(payment.amounts.total(), 1150);
    assert_eq!(exchange.audit_trail().len(), 1);
}

#[tokio::test]
async fn unknown_stage_is_acked_then_failed() {
    let (router, mut rx) = router_with(FlowStage::PreFlow, Arc::new(TipAddingHandler));

    router.handle("CHECKOUT", "{}").await.unwrap();

    assert_eq!(rx.recv().await.unwrap().message_type, MessageType::RequestAck);
    let failure = rx.recv().await.unwrap();
    assert_eq!(failure.message_type, MessageType::Failure);
    let payload: shared::message::FailurePayload = failure.parse_payload().unwrap();
    assert_eq!(payload.code, ErrorCode::UnknownStage);
}

#[tokio::test]
async fn unhandled_stage_is_refused() {
    let (router, mut rx) = router_with(FlowStage::PreFlow, Arc::new(TipAddingHandler));

    let payment = Payment::new("sale", Amounts::new(100, "GBP"));
    router
        .handle("POST_FLOW", &serde_json::to_string(&payment).unwrap())
        .await
        .unwrap();

    rx.recv().await.unwrap(); // ack
    let failure = rx.recv().await.unwrap();
    let payload: shared::message::FailurePayload = failure.parse_payload().unwrap();
    assert_eq!(payload.code, ErrorCode::StageNotSupported);
}

#[tokio::test]
async fn malformed_payload_becomes_a_failure_message() {
    let (router, mut rx) = router_with(FlowStage::PreFlow, Arc::new(TipAddingHandler));

    router.handle("PRE_FLOW", "not json at all").await.unwrap();

    assert_eq!(rx.recv().await.unwrap().message_type, MessageType::RequestAck);
    let failure = rx.recv().await.unwrap();
    assert_eq!(failure.message_type, MessageType::Failure);
    let payload: shared::message::FailurePayload = failure.parse_payload().unwrap();
    assert_eq!(payload.code, ErrorCode::SerializationFailed);
}

#[tokio::test]
async fn handler_panic_is_contained_at_the_boundary() {
    let (router, mut rx) = router_with(FlowStage::PreFlow, Arc::new(PanickingHandler));

    let payment = Payment::new("sale", Amounts::new(100, "GBP"));
    router
        .handle("PRE_FLOW", &serde_json::to_string(&payment).unwrap())
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap().message_type, MessageType::RequestAck);
    let failure = rx.recv().await.unwrap();
    assert_eq!(failure.message_type, MessageType::Failure);
    let payload: shared::message::FailurePayload = failure.parse_payload().unwrap();
    assert_eq!(payload.code, ErrorCode::InternalError);
    // The panic text stays out of the wire payload
    assert!(!payload.message.contains("boom"));
}

#[tokio::test]
async fn silent_handler_skips_the_stage() {
    let (router, mut rx) = router_with(FlowStage::PreFlow, Arc::new(SilentHandler));

    let payment = Payment::new("sale", Amounts::new(100, "GBP"));
    router
        .handle("PRE_FLOW", &serde_json::to_string(&payment).unwrap())
        .await
        .unwrap();

    rx.recv().await.unwrap(); // ack
    let terminal = rx.recv().await.unwrap();
    assert_eq!(terminal.message_type, MessageType::Response);
    let response: FlowResponse = terminal.parse_payload().unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn status_update_completes_with_an_empty_response() {
    let (router, mut rx) = router_with(FlowStage::StatusUpdate, Arc::new(SilentHandler));

    let update = shared::payment::StatusUpdateRequest {
        update_type: "basket_updated".into(),
        data: Default::default(),
    };
    router
        .handle("STATUS_UPDATE", &serde_json::to_string(&update).unwrap())
        .await
        .unwrap();

    rx.recv().await.unwrap(); // ack
    let terminal = rx.recv().await.unwrap();
    assert_eq!(terminal.message_type, MessageType::Response);
    assert!(terminal.payload.is_empty());
}
