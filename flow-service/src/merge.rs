//! Response merging
//!
//! The orchestrator-side counterpart of the response contract: a validated
//! [`FlowResponse`] is folded back into the shared request state before the
//! next stage runs. The merge is atomic per stage: every mutation is
//! applied to a scratch copy and the real state is only replaced once all
//! of them succeeded, so a rejected response leaves nothing half-applied.

use shared::basket::Basket;
use shared::error::{FlowError, FlowResult};
use shared::payment::Payment;
use shared::response::{AmountsPaid, FlowResponse};
use shared::stage::FlowStage;
use std::collections::BTreeSet;

/// What a merge changed beyond the request itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// The participant asked to cancel the transaction
    pub cancelled: bool,
    /// Amounts the participant collected itself (response-level and
    /// basket-level)
    pub amounts_paid: Vec<AmountsPaid>,
    /// Data keys the participant wants delivered in later stages
    pub requested_data_keys: BTreeSet<String>,
}

/// Merge a stage response into the payment state
///
/// Validates first (including stage-dependent rules), then applies. On any
/// error the payment is left exactly as it was.
pub fn merge_response(
    payment: &mut Payment,
    response: &FlowResponse,
    stage: FlowStage,
) -> FlowResult<MergeOutcome> {
    response.validate_for_stage(stage)?;

    let mut next = payment.clone();
    let mut outcome = MergeOutcome {
        cancelled: response.cancel_transaction,
        requested_data_keys: response.requested_data_keys.clone(),
        ..MergeOutcome::default()
    };

    if let Some(updated) = &response.updated_request_amounts {
        apply_updated_amounts(&mut next, updated)?;
    }
    if let Some(basket) = &response.additional_basket {
        apply_additional_basket(&mut next, basket)?;
    }
    if let Some(modification) = &response.modified_basket {
        let basket = next
            .basket
            .iter_mut()
            .chain(next.additional_baskets.iter_mut())
            .find(|basket| basket.id == modification.basket_id)
            .ok_or_else(|| {
                FlowError::InvalidArgument(format!(
                    "modified basket '{}' does not exist on the request",
                    modification.basket_id
                ))
            })?;
        apply_basket_modification(basket, &modification.items)?;
        if let Some(paid) = &modification.paid_with {
            next.amounts.require_same_currency(&paid.amounts)?;
            outcome.amounts_paid.push(paid.clone());
        }
    }
    if let Some(paid) = &response.amounts_paid {
        next.amounts.require_same_currency(&paid.amounts)?;
        outcome.amounts_paid.push(paid.clone());
    }

    next.additional_data.merge(&response.references);

    *payment = next;
    Ok(outcome)
}

/// Replace the request amounts
///
/// The currency may only differ when the new amounts were derived through
/// a conversion from the current currency.
fn apply_updated_amounts(payment: &mut Payment, updated: &shared::amounts::Amounts) -> FlowResult<()> {
    if updated.currency != payment.amounts.currency
        && updated.original_currency.as_deref() != Some(payment.amounts.currency.as_str())
    {
        return Err(FlowError::currency_mismatch(
            payment.amounts.currency.clone(),
            updated.currency.clone(),
        ));
    }
    payment.amounts = updated.clone();
    Ok(())
}

/// Add a basket produced by a flow app
fn apply_additional_basket(payment: &mut Payment, basket: &Basket) -> FlowResult<()> {
    if let Some(basket_currency) = basket.currency()
        && basket_currency != payment.amounts.currency
    {
        return Err(FlowError::currency_mismatch(
            payment.amounts.currency.clone(),
            basket_currency,
        ));
    }
    payment.additional_baskets.push(basket.clone());
    Ok(())
}

/// Upsert the listed lines into an existing basket
fn apply_basket_modification(
    basket: &mut Basket,
    items: &[shared::basket::BasketItem],
) -> FlowResult<()> {
    for item in items {
        match basket.items.iter_mut().find(|line| line.id == item.id) {
            Some(line) => {
                line.quantity = item.quantity;
                line.amount = item.amount.clone();
                line.label = item.label.clone();
            }
            None => basket.add_items([item.clone()])?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::amounts::{Amount, Amounts, AmountsModifier};
    use shared::basket::BasketItem;
    use shared::response::BasketModification;

    fn payment_with_basket() -> Payment {
        let mut basket = Basket::with_id("main", "order");
        basket
            .add_items([BasketItem::new("coffee", "Coffee", Amount::new(250, "GBP"), 2)])
            .unwrap();
        Payment::new("sale", Amounts::new(500, "GBP")).with_basket(basket)
    }

    #[test]
    fn test_skip_response_merges_to_no_change() {
        let mut payment = payment_with_basket();
        let before = payment.clone();

        let outcome = merge_response(&mut payment, &FlowResponse::new(), FlowStage::PreFlow).unwrap();

        assert_eq!(payment, before);
        assert_eq!(outcome, MergeOutcome::default());
    }

    #[test]
    fn test_updated_amounts_and_references_merge() {
        let mut payment = payment_with_basket();

        let mut response = FlowResponse::new();
        response
            .update_request_amounts(Amounts::new(600, "GBP"))
            .add_reference("loyalty_id", "L-77");

        merge_response(&mut payment, &response, FlowStage::PreFlow).unwrap();

        assert_eq!(payment.amounts.total(), 600);
        assert_eq!(payment.additional_data.get_text("loyalty_id"), Some("L-77"));
    }

    #[test]
    fn test_converted_amounts_may_change_currency() {
        let mut payment = payment_with_basket();

        let mut modifier = AmountsModifier::from_amounts(&payment.amounts);
        modifier.change_currency("EUR", 1.2).unwrap();
        let mut response = FlowResponse::new();
        response.update_request_amounts(modifier.build());

        merge_response(&mut payment, &response, FlowStage::PreFlow).unwrap();
        assert_eq!(payment.amounts.currency, "EUR");
        assert_eq!(payment.amounts.original_currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_unexplained_currency_change_is_rejected_atomically() {
        let mut payment = payment_with_basket();
        let before = payment.clone();

        let mut response = FlowResponse::new();
        response
            .update_request_amounts(Amounts::new(600, "EUR"))
            .add_reference("note", "should not stick");

        assert!(merge_response(&mut payment, &response, FlowStage::PreFlow).is_err());
        // Nothing was applied, not even the reference
        assert_eq!(payment, before);
    }

    #[test]
    fn test_invalid_response_is_rejected_before_any_mutation() {
        let mut payment = payment_with_basket();
        let before = payment.clone();

        let mut response = FlowResponse::new();
        response
            .update_request_amounts(Amounts::new(500, "GBP"))
            .record_amounts_paid(Amounts::new(900, "GBP"), "loyalty");

        assert!(matches!(
            merge_response(&mut payment, &response, FlowStage::PreTransaction),
            Err(FlowError::PaidExceedsRequested { .. })
        ));
        assert_eq!(payment, before);
    }

    #[test]
    fn test_modified_basket_upserts_and_reports_paid_items() {
        let mut payment = payment_with_basket();

        let mut response = FlowResponse::new();
        response.set_modified_basket(BasketModification {
            basket_id: "main".into(),
            items: vec![
                BasketItem::new("coffee", "Coffee", Amount::new(250, "GBP"), 1),
                BasketItem::new("muffin", "Muffin", Amount::new(300, "GBP"), 1),
            ],
            paid_with: Some(AmountsPaid {
                amounts: Amounts::new(250, "GBP"),
                method: "loyalty".into(),
            }),
        });

        let outcome = merge_response(&mut payment, &response, FlowStage::PreTransaction).unwrap();

        let basket = payment.basket.as_ref().unwrap();
        assert_eq!(basket.item_by_id("coffee").unwrap().quantity, 1);
        assert_eq!(basket.item_by_id("muffin").unwrap().quantity, 1);
        assert_eq!(outcome.amounts_paid.len(), 1);
        assert_eq!(outcome.amounts_paid[0].method, "loyalty");
    }

    #[test]
    fn test_cancellation_reported_from_cancellable_stage() {
        let mut payment = payment_with_basket();
        let mut response = FlowResponse::new();
        response.request_cancellation();

        let outcome = merge_response(&mut payment, &response, FlowStage::Split).unwrap();
        assert!(outcome.cancelled);

        let err = merge_response(&mut payment, &response, FlowStage::PostFlow).unwrap_err();
        assert!(matches!(err, FlowError::CancelNotAllowed(_)));
    }
}
