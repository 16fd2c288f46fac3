//! Payment service behaviour against the in-memory store

mod common;

use chrono::{Duration, Utc};
use common::*;
use medsupply_checkout_core::CheckoutError;
use medsupply_types::{
    PaymentMethod, PaymentMethodInput, PaymentPlan, PaymentStatus, PlanDetails, TransactionId,
    UpdatePaymentStatusRequest,
};
use serde_json::json;

fn refund(amount: Option<&str>) -> UpdatePaymentStatusRequest {
    UpdatePaymentStatusRequest {
        status: PaymentStatus::Refunded,
        refund_amount: amount.map(dec),
        refund_reason: Some("Damaged in transit".into()),
        metadata: None,
    }
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_online_full_payment_is_completed_and_sanitized() {
    let h = Harness::new();
    let recorded = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            None,
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(!recorded.replayed);

    let payment = recorded.value;
    assert!(TransactionId::is_well_formed(payment.transaction_id.as_str()));
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.amount, dec("117.50"));
    assert_eq!(payment.metadata.plan, PlanDetails::FullPayment);
    assert_eq!(
        payment.metadata.items_summary,
        "2 x Paracetamol 500mg, 1 x Nitrile Gloves"
    );
    match &payment.payment_method {
        PaymentMethod::Card { last4, .. } => assert_eq!(last4, "1111"),
        other => panic!("expected card, got {other:?}"),
    }
    let stored = serde_json::to_string(&payment).unwrap();
    assert!(!stored.contains("4111111111111111"));
    assert!(!stored.contains("cvv"));
}

#[tokio::test]
async fn test_cash_on_delivery_is_pending() {
    let h = Harness::new();
    let payment = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(
                PaymentPlan::FullPayment,
                PaymentMethodInput::CashOnDelivery,
                "117.50",
            ),
            None,
            Utc::now(),
        )
        .await
        .unwrap()
        .value;
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_installment_amount_is_the_deposit() {
    let h = Harness::new();
    let mut req = payment_request(PaymentPlan::InstallmentPayment, card(), "70.50");
    req.metadata.installment_percentage = Some(60);

    let payment = h
        .services
        .payments
        .create(&h.customer, req, None, Utc::now())
        .await
        .unwrap()
        .value;
    match payment.metadata.plan {
        PlanDetails::InstallmentPayment {
            amount_paid,
            remaining_balance,
            ..
        } => {
            assert_eq!(amount_paid, dec("70.50"));
            assert_eq!(remaining_balance, dec("47.00"));
        }
        other => panic!("expected installment plan, got {other:?}"),
    }
}

#[tokio::test]
async fn test_amount_must_match_plan() {
    let h = Harness::new();
    let err = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "50.00"),
            None,
            Utc::now(),
        )
        .await
        .unwrap_err();
    match err {
        CheckoutError::Validation(errors) => assert_eq!(errors[0].field, "amount"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(h.store.payment_count(), 0);
}

#[tokio::test]
async fn test_idempotency_key_replays() {
    let h = Harness::new();
    let key = Some("checkout-7f3a9c".to_string());
    let first = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            key.clone(),
            Utc::now(),
        )
        .await
        .unwrap();
    let second = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            key,
            Utc::now(),
        )
        .await
        .unwrap();

    assert!(second.replayed);
    assert_eq!(first.value.id, second.value.id);
    assert_eq!(h.store.payment_count(), 1);
}

#[tokio::test]
async fn test_short_idempotency_key_rejected() {
    let h = Harness::new();
    let err = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            Some("abc".into()),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(_)));
}

// =============================================================================
// Linking through order creation
// =============================================================================

#[tokio::test]
async fn test_order_links_payment() {
    let h = Harness::new();
    let now = Utc::now();
    let payment = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            None,
            now,
        )
        .await
        .unwrap()
        .value;
    let txn = payment.transaction_id.as_str();

    let order = h
        .services
        .orders
        .create(&h.customer, order_request(Some(txn)), now)
        .await
        .unwrap();
    assert_eq!(order.payment_details.transaction_id, Some(payment.transaction_id.clone()));
    assert_eq!(order.payment_details.status, PaymentStatus::Completed);

    let linked = h.services.payments.get(&h.customer, txn).await.unwrap();
    let link = linked.metadata.order_details.expect("payment should be linked");
    assert_eq!(link.order_number, order.order_number);
    assert_eq!(linked.metadata.order_id, order.order_number.as_str());

    let err = h
        .services
        .orders
        .create(&h.customer, order_request(Some(txn)), now)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidState(_)));
}

#[tokio::test]
async fn test_order_with_foreign_transaction_rejected() {
    let h = Harness::new();
    let payment = h
        .services
        .payments
        .create(
            &h.other,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            None,
            Utc::now(),
        )
        .await
        .unwrap()
        .value;

    let err = h
        .services
        .orders
        .create(
            &h.customer,
            order_request(Some(payment.transaction_id.as_str())),
            Utc::now(),
        )
        .await
        .unwrap_err();
    match err {
        CheckoutError::Validation(errors) => {
            assert_eq!(errors[0].field, "paymentDetails.transactionId")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_order_must_match_linked_payment() {
    let h = Harness::new();
    let payment = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::Credit, PaymentMethodInput::Credit, "117.50"),
            None,
            Utc::now(),
        )
        .await
        .unwrap()
        .value;
    let txn = payment.transaction_id.as_str();

    // Claims a card payment in full against a credit purchase
    let err = h
        .services
        .orders
        .create(&h.customer, order_request(Some(txn)), Utc::now())
        .await
        .unwrap_err();
    match err {
        CheckoutError::Validation(errors) => {
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            assert_eq!(fields, ["paymentDetails.type", "paymentDetails.method"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(h.store.order_count(), 0);

    let unlinked = h.services.payments.get(&h.customer, txn).await.unwrap();
    assert!(unlinked.metadata.order_details.is_none());
}

#[tokio::test]
async fn test_order_takes_details_from_linked_payment() {
    let h = Harness::new();
    let payment = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            None,
            Utc::now(),
        )
        .await
        .unwrap()
        .value;

    let mut req = order_request(Some(payment.transaction_id.as_str()));
    req.payment_details.amount = dec("117.499");
    req.payment_details.currency = "ghs".into();
    req.payment_details.status = Some(PaymentStatus::Failed);
    let order = h
        .services
        .orders
        .create(&h.customer, req, Utc::now())
        .await
        .unwrap();
    assert_eq!(order.payment_details.amount, payment.amount);
    assert_eq!(order.payment_details.currency, "GHS");
    assert_eq!(order.payment_details.status, payment.status);
}

#[tokio::test]
async fn test_concurrent_orders_link_payment_once() {
    let h = Harness::new();
    let payment = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            None,
            Utc::now(),
        )
        .await
        .unwrap()
        .value;
    let txn = payment.transaction_id.as_str();

    let orders = &h.services.orders;
    let (first, second) = tokio::join!(
        orders.create(&h.customer, order_request(Some(txn)), Utc::now()),
        orders.create(&h.customer, order_request(Some(txn)), Utc::now()),
    );
    let (won, lost) = match (first, second) {
        (Ok(order), Err(err)) | (Err(err), Ok(order)) => (order, err),
        other => panic!("expected exactly one order, got {other:?}"),
    };
    assert!(matches!(lost, CheckoutError::InvalidState(_)));
    assert_eq!(h.store.order_count(), 1);

    let linked = h.services.payments.get(&h.customer, txn).await.unwrap();
    let link = linked.metadata.order_details.expect("payment should be linked");
    assert_eq!(link.order_number, won.order_number);
}

// =============================================================================
// Status and reconciliation
// =============================================================================

#[tokio::test]
async fn test_refund_defaults_to_full_amount() {
    let h = Harness::new();
    let payment = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            None,
            Utc::now(),
        )
        .await
        .unwrap()
        .value;
    let txn = payment.transaction_id.as_str();

    let err = h
        .services
        .payments
        .update_status(txn, refund(Some("500.00")), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(_)));

    let refunded = h
        .services
        .payments
        .update_status(txn, refund(None), Utc::now())
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(refunded.refund_amount, Some(dec("117.50")));

    let err = h
        .services
        .payments
        .update_status(
            txn,
            UpdatePaymentStatusRequest {
                status: PaymentStatus::Completed,
                refund_amount: None,
                refund_reason: None,
                metadata: None,
            },
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidState(_)));
}

#[tokio::test]
async fn test_status_metadata_kept_as_gateway_response() {
    let h = Harness::new();
    let payment = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(
                PaymentPlan::FullPayment,
                PaymentMethodInput::CashOnDelivery,
                "117.50",
            ),
            None,
            Utc::now(),
        )
        .await
        .unwrap()
        .value;

    let updated = h
        .services
        .payments
        .update_status(
            &payment.id.to_string(),
            UpdatePaymentStatusRequest {
                status: PaymentStatus::Completed,
                refund_amount: None,
                refund_reason: None,
                metadata: Some(json!({"collectedBy": "courier-17"})),
            },
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, PaymentStatus::Completed);
    assert_eq!(
        updated.gateway_response,
        Some(json!({"collectedBy": "courier-17"}))
    );
}

#[tokio::test]
async fn test_reconcile_flags_stale_unlinked_payments() {
    let h = Harness::new();
    let now = Utc::now();
    let stale = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            None,
            now,
        )
        .await
        .unwrap()
        .value;
    h.store
        .set_payment_created_at(stale.id.0, now - Duration::hours(1));

    let fresh = h
        .services
        .payments
        .create(
            &h.customer,
            payment_request(PaymentPlan::FullPayment, card(), "117.50"),
            None,
            now,
        )
        .await
        .unwrap()
        .value;

    let sweep = now + Duration::minutes(1);
    let flagged = h.services.payments.reconcile(sweep).await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].id, stale.id);
    assert!(flagged[0].metadata.needs_review);
    assert_eq!(flagged[0].updated_at, sweep);

    let again = h.services.payments.reconcile(sweep).await.unwrap();
    assert!(again.is_empty());

    let fresh = h
        .services
        .payments
        .get(&h.customer, fresh.transaction_id.as_str())
        .await
        .unwrap();
    assert!(!fresh.metadata.needs_review);
}
