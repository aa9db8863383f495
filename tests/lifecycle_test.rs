//! Integration tests for the order lifecycle: the status state machine,
//! post-shipment locking, cancellation, and paginated listings.

mod common;

use assert_matches::assert_matches;
use checkout_api::{
    entities::order::{AddressSnapshot, OrderStatus},
    errors::ServiceError,
};
use common::TestApp;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn cancelling_a_pending_order_restores_inventory() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let created = app.checkout_order(customer_id).await;

    let item = &created.items[0];
    assert_eq!(app.available(item.product_id, item.variant_id).await, 8);

    let cancelled = app
        .state
        .services
        .lifecycle
        .cancel(customer_id, created.order.id)
        .await
        .expect("pending order cancels");

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(app.available(item.product_id, item.variant_id).await, 10);
}

#[tokio::test]
async fn cancel_is_idempotent_and_restores_only_once() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let created = app.checkout_order(customer_id).await;
    let item = &created.items[0];

    app.state
        .services
        .lifecycle
        .cancel(customer_id, created.order.id)
        .await
        .unwrap();

    let second = app
        .state
        .services
        .lifecycle
        .cancel(customer_id, created.order.id)
        .await
        .expect("second cancel is a no-op, not an error");

    assert_eq!(second.status, OrderStatus::Cancelled);
    // Stock was put back exactly once.
    assert_eq!(app.available(item.product_id, item.variant_id).await, 10);
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let created = app.checkout_order(customer_id).await;

    let lifecycle = &app.state.services.lifecycle;
    lifecycle.mark_processing(created.order.id).await.unwrap();
    lifecycle.mark_shipped(created.order.id).await.unwrap();

    let err = lifecycle.cancel(customer_id, created.order.id).await.unwrap_err();
    assert_matches!(err, ServiceError::OrderLocked(_));
}

#[tokio::test]
async fn shipping_address_can_change_until_shipment() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let created = app.checkout_order(customer_id).await;

    let new_address = app.seed_address(customer_id).await;
    let updated = app
        .state
        .services
        .lifecycle
        .update_shipping_address(customer_id, created.order.id, new_address.id)
        .await
        .expect("address updates while pending");

    let snapshot: AddressSnapshot =
        serde_json::from_value(updated.shipping_address.clone()).unwrap();
    assert_eq!(snapshot.address_id, new_address.id);
}

#[tokio::test]
async fn shipping_address_is_locked_after_shipment() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let created = app.checkout_order(customer_id).await;

    let lifecycle = &app.state.services.lifecycle;
    lifecycle.mark_processing(created.order.id).await.unwrap();
    lifecycle.mark_shipped(created.order.id).await.unwrap();

    // Even a perfectly valid new address is refused.
    let new_address = app.seed_address(customer_id).await;
    let err = lifecycle
        .update_shipping_address(customer_id, created.order.id, new_address.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OrderLocked(_));
}

#[tokio::test]
async fn a_strangers_address_is_rejected() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let created = app.checkout_order(customer_id).await;

    let foreign_address = app.seed_address(Uuid::new_v4()).await;
    let err = app
        .state
        .services
        .lifecycle
        .update_shipping_address(customer_id, created.order.id, foreign_address.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidAddress(_));
}

#[tokio::test]
async fn the_state_machine_walks_forward_and_rejects_skips() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let created = app.checkout_order(customer_id).await;
    let lifecycle = &app.state.services.lifecycle;

    // Skipping straight to shipped is refused.
    let err = lifecycle.mark_shipped(created.order.id).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let order = lifecycle.mark_processing(created.order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    let order = lifecycle.mark_shipped(created.order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    let order = lifecycle.mark_delivered(created.order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    let order = lifecycle.mark_returned(created.order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Returned);

    // Returned is terminal.
    let err = lifecycle.mark_processing(created.order.id).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn cancelled_orders_stay_cancelled() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let created = app.checkout_order(customer_id).await;
    let lifecycle = &app.state.services.lifecycle;

    lifecycle.cancel(customer_id, created.order.id).await.unwrap();

    let err = lifecycle.mark_processing(created.order.id).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn listings_are_newest_first_and_paginated() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let mut order_ids = Vec::new();
    for _ in 0..3 {
        let created = app.checkout_order(customer_id).await;
        order_ids.push(created.order.id);
        // Distinct creation timestamps keep the ordering deterministic.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // Another buyer's order must not leak into the customer listing.
    app.checkout_order(Uuid::new_v4()).await;

    let lifecycle = &app.state.services.lifecycle;

    let (page1, total) = lifecycle.list_for_customer(customer_id, 1, 2).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(page1.len(), 2);
    assert_eq!(page1[0].id, order_ids[2]);
    assert_eq!(page1[1].id, order_ids[1]);

    let (page2, _) = lifecycle.list_for_customer(customer_id, 2, 2).await.unwrap();
    assert_eq!(page2.len(), 1);
    assert_eq!(page2[0].id, order_ids[0]);

    let (all_orders, all_total) = lifecycle.list_all(1, 10).await.unwrap();
    assert_eq!(all_total, 4);
    assert_eq!(all_orders.len(), 4);
}

#[tokio::test]
async fn paging_input_is_clamped_to_safe_bounds() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    app.checkout_order(customer_id).await;

    let lifecycle = &app.state.services.lifecycle;

    // Page 0 and per_page 0 fall back to sane values instead of erroring.
    let (orders, total) = lifecycle.list_for_customer(customer_id, 0, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders.len(), 1);

    // An oversized page size is clamped rather than honored.
    let (orders, _) = lifecycle
        .list_for_customer(customer_id, 1, 1_000_000)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
}
