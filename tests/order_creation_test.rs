//! Integration tests for the order assembler: authoritative pricing,
//! inventory reservation, and the monetary invariant.

mod common;

use assert_matches::assert_matches;
use checkout_api::{
    entities::{
        order::{self, AddressSnapshot, OrderStatus, PaymentState},
        order_history,
    },
    errors::ServiceError,
    services::orders::{CreateOrderInput, OrderItemInput},
};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

fn order_input(
    address_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> CreateOrderInput {
    CreateOrderInput {
        shipping_address_id: address_id,
        billing_address_id: None,
        items: vec![OrderItemInput {
            product_id,
            variant_id,
            quantity,
            unit_price: None,
            total_price: None,
        }],
        coupon_code: None,
        coupon_id: None,
        shipping_fee: None,
        tax: None,
        notes: None,
        metadata: None,
    }
}

#[tokio::test]
async fn checkout_with_coupon_matches_worked_example() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let address = app.seed_address(customer_id).await;
    let product = app.seed_product("Widget", dec!(12.00)).await;
    let variant = app.seed_variant(product.id, "SKU-W1", dec!(10.00)).await;
    app.seed_inventory(product.id, Some(variant.id), 10).await;
    app.insert_coupon(TestApp::coupon_base("SAVE10")).await;

    let mut input = order_input(address.id, product.id, Some(variant.id), 2);
    input.items[0].unit_price = Some(dec!(10.00));
    input.items[0].total_price = Some(dec!(20.00));
    input.coupon_code = Some("SAVE10".to_string());

    let created = app
        .state
        .services
        .orders
        .create_order(customer_id, input)
        .await
        .expect("order should be created");

    let order = &created.order;
    assert_eq!(order.items_subtotal, dec!(20.00));
    assert_eq!(order.order_discount, dec!(2.00));
    assert_eq!(order.shipping_fee, Decimal::ZERO);
    assert_eq!(order.tax, Decimal::ZERO);
    assert_eq!(order.grand_total, dec!(18.00));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentState::Unpaid);
    assert!(order.order_number.starts_with("ORD-"));

    // The variant price is authoritative, not the product price.
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].unit_price, dec!(10.00));
    assert_eq!(created.items[0].subtotal, dec!(20.00));
    assert_eq!(created.items[0].quantity, 2);

    // Monetary invariant holds.
    let recomputed = (order.items_subtotal - order.items_discount_total - order.order_discount)
        .max(Decimal::ZERO)
        + order.shipping_fee
        + order.tax;
    assert_eq!(order.grand_total, recomputed);

    // Inventory was decremented, usage counted, redemption recorded.
    assert_eq!(app.available(product.id, Some(variant.id)).await, 8);

    let coupon = app
        .state
        .services
        .discounts
        .find_by_code("SAVE10")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coupon.usage_count, 1);

    let history = order_history::Entity::find()
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].order_id, order.id);
    assert_eq!(history[0].customer_id, customer_id);

    // The shipping address is snapshotted into the order.
    let snapshot: AddressSnapshot =
        serde_json::from_value(order.shipping_address.clone()).unwrap();
    assert_eq!(snapshot.address_id, address.id);
    assert_eq!(snapshot.line1, "123 Test Street");
}

#[tokio::test]
async fn tampered_unit_price_rejects_order_and_leaves_no_trace() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let address = app.seed_address(customer_id).await;
    let product = app.seed_product("Widget", dec!(10.00)).await;
    let variant = app.seed_variant(product.id, "SKU-W2", dec!(10.00)).await;
    app.seed_inventory(product.id, Some(variant.id), 10).await;

    let mut input = order_input(address.id, product.id, Some(variant.id), 2);
    input.items[0].unit_price = Some(dec!(5.00));

    let err = app
        .state
        .services
        .orders
        .create_order(customer_id, input)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::UnitPriceMismatch { claimed, actual, .. } => {
        assert_eq!(claimed, dec!(5.00));
        assert_eq!(actual, dec!(10.00));
    });

    // Nothing persisted, inventory untouched.
    assert!(order::Entity::find().all(&*app.state.db).await.unwrap().is_empty());
    assert_eq!(app.available(product.id, Some(variant.id)).await, 10);
}

#[tokio::test]
async fn client_price_within_tolerance_is_accepted() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let address = app.seed_address(customer_id).await;
    let product = app.seed_product("Widget", dec!(10.00)).await;
    app.seed_inventory(product.id, None, 5).await;

    let mut input = order_input(address.id, product.id, None, 1);
    input.items[0].unit_price = Some(dec!(10.01));

    let created = app
        .state
        .services
        .orders
        .create_order(customer_id, input)
        .await
        .expect("one cent of drift is tolerated");
    assert_eq!(created.items[0].unit_price, dec!(10.00));
}

#[tokio::test]
async fn tampered_total_price_is_rejected() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let address = app.seed_address(customer_id).await;
    let product = app.seed_product("Widget", dec!(10.00)).await;
    app.seed_inventory(product.id, None, 5).await;

    let mut input = order_input(address.id, product.id, None, 2);
    input.items[0].total_price = Some(dec!(15.00));

    let err = app
        .state
        .services
        .orders
        .create_order(customer_id, input)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::TotalPriceMismatch { .. });
}

#[tokio::test]
async fn insufficient_inventory_fails_the_precheck() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let address = app.seed_address(customer_id).await;
    let product = app.seed_product("Widget", dec!(10.00)).await;
    app.seed_inventory(product.id, None, 5).await;

    let err = app
        .state
        .services
        .orders
        .create_order(customer_id, order_input(address.id, product.id, None, 6))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientInventory { requested: 6, available: 5, .. });
    assert_eq!(app.available(product.id, None).await, 5);
}

#[tokio::test]
async fn missing_inventory_record_fails() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let address = app.seed_address(customer_id).await;
    let product = app.seed_product("Widget", dec!(10.00)).await;
    // No inventory row seeded.

    let err = app
        .state
        .services
        .orders
        .create_order(customer_id, order_input(address.id, product.id, None, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InventoryMissing { .. });
}

#[tokio::test]
async fn variant_of_another_product_is_rejected() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let address = app.seed_address(customer_id).await;
    let product = app.seed_product("Widget", dec!(10.00)).await;
    let other = app.seed_product("Gadget", dec!(7.00)).await;
    let foreign_variant = app.seed_variant(other.id, "SKU-G1", dec!(7.00)).await;
    app.seed_inventory(product.id, Some(foreign_variant.id), 5).await;

    let err = app
        .state
        .services
        .orders
        .create_order(
            customer_id,
            order_input(address.id, product.id, Some(foreign_variant.id), 1),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::VariantProductMismatch { .. });
}

#[tokio::test]
async fn losing_the_conditional_decrement_rolls_back_earlier_lines() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let address = app.seed_address(customer_id).await;
    let product = app.seed_product("Widget", dec!(10.00)).await;
    app.seed_inventory(product.id, None, 5).await;

    // Two lines against the same SKU: both pass the per-line pre-check at
    // available=5, the first reservation takes 3, the second fails its
    // conditional decrement (2 < 3).
    let mut input = order_input(address.id, product.id, None, 3);
    input.items.push(OrderItemInput {
        product_id: product.id,
        variant_id: None,
        quantity: 3,
        unit_price: None,
        total_price: None,
    });

    let err = app
        .state
        .services
        .orders
        .create_order(customer_id, input)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InventoryRace { .. });

    // The first line's reservation was compensated; no order row exists.
    assert_eq!(app.available(product.id, None).await, 5);
    assert!(order::Entity::find().all(&*app.state.db).await.unwrap().is_empty());
}

#[tokio::test]
async fn competing_orders_never_oversell() {
    let app = TestApp::new().await;
    let buyer_a = Uuid::new_v4();
    let buyer_b = Uuid::new_v4();

    let address_a = app.seed_address(buyer_a).await;
    let address_b = app.seed_address(buyer_b).await;
    let product = app.seed_product("Widget", dec!(10.00)).await;
    app.seed_inventory(product.id, None, 5).await;

    let orders = &app.state.services.orders;
    let (first, second) = tokio::join!(
        orders.create_order(buyer_a, order_input(address_a.id, product.id, None, 3)),
        orders.create_order(buyer_b, order_input(address_b.id, product.id, None, 3)),
    );

    let successes = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1, "exactly one of two competing orders wins");

    for result in [first, second] {
        if let Err(err) = result {
            assert_matches!(
                err,
                ServiceError::InventoryRace { .. } | ServiceError::InsufficientInventory { .. }
            );
        }
    }

    // 5 - 3 = 2, never negative.
    assert_eq!(app.available(product.id, None).await, 2);
}

#[tokio::test]
async fn fetching_a_foreign_order_is_unauthorized() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let created = app.checkout_order(owner).await;

    let err = app
        .state
        .services
        .orders
        .get_order(stranger, created.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));
}
