//! Test harness: application state backed by an in-memory SQLite database,
//! plus seeding helpers for catalog, inventory, address, and coupon rows.
#![allow(dead_code)]

use checkout_api::{
    config::AppConfig,
    db::{establish_connection_with_config, DbConfig},
    entities::{coupon, customer_address, product, product_variant},
    events,
    migrator::Migrator,
    services::orders::{CreateOrderInput, OrderItemInput, OrderWithItems},
    AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use uuid::Uuid;

pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh application state over an in-memory database with gateway
    /// credentials configured.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like `new`, but lets the test tweak configuration before services
    /// are wired.
    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory
        // database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.gateway.key_id = Some("key_test_public".to_string());
        cfg.gateway.key_secret = Some("key_test_secret".to_string());
        customize(&mut cfg);

        let db_config = DbConfig::from_app_config(&cfg);
        let db = Arc::new(
            establish_connection_with_config(&db_config)
                .await
                .expect("connect test database"),
        );
        Migrator::up(&*db, None).await.expect("run migrations");

        let (event_sender, mut rx) = events::channel(64);
        let event_task = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let state = AppState::new(db, Arc::new(cfg), event_sender);

        Self {
            state,
            _event_task: event_task,
        }
    }

    pub fn gateway_secret(&self) -> String {
        self.state
            .config
            .gateway
            .key_secret
            .clone()
            .expect("test gateway secret")
    }

    pub async fn seed_address(&self, customer_id: Uuid) -> customer_address::Model {
        let now = Utc::now();
        customer_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            name: Set(Some("Home".to_string())),
            line1: Set("123 Test Street".to_string()),
            line2: Set(None),
            city: Set("Test City".to_string()),
            province: Set("CA".to_string()),
            country_code: Set("US".to_string()),
            postal_code: Set("90210".to_string()),
            phone: Set(None),
            is_default_shipping: Set(true),
            is_default_billing: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed address")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            currency: Set("USD".to_string()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_variant(
        &self,
        product_id: Uuid,
        sku: &str,
        price: Decimal,
    ) -> product_variant::Model {
        let now = Utc::now();
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            sku: Set(sku.to_string()),
            name: Set(format!("{sku} variant")),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed variant")
    }

    pub async fn seed_inventory(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        available: i32,
    ) {
        self.state
            .services
            .inventory
            .set_level(product_id, variant_id, available)
            .await
            .expect("seed inventory");
    }

    pub async fn available(&self, product_id: Uuid, variant_id: Option<Uuid>) -> i32 {
        self.state
            .services
            .inventory
            .get_level(product_id, variant_id)
            .await
            .expect("read inventory")
            .expect("inventory row")
            .available
    }

    /// Active 10%-off coupon with no caps or windows; tests adjust fields
    /// before inserting.
    pub fn coupon_base(code: &str) -> coupon::ActiveModel {
        let now = Utc::now();
        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_uppercase()),
            discount_type: Set(coupon::DiscountType::Percentage),
            percentage: Set(Some(dec!(10))),
            max_discount: Set(None),
            min_order_value: Set(None),
            usage_limit: Set(None),
            usage_count: Set(0),
            valid_from: Set(None),
            valid_to: Set(None),
            is_active: Set(true),
            allowed_user_ids: Set(None),
            allowed_product_ids: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    pub async fn insert_coupon(&self, model: coupon::ActiveModel) -> coupon::Model {
        model.insert(&*self.state.db).await.expect("seed coupon")
    }

    /// Seeds a product/variant with stock 10 and checks out 2 units at
    /// 10.00 each for the given customer: grand total 20.00, no coupon,
    /// no shipping fee or tax.
    pub async fn checkout_order(&self, customer_id: Uuid) -> OrderWithItems {
        let address = self.seed_address(customer_id).await;
        let product = self.seed_product("Widget", dec!(10.00)).await;
        let variant = self
            .seed_variant(product.id, &format!("SKU-{}", Uuid::new_v4().simple()), dec!(10.00))
            .await;
        self.seed_inventory(product.id, Some(variant.id), 10).await;

        let input = CreateOrderInput {
            shipping_address_id: address.id,
            billing_address_id: None,
            items: vec![OrderItemInput {
                product_id: product.id,
                variant_id: Some(variant.id),
                quantity: 2,
                unit_price: Some(dec!(10.00)),
                total_price: Some(dec!(20.00)),
            }],
            coupon_code: None,
            coupon_id: None,
            shipping_fee: None,
            tax: None,
            notes: None,
            metadata: None,
        };

        self.state
            .services
            .orders
            .create_order(customer_id, input)
            .await
            .expect("checkout order")
    }
}
