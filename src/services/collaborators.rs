//! Seams to the record managers this service depends on but does not own:
//! the customer address book, the product catalog, and the buyer profile.
//! Each is a trait so the checkout path can be exercised against mocks; the
//! default implementations read the backing tables directly.

use crate::{
    entities::{customer_address, product, product_variant, order_history},
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Returns the address only if it exists and belongs to the customer.
    async fn find_owned_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<customer_address::Model>, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<product::Model>, ServiceError>;

    async fn find_variant(
        &self,
        variant_id: Uuid,
    ) -> Result<Option<product_variant::Model>, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BuyerProfileStore: Send + Sync {
    /// Appends the order reference to the buyer's order history.
    async fn append_order_history(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError>;
}

/// Address store backed by the `customer_addresses` table.
pub struct SqlAddressStore {
    db: Arc<DatabaseConnection>,
}

impl SqlAddressStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AddressStore for SqlAddressStore {
    async fn find_owned_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<customer_address::Model>, ServiceError> {
        let address = customer_address::Entity::find_by_id(address_id)
            .filter(customer_address::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?;
        Ok(address)
    }
}

/// Catalog store backed by the `products` and `product_variants` tables.
pub struct SqlCatalogStore {
    db: Arc<DatabaseConnection>,
}

impl SqlCatalogStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for SqlCatalogStore {
    async fn find_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<product::Model>, ServiceError> {
        let found = product::Entity::find_by_id(product_id).one(&*self.db).await?;
        Ok(found)
    }

    async fn find_variant(
        &self,
        variant_id: Uuid,
    ) -> Result<Option<product_variant::Model>, ServiceError> {
        let found = product_variant::Entity::find_by_id(variant_id)
            .one(&*self.db)
            .await?;
        Ok(found)
    }
}

/// Buyer profile store backed by the `customer_order_history` table.
pub struct SqlBuyerProfileStore {
    db: Arc<DatabaseConnection>,
}

impl SqlBuyerProfileStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BuyerProfileStore for SqlBuyerProfileStore {
    async fn append_order_history(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let entry = order_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            order_id: Set(order_id),
            created_at: Set(Utc::now()),
        };
        entry.insert(&*self.db).await?;
        Ok(())
    }
}
