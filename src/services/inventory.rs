use crate::{
    entities::inventory_level::{self, Entity as InventoryLevelEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Service for per-SKU stock levels.
///
/// Oversell protection hinges on one primitive: `try_decrement` issues a
/// single conditional UPDATE (`available = available - n` guarded by
/// `available >= n`) and reports whether a row was hit. Everything else here
/// is ordinary reads and writes.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    fn sku_filter(
        query: sea_orm::UpdateMany<InventoryLevelEntity>,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> sea_orm::UpdateMany<InventoryLevelEntity> {
        let query = query.filter(inventory_level::Column::ProductId.eq(product_id));
        match variant_id {
            Some(variant_id) => query.filter(inventory_level::Column::VariantId.eq(variant_id)),
            None => query.filter(inventory_level::Column::VariantId.is_null()),
        }
    }

    /// Looks up the stock record for one (product, variant) pair.
    #[instrument(skip(self))]
    pub async fn get_level(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Option<inventory_level::Model>, ServiceError> {
        let mut query = InventoryLevelEntity::find()
            .filter(inventory_level::Column::ProductId.eq(product_id));
        query = match variant_id {
            Some(variant_id) => query.filter(inventory_level::Column::VariantId.eq(variant_id)),
            None => query.filter(inventory_level::Column::VariantId.is_null()),
        };

        let level = query.one(&*self.db).await?;
        Ok(level)
    }

    /// Atomically subtracts `quantity` if at least that much is available at
    /// write time. Returns `false` when the guard fails, i.e. the caller
    /// lost a race or stock ran out since its pre-check.
    #[instrument(skip(self))]
    pub async fn try_decrement(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<bool, ServiceError> {
        let query = Self::sku_filter(
            InventoryLevelEntity::update_many()
                .col_expr(
                    inventory_level::Column::Available,
                    Expr::col(inventory_level::Column::Available).sub(quantity),
                )
                .col_expr(inventory_level::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(inventory_level::Column::Available.gte(quantity)),
            product_id,
            variant_id,
        );

        let result = query.exec(&*self.db).await?;
        let decremented = result.rows_affected > 0;

        if decremented {
            self.event_sender
                .send_or_log(Event::InventoryDecremented {
                    product_id,
                    variant_id,
                    quantity,
                })
                .await;
        }

        Ok(decremented)
    }

    /// Adds `quantity` back to the available count. Used to compensate
    /// partial reservations when a later step fails, and when an order is
    /// cancelled.
    #[instrument(skip(self))]
    pub async fn restore(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let query = Self::sku_filter(
            InventoryLevelEntity::update_many()
                .col_expr(
                    inventory_level::Column::Available,
                    Expr::col(inventory_level::Column::Available).add(quantity),
                )
                .col_expr(inventory_level::Column::UpdatedAt, Expr::value(Utc::now())),
            product_id,
            variant_id,
        );

        query.exec(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::InventoryRestored {
                product_id,
                variant_id,
                quantity,
            })
            .await;

        Ok(())
    }

    /// Creates or replaces the stock record for a SKU. Seeding helper for
    /// catalog onboarding and tests.
    #[instrument(skip(self))]
    pub async fn set_level(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        available: i32,
    ) -> Result<inventory_level::Model, ServiceError> {
        if let Some(existing) = self.get_level(product_id, variant_id).await? {
            let mut active: inventory_level::ActiveModel = existing.into();
            active.available = Set(available);
            active.updated_at = Set(Utc::now());
            let updated = active.update(&*self.db).await?;
            return Ok(updated);
        }

        let level = inventory_level::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            variant_id: Set(variant_id),
            available: Set(available),
            reserved: Set(0),
            updated_at: Set(Utc::now()),
        };

        let created = level.insert(&*self.db).await?;
        info!(%product_id, ?variant_id, available, "Inventory level seeded");
        Ok(created)
    }
}
