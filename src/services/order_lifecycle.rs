use crate::{
    config::AppConfig,
    entities::{
        order::{self, AddressSnapshot, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{collaborators::AddressStore, inventory::InventoryService},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Enforces the order status state machine and blocks edits once an order
/// has shipped.
///
/// pending -> processing -> shipped -> delivered, with side exits to
/// cancelled (from pending/processing) and returned (from delivered).
/// Transitions are monotonic; cancelled and returned orders stay that way.
#[derive(Clone)]
pub struct OrderLifecycleService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    address_store: Arc<dyn AddressStore>,
    inventory: InventoryService,
    event_sender: EventSender,
}

/// Whether the state machine permits moving an order from `from` to `to`.
/// Re-asserting the current status is a permitted no-op.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    from == to
        || matches!(
            (from, to),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Delivered, Returned)
        )
}

impl OrderLifecycleService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        address_store: Arc<dyn AddressStore>,
        inventory: InventoryService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            config,
            address_store,
            inventory,
            event_sender,
        }
    }

    /// Replaces the order's shipping address snapshot. Permitted only while
    /// the order is pending or processing; the new address must belong to
    /// the buyer. Historical snapshots on other orders are unaffected.
    #[instrument(skip(self))]
    pub async fn update_shipping_address(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
        address_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = self.fetch_owned_order(customer_id, order_id).await?;

        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
            return Err(ServiceError::OrderLocked(format!(
                "shipping address cannot change once the order is {}",
                order.status
            )));
        }

        let address = self
            .address_store
            .find_owned_address(customer_id, address_id)
            .await?
            .ok_or(ServiceError::InvalidAddress(address_id))?;

        let snapshot = serde_json::to_value(AddressSnapshot::from(&address))?;

        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.shipping_address = Set(snapshot);
        active.updated_at = Set(Utc::now());
        active.version = Set(version + 1);
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ShippingAddressUpdated {
                order_id,
                address_id,
            })
            .await;

        info!(order_id = %order_id, address_id = %address_id, "Shipping address updated");
        Ok(updated)
    }

    /// Cancels the order. Idempotent when already cancelled; fails with
    /// `OrderLocked` once shipped, delivered, or returned. Cancelling puts
    /// the order's reserved stock back.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = self.fetch_owned_order(customer_id, order_id).await?;

        match order.status {
            OrderStatus::Cancelled => Ok(order),
            OrderStatus::Pending | OrderStatus::Processing => {
                let items = order.find_related(order_item::Entity).all(&*self.db).await?;

                let old_status = order.status;
                let version = order.version;
                let mut active: order::ActiveModel = order.into();
                active.status = Set(OrderStatus::Cancelled);
                active.updated_at = Set(Utc::now());
                active.version = Set(version + 1);
                let updated = active.update(&*self.db).await?;

                for item in &items {
                    if let Err(err) = self
                        .inventory
                        .restore(item.product_id, item.variant_id, item.quantity)
                        .await
                    {
                        error!(
                            error = %err,
                            order_id = %order_id,
                            product_id = %item.product_id,
                            "Failed to restore stock for cancelled order"
                        );
                    }
                }

                self.event_sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id,
                        old_status: old_status.to_string(),
                        new_status: OrderStatus::Cancelled.to_string(),
                    })
                    .await;
                self.event_sender
                    .send_or_log(Event::OrderCancelled(order_id))
                    .await;

                info!(order_id = %order_id, "Order cancelled");
                Ok(updated)
            }
            OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Returned => {
                Err(ServiceError::OrderLocked(format!(
                    "a {} order cannot be cancelled",
                    order.status
                )))
            }
        }
    }

    pub async fn mark_processing(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.transition(order_id, OrderStatus::Processing).await
    }

    pub async fn mark_shipped(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.transition(order_id, OrderStatus::Shipped).await
    }

    pub async fn mark_delivered(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.transition(order_id, OrderStatus::Delivered).await
    }

    pub async fn mark_returned(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.transition(order_id, OrderStatus::Returned).await
    }

    /// Lists a buyer's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let (page, per_page) = self.clamp_paging(page, per_page);

        let paginator = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok((orders, total))
    }

    /// Lists all orders, newest first. Operator listing.
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let (page, per_page) = self.clamp_paging(page, per_page);

        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok((orders, total))
    }

    /// Operator-level status transition through the state machine table.
    async fn transition(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        if order.status == new_status {
            return Ok(order);
        }

        if !can_transition(order.status, new_status) {
            return Err(ServiceError::ValidationError(format!(
                "Cannot transition order from '{}' to '{}'",
                order.status, new_status
            )));
        }

        let old_status = order.status;
        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        active.version = Set(version + 1);
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );
        Ok(updated)
    }

    async fn fetch_owned_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        if order.customer_id != customer_id {
            return Err(ServiceError::Unauthorized(
                "Order belongs to a different customer".to_string(),
            ));
        }

        Ok(order)
    }

    /// Clamps paging input to safe bounds: pages are 1-based and page sizes
    /// stay within `[1, max_page_size]`.
    fn clamp_paging(&self, page: u64, per_page: u64) -> (u64, u64) {
        let page = page.max(1);
        let per_page = if per_page == 0 {
            self.config.default_page_size
        } else {
            per_page
        }
        .clamp(1, self.config.max_page_size);

        (page, per_page)
    }
}
