use crate::{
    entities::{
        coupon, coupon_redemption,
        order::{self, AddressSnapshot, OrderStatus, PaymentState},
        order_item,
    },
    config::AppConfig,
    errors::{CouponRejection, ServiceError},
    events::{Event, EventSender},
    services::{
        collaborators::{AddressStore, BuyerProfileStore, CatalogStore},
        discounts::{CouponValidation, DiscountService},
        inventory::InventoryService,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Client prices may drift from the catalog by at most one cent before the
/// order is rejected as tampered.
const PRICE_TOLERANCE: Decimal = dec!(0.01);

/// One requested line of a checkout. `unit_price`/`total_price` are the
/// client's claims and are only ever compared against catalog prices, never
/// persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

/// Checkout request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub shipping_address_id: Uuid,
    pub billing_address_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemInput>,
    pub coupon_code: Option<String>,
    pub coupon_id: Option<Uuid>,
    pub shipping_fee: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A created or fetched order together with its line items.
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// A priced line: the catalog-authoritative counterpart of one
/// `OrderItemInput`, ready to be persisted and reserved.
struct PricedLine {
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
    title: String,
    variant_name: Option<String>,
    unit_price: Decimal,
    subtotal: Decimal,
}

struct OrderTotals {
    items_subtotal: Decimal,
    items_discount_total: Decimal,
    order_discount: Decimal,
    shipping_fee: Decimal,
    tax: Decimal,
    grand_total: Decimal,
}

/// Order assembler: validates a checkout request, recomputes authoritative
/// prices, reserves inventory, computes totals, and persists the order with
/// its line items and coupon redemption.
///
/// Write choreography: stock is reserved first through conditional
/// decrements, then every order-side row (order, items, coupon counter,
/// redemption) is written in one transaction. A failure on either side
/// restores the reservations already applied, so no unit of stock stays
/// sold without an order.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    inventory: InventoryService,
    discounts: DiscountService,
    address_store: Arc<dyn AddressStore>,
    catalog: Arc<dyn CatalogStore>,
    profile_store: Arc<dyn BuyerProfileStore>,
    event_sender: EventSender,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        inventory: InventoryService,
        discounts: DiscountService,
        address_store: Arc<dyn AddressStore>,
        catalog: Arc<dyn CatalogStore>,
        profile_store: Arc<dyn BuyerProfileStore>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            config,
            inventory,
            discounts,
            address_store,
            catalog,
            profile_store,
            event_sender,
        }
    }

    /// Creates an order from a checkout request.
    #[instrument(skip(self, input), fields(customer_id = %customer_id, item_count = input.items.len()))]
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<OrderWithItems, ServiceError> {
        input.validate()?;

        for item in &input.items {
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity must be a positive integer, got {} for product {}",
                    item.quantity, item.product_id
                )));
            }
        }
        if input.shipping_fee.is_some_and(|fee| fee < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Shipping fee cannot be negative".to_string(),
            ));
        }
        if input.tax.is_some_and(|tax| tax < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Tax cannot be negative".to_string(),
            ));
        }

        let shipping_address = self
            .address_store
            .find_owned_address(customer_id, input.shipping_address_id)
            .await?
            .ok_or(ServiceError::InvalidAddress(input.shipping_address_id))?;

        let billing_address = match input.billing_address_id {
            Some(address_id) => Some(
                self.address_store
                    .find_owned_address(customer_id, address_id)
                    .await?
                    .ok_or(ServiceError::InvalidAddress(address_id))?,
            ),
            None => None,
        };

        let priced = self.price_items(&input.items).await?;
        let items_subtotal: Decimal = priced.iter().map(|line| line.subtotal).sum();

        let coupon_validation = self
            .resolve_coupon(customer_id, &input, items_subtotal, &priced)
            .await?;

        let (order_discount, waives_shipping) = match &coupon_validation {
            Some(validation) => (validation.discount_amount, validation.waives_shipping),
            None => (Decimal::ZERO, false),
        };

        let shipping_fee = if waives_shipping {
            Decimal::ZERO
        } else {
            input.shipping_fee.unwrap_or(Decimal::ZERO)
        };

        let items_discount_total = Decimal::ZERO;
        let tax = input.tax.unwrap_or(Decimal::ZERO);
        let totals = OrderTotals {
            items_subtotal,
            items_discount_total,
            order_discount,
            shipping_fee,
            tax,
            grand_total: grand_total(
                items_subtotal,
                items_discount_total,
                order_discount,
                shipping_fee,
                tax,
            ),
        };

        // Reserve stock before any durable order row exists. Each decrement
        // is conditional on availability at write time; a loser gets its
        // earlier reservations put back and the whole order fails.
        let mut applied: Vec<&PricedLine> = Vec::new();
        for line in &priced {
            let reserved = match self
                .inventory
                .try_decrement(line.product_id, line.variant_id, line.quantity)
                .await
            {
                Ok(reserved) => reserved,
                Err(err) => {
                    self.rollback_reservations(&applied).await;
                    return Err(err);
                }
            };

            if !reserved {
                self.rollback_reservations(&applied).await;
                return Err(ServiceError::InventoryRace {
                    product_id: line.product_id,
                });
            }
            applied.push(line);
        }

        let order_id = Uuid::new_v4();
        let persisted = self
            .persist_order(
                customer_id,
                order_id,
                &input,
                &priced,
                &shipping_address,
                billing_address.as_ref(),
                coupon_validation.as_ref(),
                &totals,
            )
            .await;

        let (order, items) = match persisted {
            Ok(pair) => pair,
            Err(err) => {
                self.rollback_reservations(&applied).await;
                return Err(err);
            }
        };

        if let Err(err) = self
            .profile_store
            .append_order_history(customer_id, order.id)
            .await
        {
            // The order is already committed at this point.
            warn!(error = %err, order_id = %order.id, "Failed to append order history");
        }

        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;
        if let Some(validation) = &coupon_validation {
            self.event_sender
                .send_or_log(Event::CouponRedeemed {
                    coupon_id: validation.coupon.id,
                    order_id: order.id,
                    user_id: customer_id,
                    discount_amount: validation.discount_amount,
                })
                .await;
        }

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            grand_total = %order.grand_total,
            "Order created"
        );

        Ok(OrderWithItems { order, items })
    }

    /// Fetches an order with its items, enforcing ownership.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        if order.customer_id != customer_id {
            return Err(ServiceError::Unauthorized(
                "Order belongs to a different customer".to_string(),
            ));
        }

        let items = order.find_related(order_item::Entity).all(&*self.db).await?;

        Ok(OrderWithItems { order, items })
    }

    /// Resolves inventory and catalog state for every requested line and
    /// checks the client's claimed prices against the catalog.
    async fn price_items(
        &self,
        items: &[OrderItemInput],
    ) -> Result<Vec<PricedLine>, ServiceError> {
        let mut priced = Vec::with_capacity(items.len());

        for item in items {
            let level = self
                .inventory
                .get_level(item.product_id, item.variant_id)
                .await?
                .ok_or(ServiceError::InventoryMissing {
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                })?;

            // Pre-check only; the conditional decrement is the authority.
            if level.available < item.quantity {
                return Err(ServiceError::InsufficientInventory {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: level.available,
                });
            }

            let product = self
                .catalog
                .find_product(item.product_id)
                .await?
                .ok_or(ServiceError::ProductNotFound(item.product_id))?;

            let (variant_name, unit_price) = match item.variant_id {
                Some(variant_id) => {
                    let variant = self
                        .catalog
                        .find_variant(variant_id)
                        .await?
                        .ok_or(ServiceError::VariantNotFound(variant_id))?;

                    if variant.product_id != item.product_id {
                        return Err(ServiceError::VariantProductMismatch {
                            variant_id,
                            product_id: item.product_id,
                        });
                    }

                    (Some(variant.name), variant.price)
                }
                None => (None, product.price),
            };

            if let Some(claimed) = item.unit_price {
                if !within_tolerance(claimed, unit_price) {
                    return Err(ServiceError::UnitPriceMismatch {
                        product_id: item.product_id,
                        claimed,
                        actual: unit_price,
                    });
                }
            }

            let subtotal = unit_price * Decimal::from(item.quantity);
            if let Some(claimed) = item.total_price {
                if !within_tolerance(claimed, subtotal) {
                    return Err(ServiceError::TotalPriceMismatch {
                        product_id: item.product_id,
                        claimed,
                        actual: subtotal,
                    });
                }
            }

            priced.push(PricedLine {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                title: product.name,
                variant_name,
                unit_price,
                subtotal,
            });
        }

        Ok(priced)
    }

    /// Resolves the requested coupon, if any, and validates it against the
    /// order. When both code and id are supplied they must name the same
    /// coupon.
    async fn resolve_coupon(
        &self,
        customer_id: Uuid,
        input: &CreateOrderInput,
        items_subtotal: Decimal,
        priced: &[PricedLine],
    ) -> Result<Option<CouponValidation>, ServiceError> {
        let coupon = match (&input.coupon_code, input.coupon_id) {
            (None, None) => return Ok(None),
            (Some(code), None) => self
                .discounts
                .find_by_code(code)
                .await?
                .ok_or(ServiceError::CouponRejected(CouponRejection::InvalidCoupon))?,
            (None, Some(coupon_id)) => self
                .discounts
                .find_by_id(coupon_id)
                .await?
                .ok_or(ServiceError::CouponRejected(CouponRejection::InvalidCoupon))?,
            (Some(code), Some(coupon_id)) => {
                let coupon = self
                    .discounts
                    .find_by_id(coupon_id)
                    .await?
                    .ok_or(ServiceError::CouponRejected(CouponRejection::InvalidCoupon))?;
                if !coupon.code.eq_ignore_ascii_case(code.trim()) {
                    return Err(ServiceError::CouponMismatch);
                }
                coupon
            }
        };

        let product_ids: Vec<Uuid> = priced.iter().map(|line| line.product_id).collect();
        let validation =
            self.discounts
                .validate_coupon(&coupon, customer_id, items_subtotal, &product_ids)?;

        Ok(Some(validation))
    }

    /// Writes the order, its items, and the coupon redemption in one
    /// transaction. The coupon usage counter is bumped with a conditional
    /// UPDATE so a concurrent redemption cannot push it past the limit.
    #[allow(clippy::too_many_arguments)]
    async fn persist_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
        input: &CreateOrderInput,
        priced: &[PricedLine],
        shipping_address: &crate::entities::customer_address::Model,
        billing_address: Option<&crate::entities::customer_address::Model>,
        coupon_validation: Option<&CouponValidation>,
        totals: &OrderTotals,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let now = Utc::now();
        let currency = self.config.default_currency.clone();

        let shipping_snapshot = serde_json::to_value(AddressSnapshot::from(shipping_address))?;
        let billing_snapshot = billing_address
            .map(|address| serde_json::to_value(AddressSnapshot::from(address)))
            .transpose()?;

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!(
                "ORD-{}",
                order_id.to_string()[..8].to_uppercase()
            )),
            customer_id: Set(customer_id),
            currency: Set(currency.clone()),
            items_subtotal: Set(totals.items_subtotal),
            items_discount_total: Set(totals.items_discount_total),
            order_discount: Set(totals.order_discount),
            shipping_fee: Set(totals.shipping_fee),
            tax: Set(totals.tax),
            grand_total: Set(totals.grand_total),
            coupon_id: Set(coupon_validation.map(|v| v.coupon.id)),
            shipping_address: Set(shipping_snapshot),
            billing_address: Set(billing_snapshot),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentState::Unpaid),
            notes: Set(input.notes.clone()),
            metadata: Set(input.metadata.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(priced.len());
        for line in priced {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                title: Set(line.title.clone()),
                variant_name: Set(line.variant_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                subtotal: Set(line.subtotal),
                currency: Set(currency.clone()),
                created_at: Set(now),
            };
            items.push(item.insert(&txn).await?);
        }

        if let Some(validation) = coupon_validation {
            let mut update = coupon::Entity::update_many()
                .col_expr(
                    coupon::Column::UsageCount,
                    Expr::col(coupon::Column::UsageCount).add(1),
                )
                .col_expr(coupon::Column::UpdatedAt, Expr::value(now))
                .filter(coupon::Column::Id.eq(validation.coupon.id));
            if let Some(limit) = validation.coupon.usage_limit {
                update = update.filter(coupon::Column::UsageCount.lt(limit));
            }

            let result = update.exec(&txn).await?;
            if result.rows_affected == 0 {
                // A concurrent checkout consumed the last use between our
                // validation read and this write.
                return Err(ServiceError::CouponRejected(
                    CouponRejection::UsageLimitReached,
                ));
            }

            let redemption = coupon_redemption::ActiveModel {
                id: Set(Uuid::new_v4()),
                coupon_id: Set(validation.coupon.id),
                user_id: Set(customer_id),
                order_id: Set(order_id),
                discount_amount: Set(validation.discount_amount),
                redeemed_at: Set(now),
            };
            redemption.insert(&txn).await?;
        }

        txn.commit().await?;

        Ok((order, items))
    }

    /// Puts back reservations taken earlier in a failed call, newest first.
    async fn rollback_reservations(&self, applied: &[&PricedLine]) {
        for line in applied.iter().rev() {
            if let Err(err) = self
                .inventory
                .restore(line.product_id, line.variant_id, line.quantity)
                .await
            {
                error!(
                    error = %err,
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    "Failed to restore inventory reservation during rollback"
                );
            }
        }
    }
}

fn within_tolerance(claimed: Decimal, actual: Decimal) -> bool {
    (claimed - actual).abs() <= PRICE_TOLERANCE
}

/// `max(0, items_subtotal - items_discount_total - order_discount)
///   + shipping_fee + tax`
fn grand_total(
    items_subtotal: Decimal,
    items_discount_total: Decimal,
    order_discount: Decimal,
    shipping_fee: Decimal,
    tax: Decimal,
) -> Decimal {
    let discounted = (items_subtotal - items_discount_total - order_discount).max(Decimal::ZERO);
    discounted + shipping_fee + tax
}
