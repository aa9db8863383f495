// Checkout core
pub mod discounts;
pub mod inventory;
pub mod orders;

// Post-checkout lifecycle
pub mod order_lifecycle;
pub mod payments;

// Seams to external record managers
pub mod collaborators;

use crate::{config::AppConfig, events::EventSender};
use collaborators::{
    AddressStore, BuyerProfileStore, CatalogStore, SqlAddressStore, SqlBuyerProfileStore,
    SqlCatalogStore,
};
use discounts::DiscountService;
use inventory::InventoryService;
use order_lifecycle::OrderLifecycleService;
use orders::OrderService;
use payments::PaymentService;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All services wired with shared dependencies.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: InventoryService,
    pub discounts: DiscountService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub lifecycle: OrderLifecycleService,
}

impl AppServices {
    /// Builds every service against the given database, with SQL-backed
    /// collaborator stores.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: EventSender,
    ) -> Self {
        let address_store: Arc<dyn AddressStore> = Arc::new(SqlAddressStore::new(db.clone()));
        let catalog: Arc<dyn CatalogStore> = Arc::new(SqlCatalogStore::new(db.clone()));
        let profile_store: Arc<dyn BuyerProfileStore> =
            Arc::new(SqlBuyerProfileStore::new(db.clone()));

        let inventory = InventoryService::new(db.clone(), event_sender.clone());
        let discounts = DiscountService::new(db.clone());

        let orders = OrderService::new(
            db.clone(),
            config.clone(),
            inventory.clone(),
            discounts.clone(),
            address_store.clone(),
            catalog,
            profile_store,
            event_sender.clone(),
        );
        let payments = PaymentService::new(db.clone(), config.clone(), event_sender.clone());
        let lifecycle = OrderLifecycleService::new(
            db,
            config,
            address_store,
            inventory.clone(),
            event_sender,
        );

        Self {
            inventory,
            discounts,
            orders,
            payments,
            lifecycle,
        }
    }
}
