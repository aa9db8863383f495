pub mod coupon;
pub mod coupon_redemption;
pub mod customer_address;
pub mod inventory_level;
pub mod order;
pub mod order_history;
pub mod order_item;
pub mod payment_attempt;
pub mod product;
pub mod product_variant;

pub use coupon::Entity as Coupon;
pub use coupon_redemption::Entity as CouponRedemption;
pub use customer_address::Entity as CustomerAddress;
pub use inventory_level::Entity as InventoryLevel;
pub use order::Entity as Order;
pub use order_history::Entity as OrderHistory;
pub use order_item::Entity as OrderItem;
pub use payment_attempt::Entity as PaymentAttempt;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;

pub use coupon::Model as CouponModel;
pub use inventory_level::Model as InventoryLevelModel;
pub use order::Model as OrderModel;
pub use order_item::Model as OrderItemModel;
pub use payment_attempt::Model as PaymentAttemptModel;
