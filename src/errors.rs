use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard JSON error body returned by the API layer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Machine-readable error code (e.g., "inventory_race")
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Reasons a coupon can be rejected by the discount engine.
///
/// Each reason carries its own machine-readable code so callers can
/// distinguish, say, an expired coupon from one whose usage cap is spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
pub enum CouponRejection {
    #[error("coupon does not exist")]
    InvalidCoupon,
    #[error("coupon is not active")]
    InactiveCoupon,
    #[error("coupon is not yet valid")]
    NotYetValid,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    #[error("coupon is not available for this user")]
    UserNotEligible,
    #[error("coupon does not apply to any product in the order")]
    ProductsNotEligible,
    #[error("order total is below the coupon minimum")]
    MinOrderNotMet,
    #[error("coupon is misconfigured")]
    Misconfigured,
}

impl CouponRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCoupon => "coupon_not_found",
            Self::InactiveCoupon => "coupon_inactive",
            Self::NotYetValid => "coupon_not_yet_valid",
            Self::Expired => "coupon_expired",
            Self::UsageLimitReached => "coupon_usage_limit_reached",
            Self::UserNotEligible => "coupon_user_not_eligible",
            Self::ProductsNotEligible => "coupon_products_not_eligible",
            Self::MinOrderNotMet => "coupon_min_order_not_met",
            Self::Misconfigured => "coupon_misconfigured",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Address {0} not found or not owned by this customer")]
    InvalidAddress(Uuid),

    #[error("No inventory record for product {product_id} (variant {variant_id:?})")]
    InventoryMissing {
        product_id: Uuid,
        variant_id: Option<Uuid>,
    },

    #[error("Variant {0} not found")]
    VariantNotFound(Uuid),

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Variant {variant_id} does not belong to product {product_id}")]
    VariantProductMismatch { variant_id: Uuid, product_id: Uuid },

    #[error(
        "Insufficient inventory for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Inventory for product {product_id} changed while reserving; retry the order")]
    InventoryRace { product_id: Uuid },

    #[error(
        "Unit price mismatch for product {product_id}: client sent {claimed}, catalog price is {actual}"
    )]
    UnitPriceMismatch {
        product_id: Uuid,
        claimed: Decimal,
        actual: Decimal,
    },

    #[error(
        "Total price mismatch for product {product_id}: client sent {claimed}, computed {actual}"
    )]
    TotalPriceMismatch {
        product_id: Uuid,
        claimed: Decimal,
        actual: Decimal,
    },

    #[error("Coupon code and coupon id refer to different coupons")]
    CouponMismatch,

    #[error("Coupon rejected: {0}")]
    CouponRejected(CouponRejection),

    #[error("Order is locked: {0}")]
    OrderLocked(String),

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("No pending payment attempt for session {0}")]
    PendingPaymentNotFound(String),

    #[error("Payment signature verification failed")]
    InvalidSignature,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Machine-readable code carried alongside every failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::ValidationError(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::OrderNotFound(_) => "order_not_found",
            Self::InvalidAddress(_) => "invalid_address",
            Self::InventoryMissing { .. } => "inventory_missing",
            Self::VariantNotFound(_) => "variant_not_found",
            Self::ProductNotFound(_) => "product_not_found",
            Self::VariantProductMismatch { .. } => "variant_product_mismatch",
            Self::InsufficientInventory { .. } => "insufficient_inventory",
            Self::InventoryRace { .. } => "inventory_race",
            Self::UnitPriceMismatch { .. } => "unit_price_mismatch",
            Self::TotalPriceMismatch { .. } => "total_price_mismatch",
            Self::CouponMismatch => "coupon_mismatch",
            Self::CouponRejected(reason) => reason.code(),
            Self::OrderLocked(_) => "order_locked",
            Self::AlreadyPaid => "already_paid",
            Self::PendingPaymentNotFound(_) => "pending_payment_not_found",
            Self::InvalidSignature => "invalid_signature",
            Self::ConfigError(_) => "config_error",
            Self::Conflict(_) => "conflict",
            Self::ExternalServiceError(_) => "external_service_error",
            Self::SerializationError(_) => "serialization_error",
        }
    }

    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidAddress(_) => StatusCode::FORBIDDEN,
            Self::OrderNotFound(_)
            | Self::VariantNotFound(_)
            | Self::ProductNotFound(_)
            | Self::PendingPaymentNotFound(_)
            | Self::InventoryMissing { .. } => StatusCode::NOT_FOUND,
            Self::InsufficientInventory { .. }
            | Self::UnitPriceMismatch { .. }
            | Self::TotalPriceMismatch { .. }
            | Self::VariantProductMismatch { .. }
            | Self::CouponMismatch
            | Self::CouponRejected(_)
            | Self::OrderLocked(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InventoryRace { .. } | Self::AlreadyPaid | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::ConfigError(_) | Self::SerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// text to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.error_code().to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping_per_error_class() {
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::InvalidAddress(Uuid::new_v4()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::OrderNotFound(Uuid::new_v4()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InventoryRace {
                product_id: Uuid::new_v4()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(ServiceError::AlreadyPaid.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::OrderLocked("shipped".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::ConfigError("missing key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            ServiceError::InventoryRace {
                product_id: Uuid::new_v4()
            }
            .error_code(),
            "inventory_race"
        );
        assert_eq!(
            ServiceError::CouponRejected(CouponRejection::UsageLimitReached).error_code(),
            "coupon_usage_limit_reached"
        );
        assert_eq!(
            ServiceError::CouponRejected(CouponRejection::Expired).error_code(),
            "coupon_expired"
        );
        assert_eq!(ServiceError::AlreadyPaid.error_code(), "already_paid");
    }

    #[test]
    fn database_errors_hide_details() {
        let err = ServiceError::DatabaseError(DbErr::Custom("secret dsn".into()));
        assert_eq!(err.response_message(), "Database error");
    }
}
