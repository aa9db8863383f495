use crate::{
    entities::coupon::{self, DiscountType, Entity as CouponEntity, Model as CouponModel},
    errors::{CouponRejection, ServiceError},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Validated coupon application: the resolved coupon, the monetary discount
/// it grants against the order subtotal, and whether it waives the shipping
/// fee. `free_shipping` coupons always carry a zero monetary discount; the
/// waiver is what they contribute.
#[derive(Debug, Clone)]
pub struct CouponValidation {
    pub coupon: CouponModel,
    pub discount_amount: Decimal,
    pub waives_shipping: bool,
}

/// Input to coupon validation.
#[derive(Debug, Clone)]
pub struct ValidateCouponInput {
    pub code: String,
    pub user_id: Uuid,
    pub order_total: Decimal,
    pub product_ids: Vec<Uuid>,
}

/// Discount engine: validates a coupon against its eligibility rules and
/// computes the discount amount. Pure query and computation; usage recording
/// happens in the order service.
#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DatabaseConnection>,
}

impl DiscountService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds a coupon by code, matched case-insensitively (codes are stored
    /// uppercase).
    pub async fn find_by_code(&self, code: &str) -> Result<Option<CouponModel>, ServiceError> {
        let coupon = CouponEntity::find()
            .filter(coupon::Column::Code.eq(code.trim().to_uppercase()))
            .one(&*self.db)
            .await?;
        Ok(coupon)
    }

    pub async fn find_by_id(&self, coupon_id: Uuid) -> Result<Option<CouponModel>, ServiceError> {
        let coupon = CouponEntity::find_by_id(coupon_id).one(&*self.db).await?;
        Ok(coupon)
    }

    /// Resolves the code and validates the coupon against the order.
    #[instrument(skip(self, input), fields(code = %input.code, user_id = %input.user_id))]
    pub async fn validate(
        &self,
        input: ValidateCouponInput,
    ) -> Result<CouponValidation, ServiceError> {
        let coupon = self
            .find_by_code(&input.code)
            .await?
            .ok_or(ServiceError::CouponRejected(CouponRejection::InvalidCoupon))?;

        self.validate_coupon(
            &coupon,
            input.user_id,
            input.order_total,
            &input.product_ids,
        )
    }

    /// Validates an already-resolved coupon against the order.
    pub fn validate_coupon(
        &self,
        coupon: &CouponModel,
        user_id: Uuid,
        order_total: Decimal,
        product_ids: &[Uuid],
    ) -> Result<CouponValidation, ServiceError> {
        let (discount_amount, waives_shipping) =
            evaluate(coupon, user_id, order_total, product_ids, Utc::now())
                .map_err(ServiceError::CouponRejected)?;

        debug!(
            coupon_id = %coupon.id,
            %discount_amount,
            waives_shipping,
            "Coupon validated"
        );

        Ok(CouponValidation {
            coupon: coupon.clone(),
            discount_amount,
            waives_shipping,
        })
    }
}

/// Runs every eligibility rule in order and computes the discount. Each
/// violated rule maps to its own rejection reason.
fn evaluate(
    coupon: &CouponModel,
    user_id: Uuid,
    order_total: Decimal,
    product_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<(Decimal, bool), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::InactiveCoupon);
    }

    if let Some(valid_from) = coupon.valid_from {
        if now < valid_from {
            return Err(CouponRejection::NotYetValid);
        }
    }

    if let Some(valid_to) = coupon.valid_to {
        if now > valid_to {
            return Err(CouponRejection::Expired);
        }
    }

    if let Some(limit) = coupon.usage_limit {
        if coupon.usage_count >= limit {
            return Err(CouponRejection::UsageLimitReached);
        }
    }

    if let Some(allowed_users) = coupon.allowed_user_ids() {
        if !allowed_users.contains(&user_id) {
            return Err(CouponRejection::UserNotEligible);
        }
    }

    if let Some(allowed_products) = coupon.allowed_product_ids() {
        if !product_ids.iter().any(|p| allowed_products.contains(p)) {
            return Err(CouponRejection::ProductsNotEligible);
        }
    }

    if let Some(min_order) = coupon.min_order_value {
        if order_total < min_order {
            return Err(CouponRejection::MinOrderNotMet);
        }
    }

    let discount = compute_discount(coupon, order_total)?;
    let waives_shipping = coupon.discount_type == DiscountType::FreeShipping;

    Ok((discount, waives_shipping))
}

/// Computes the monetary discount for an eligible coupon, clamped to
/// `[0, order_total]`.
fn compute_discount(
    coupon: &CouponModel,
    order_total: Decimal,
) -> Result<Decimal, CouponRejection> {
    let discount = match coupon.discount_type {
        DiscountType::Percentage => {
            // A percentage outside (0, 100] is a configuration mistake, not
            // a zero-discount coupon; reject it outright.
            let percentage = coupon.percentage.ok_or(CouponRejection::Misconfigured)?;
            if percentage <= Decimal::ZERO || percentage > Decimal::from(100) {
                return Err(CouponRejection::Misconfigured);
            }

            let raw = order_total * percentage / Decimal::from(100);
            match coupon.max_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        DiscountType::Fixed => {
            let amount = coupon.max_discount.ok_or(CouponRejection::Misconfigured)?;
            amount.min(order_total)
        }
        DiscountType::FreeShipping => Decimal::ZERO,
    };

    Ok(discount.max(Decimal::ZERO).min(order_total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType) -> CouponModel {
        CouponModel {
            id: Uuid::new_v4(),
            code: "SAVE10".to_string(),
            discount_type,
            percentage: None,
            max_discount: None,
            min_order_value: None,
            usage_limit: None,
            usage_count: 0,
            valid_from: None,
            valid_to: None,
            is_active: true,
            allowed_user_ids: None,
            allowed_product_ids: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_discount_without_cap() {
        let mut c = coupon(DiscountType::Percentage);
        c.percentage = Some(dec!(10));

        let (discount, waives) =
            evaluate(&c, Uuid::new_v4(), dec!(20.00), &[], Utc::now()).unwrap();
        assert_eq!(discount, dec!(2.00));
        assert!(!waives);
    }

    #[test]
    fn percentage_discount_respects_cap() {
        let mut c = coupon(DiscountType::Percentage);
        c.percentage = Some(dec!(50));
        c.max_discount = Some(dec!(5.00));

        let (discount, _) = evaluate(&c, Uuid::new_v4(), dec!(100.00), &[], Utc::now()).unwrap();
        assert_eq!(discount, dec!(5.00));
    }

    #[test]
    fn percentage_above_hundred_is_rejected() {
        let mut c = coupon(DiscountType::Percentage);
        c.percentage = Some(dec!(150));

        let err = evaluate(&c, Uuid::new_v4(), dec!(100.00), &[], Utc::now()).unwrap_err();
        assert_eq!(err, CouponRejection::Misconfigured);
    }

    #[test]
    fn fixed_discount_never_exceeds_order_total() {
        let mut c = coupon(DiscountType::Fixed);
        c.max_discount = Some(dec!(25.00));

        let (discount, _) = evaluate(&c, Uuid::new_v4(), dec!(10.00), &[], Utc::now()).unwrap();
        assert_eq!(discount, dec!(10.00));
    }

    #[test]
    fn free_shipping_grants_zero_discount_and_waiver() {
        let c = coupon(DiscountType::FreeShipping);

        let (discount, waives) =
            evaluate(&c, Uuid::new_v4(), dec!(40.00), &[], Utc::now()).unwrap();
        assert_eq!(discount, Decimal::ZERO);
        assert!(waives);
    }

    #[test]
    fn inactive_coupon_is_rejected() {
        let mut c = coupon(DiscountType::FreeShipping);
        c.is_active = false;

        let err = evaluate(&c, Uuid::new_v4(), dec!(40.00), &[], Utc::now()).unwrap_err();
        assert_eq!(err, CouponRejection::InactiveCoupon);
    }

    #[test]
    fn validity_window_is_enforced() {
        let now = Utc::now();

        let mut early = coupon(DiscountType::FreeShipping);
        early.valid_from = Some(now + Duration::days(1));
        assert_eq!(
            evaluate(&early, Uuid::new_v4(), dec!(40.00), &[], now).unwrap_err(),
            CouponRejection::NotYetValid
        );

        let mut late = coupon(DiscountType::FreeShipping);
        late.valid_to = Some(now - Duration::days(1));
        assert_eq!(
            evaluate(&late, Uuid::new_v4(), dec!(40.00), &[], now).unwrap_err(),
            CouponRejection::Expired
        );
    }

    #[test]
    fn usage_limit_is_enforced() {
        let mut c = coupon(DiscountType::FreeShipping);
        c.usage_limit = Some(1);
        c.usage_count = 1;

        let err = evaluate(&c, Uuid::new_v4(), dec!(40.00), &[], Utc::now()).unwrap_err();
        assert_eq!(err, CouponRejection::UsageLimitReached);
    }

    #[test]
    fn user_allow_list_is_enforced() {
        let allowed_user = Uuid::new_v4();
        let mut c = coupon(DiscountType::FreeShipping);
        c.allowed_user_ids = Some(serde_json::json!([allowed_user]));

        assert!(evaluate(&c, allowed_user, dec!(40.00), &[], Utc::now()).is_ok());
        assert_eq!(
            evaluate(&c, Uuid::new_v4(), dec!(40.00), &[], Utc::now()).unwrap_err(),
            CouponRejection::UserNotEligible
        );
    }

    #[test]
    fn product_allow_list_requires_intersection() {
        let eligible_product = Uuid::new_v4();
        let mut c = coupon(DiscountType::FreeShipping);
        c.allowed_product_ids = Some(serde_json::json!([eligible_product]));

        let other = Uuid::new_v4();
        assert!(evaluate(
            &c,
            Uuid::new_v4(),
            dec!(40.00),
            &[other, eligible_product],
            Utc::now()
        )
        .is_ok());
        assert_eq!(
            evaluate(&c, Uuid::new_v4(), dec!(40.00), &[other], Utc::now()).unwrap_err(),
            CouponRejection::ProductsNotEligible
        );
    }

    #[test]
    fn min_order_value_is_enforced() {
        let mut c = coupon(DiscountType::FreeShipping);
        c.min_order_value = Some(dec!(50.00));

        let err = evaluate(&c, Uuid::new_v4(), dec!(49.99), &[], Utc::now()).unwrap_err();
        assert_eq!(err, CouponRejection::MinOrderNotMet);
    }
}
