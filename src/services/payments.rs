use crate::{
    config::AppConfig,
    entities::{
        order::{self, PaymentState},
        payment_attempt::{self, AttemptStatus, PaymentMethod},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Session handed back to the client after initiating a gateway payment.
/// `key_id` is the gateway's public key material; the secret never leaves
/// the server.
#[derive(Debug, Serialize)]
pub struct GatewaySession {
    pub session_id: String,
    pub key_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Proof of payment submitted by the client after the gateway flow
/// completes. The signature covers (session id, payment id) and is verified
/// against the server-held secret; the gateway itself is untrusted input.
#[derive(Debug, Deserialize)]
pub struct GatewayPaymentProof {
    pub gateway_session_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Creates and tracks payment attempts for persisted orders: cash on
/// delivery and external-gateway payments with signature verification.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    event_sender: EventSender,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
        }
    }

    /// Registers a cash-on-delivery payment for the order. Idempotent: an
    /// existing pending or authorized COD attempt is reused rather than
    /// duplicated.
    #[instrument(skip(self))]
    pub async fn process_cod(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<payment_attempt::Model, ServiceError> {
        let order = self.fetch_owned_order(customer_id, order_id).await?;
        if order.payment_status == PaymentState::Paid {
            return Err(ServiceError::AlreadyPaid);
        }

        if let Some(existing) = payment_attempt::Entity::find()
            .filter(payment_attempt::Column::OrderId.eq(order_id))
            .filter(payment_attempt::Column::Method.eq(PaymentMethod::Cod))
            .filter(
                payment_attempt::Column::Status
                    .is_in([AttemptStatus::Pending, AttemptStatus::Authorized]),
            )
            .one(&*self.db)
            .await?
        {
            info!(order_id = %order_id, attempt_id = %existing.id, "Reusing open COD attempt");
            return Ok(existing);
        }

        let now = Utc::now();
        let attempt = payment_attempt::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            customer_id: Set(customer_id),
            currency: Set(order.currency.clone()),
            requested_amount: Set(order.grand_total),
            authorized_amount: Set(Decimal::ZERO),
            captured_amount: Set(Decimal::ZERO),
            refunded_amount: Set(Decimal::ZERO),
            method: Set(PaymentMethod::Cod),
            provider: Set(None),
            external_payment_id: Set(None),
            gateway_session_id: Set(None),
            status: Set(AttemptStatus::Pending),
            failure_reason: Set(None),
            gateway_metadata: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let attempt = attempt.insert(&*self.db).await?;

        self.mark_payment_pending(order).await?;

        self.event_sender
            .send_or_log(Event::PaymentAttemptCreated {
                order_id,
                attempt_id: attempt.id,
                method: attempt.method.to_string(),
            })
            .await;

        info!(order_id = %order_id, attempt_id = %attempt.id, "COD payment registered");
        Ok(attempt)
    }

    /// Opens a gateway session for the order's grand total and records a
    /// pending attempt carrying the session id.
    #[instrument(skip(self))]
    pub async fn initiate_gateway_payment(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
        method: PaymentMethod,
    ) -> Result<GatewaySession, ServiceError> {
        if method == PaymentMethod::Cod {
            return Err(ServiceError::ValidationError(
                "Cash on delivery is processed directly, not through the gateway".to_string(),
            ));
        }

        let order = self.fetch_owned_order(customer_id, order_id).await?;
        if order.payment_status == PaymentState::Paid {
            return Err(ServiceError::AlreadyPaid);
        }

        let key_id = self
            .config
            .gateway
            .key_id
            .clone()
            .ok_or_else(|| ServiceError::ConfigError("Gateway key id not configured".to_string()))?;
        if self.config.gateway.key_secret.is_none() {
            return Err(ServiceError::ConfigError(
                "Gateway key secret not configured".to_string(),
            ));
        }

        let factor = Decimal::from(self.config.gateway.currency_minor_factor);
        let amount_minor = (order.grand_total * factor)
            .round()
            .to_i64()
            .ok_or_else(|| {
                ServiceError::ValidationError("Order total out of gateway range".to_string())
            })?;

        let session_id = format!("sess_{}", Uuid::new_v4().simple());
        let now = Utc::now();
        let attempt = payment_attempt::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            customer_id: Set(customer_id),
            currency: Set(order.currency.clone()),
            requested_amount: Set(order.grand_total),
            authorized_amount: Set(Decimal::ZERO),
            captured_amount: Set(Decimal::ZERO),
            refunded_amount: Set(Decimal::ZERO),
            method: Set(method),
            provider: Set(Some(self.config.gateway.provider.clone())),
            external_payment_id: Set(None),
            gateway_session_id: Set(Some(session_id.clone())),
            status: Set(AttemptStatus::Pending),
            failure_reason: Set(None),
            gateway_metadata: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let attempt = attempt.insert(&*self.db).await?;

        let currency = order.currency.clone();
        self.mark_payment_pending(order).await?;

        self.event_sender
            .send_or_log(Event::PaymentAttemptCreated {
                order_id,
                attempt_id: attempt.id,
                method: method.to_string(),
            })
            .await;

        info!(order_id = %order_id, session_id = %session_id, "Gateway payment initiated");
        Ok(GatewaySession {
            session_id,
            key_id,
            amount_minor,
            currency,
        })
    }

    /// Verifies a gateway payment proof against the server-held secret and,
    /// on success, captures the pending attempt and marks the order paid.
    /// A bad signature fails the attempt and leaves the order untouched.
    #[instrument(skip(self, proof), fields(session_id = %proof.gateway_session_id))]
    pub async fn verify_gateway_payment(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
        proof: GatewayPaymentProof,
    ) -> Result<payment_attempt::Model, ServiceError> {
        let order = self.fetch_owned_order(customer_id, order_id).await?;

        let secret = self.config.gateway.key_secret.clone().ok_or_else(|| {
            ServiceError::ConfigError("Gateway key secret not configured".to_string())
        })?;

        let attempt = payment_attempt::Entity::find()
            .filter(payment_attempt::Column::OrderId.eq(order_id))
            .filter(
                payment_attempt::Column::GatewaySessionId
                    .eq(proof.gateway_session_id.clone()),
            )
            .filter(payment_attempt::Column::Status.eq(AttemptStatus::Pending))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::PendingPaymentNotFound(proof.gateway_session_id.clone())
            })?;

        let expected = sign_payment(
            &secret,
            &proof.gateway_session_id,
            &proof.gateway_payment_id,
        );

        if !constant_time_eq(&expected, &proof.signature) {
            warn!(order_id = %order_id, attempt_id = %attempt.id, "Payment signature mismatch");

            let attempt_id = attempt.id;
            let mut active: payment_attempt::ActiveModel = attempt.into();
            active.status = Set(AttemptStatus::Failed);
            active.failure_reason = Set(Some("signature_mismatch".to_string()));
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;

            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    order_id,
                    attempt_id,
                    reason: "signature_mismatch".to_string(),
                })
                .await;

            return Err(ServiceError::InvalidSignature);
        }

        let now = Utc::now();
        let requested = attempt.requested_amount;
        let attempt_id = attempt.id;

        let mut active: payment_attempt::ActiveModel = attempt.into();
        active.status = Set(AttemptStatus::Captured);
        active.authorized_amount = Set(requested);
        active.captured_amount = Set(requested);
        active.external_payment_id = Set(Some(proof.gateway_payment_id.clone()));
        active.updated_at = Set(now);
        let attempt = active.update(&*self.db).await?;

        let version = order.version;
        let mut active_order: order::ActiveModel = order.into();
        active_order.payment_status = Set(PaymentState::Paid);
        active_order.updated_at = Set(now);
        active_order.version = Set(version + 1);
        active_order.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentCaptured {
                order_id,
                attempt_id,
                amount: requested,
                captured_at: now,
            })
            .await;

        info!(order_id = %order_id, attempt_id = %attempt_id, "Payment captured");
        Ok(attempt)
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

    async fn mark_payment_pending(&self, order: order::Model) -> Result<(), ServiceError> {
        if order.payment_status == PaymentState::Pending {
            return Ok(());
        }

        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(PaymentState::Pending);
        active.updated_at = Set(Utc::now());
        active.version = Set(version + 1);
        active.update(&*self.db).await?;

        Ok(())
    }
}

/// HMAC-SHA256 over `"{session_id}|{payment_id}"`, hex-encoded. Both the
/// server (on verify) and tests (to forge valid proofs) use this.
pub fn sign_payment(secret: &str, session_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take a key of any size");
    mac.update(format!("{}|{}", session_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
