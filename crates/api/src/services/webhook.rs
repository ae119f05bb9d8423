//! Stripe webhook processing.
//!
//! Each event is handled inside one transaction with the payment row
//! locked, so concurrent redeliveries serialize and a payment that has
//! already succeeded is never fulfilled twice.

use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use nature_marketplace_core::{PaymentMethod, PaymentStatus, Price};

use crate::db::payments::{self, PaymentSuccess};
use crate::db::{RepositoryError, orders as order_rows, units};
use crate::error::add_breadcrumb;
use crate::models::payment::Payment;
use crate::services::ecosystem::{self, EcosystemError};
use crate::services::orders::{self, OrderError};
use crate::services::payments::refund_in_tx;
use crate::stripe::types::Charge;
use crate::stripe::webhook::verify_signature;
use crate::stripe::{
    CheckoutSession, Event, PaymentIntent, SignatureError, StripeClient, StripeError,
};

/// Message stored when Stripe gives no reason for a failure.
const DEFAULT_FAILURE_MESSAGE: &str = "Payment failed";

/// Errors from webhook handling.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing Stripe signature")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature(#[from] SignatureError),

    #[error("Invalid payload")]
    InvalidPayload,

    #[error("Payment not found")]
    PaymentNotFound,

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Ecosystem(#[from] EcosystemError),

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for WebhookError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// What happened to an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    /// Redelivery of an event whose effects are already recorded.
    AlreadyProcessed,
    /// Event type we don't act on.
    Ignored,
}

/// Stripe webhook handler.
pub struct WebhookService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    secret: &'a SecretString,
}

impl<'a> WebhookService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, secret: &'a SecretString) -> Self {
        Self {
            pool,
            stripe,
            secret,
        }
    }

    /// Verify and apply one webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MissingSignature` or `WebhookError::InvalidSignature`
    /// when the delivery can't be authenticated.
    /// Returns `WebhookError::InvalidPayload` if the body isn't a Stripe event.
    /// Returns `WebhookError::PaymentNotFound` for events about unknown payments.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let event = parse_event(self.secret, payload, signature, Utc::now().timestamp())?;
        self.dispatch(event).await
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.kind))]
    async fn dispatch(&self, event: Event) -> Result<WebhookOutcome, WebhookError> {
        let outcome = match event.kind.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSession = object(event)?;
                self.checkout_completed(&session).await?
            }
            "payment_intent.succeeded" => {
                let intent: PaymentIntent = object(event)?;
                self.intent_succeeded(&intent).await?
            }
            "payment_intent.payment_failed" => {
                let intent: PaymentIntent = object(event)?;
                self.intent_failed(&intent).await?
            }
            "charge.refunded" => {
                let charge: Charge = object(event)?;
                self.charge_refunded(&charge).await?
            }
            other => {
                info!(event_type = other, "Unhandled webhook event");
                WebhookOutcome::Ignored
            }
        };

        Ok(outcome)
    }

    async fn checkout_completed(
        &self,
        session: &CheckoutSession,
    ) -> Result<WebhookOutcome, WebhookError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::lock_by_session(&mut tx, &session.id)
            .await?
            .ok_or(WebhookError::PaymentNotFound)?;

        let outcome = settle(&mut tx, self.stripe, &payment, &success_from_session(session)).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn intent_succeeded(&self, intent: &PaymentIntent) -> Result<WebhookOutcome, WebhookError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::lock_by_intent(&mut tx, &intent.id)
            .await?
            .ok_or(WebhookError::PaymentNotFound)?;

        let outcome = settle(&mut tx, self.stripe, &payment, &success_from_intent(intent)).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn intent_failed(&self, intent: &PaymentIntent) -> Result<WebhookOutcome, WebhookError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::lock_by_intent(&mut tx, &intent.id)
            .await?
            .ok_or(WebhookError::PaymentNotFound)?;

        if !records_failure(payment.status) {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let (code, message) = failure_from_intent(intent);
        payments::mark_failed(&mut tx, payment.id, code, message).await?;
        let released = units::release_reservations(&mut tx, payment.order_id).await?;
        tx.commit().await?;

        warn!(payment_id = %payment.id, code = code.unwrap_or_default(), message, released, "Payment failed");
        Ok(WebhookOutcome::Processed)
    }

    async fn charge_refunded(&self, charge: &Charge) -> Result<WebhookOutcome, WebhookError> {
        let intent_id = charge
            .payment_intent
            .as_deref()
            .ok_or(WebhookError::InvalidPayload)?;

        let mut tx = self.pool.begin().await?;
        let payment = payments::lock_by_intent(&mut tx, intent_id)
            .await?
            .ok_or(WebhookError::PaymentNotFound)?;

        let refunded = Price::from_minor_units(charge.amount_refunded, payment.currency).amount;
        if refunded == payment.refunded_amount {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let updated = payments::set_refunded(
            &mut tx,
            payment.id,
            refunded,
            payment.status_after_refund(refunded),
        )
        .await?;
        if updated.status == PaymentStatus::Refunded {
            orders::mark_refunded(&mut tx, updated.order_id).await?;
        }
        tx.commit().await?;

        info!(payment_id = %payment.id, %refunded, status = %updated.status, "Refund synced");
        Ok(WebhookOutcome::Processed)
    }
}

/// Verify the signature header and decode the event.
///
/// # Errors
///
/// Returns the signature or payload error that rejected the delivery.
pub fn parse_event(
    secret: &SecretString,
    payload: &[u8],
    signature: Option<&str>,
    now: i64,
) -> Result<Event, WebhookError> {
    let signature = signature.ok_or(WebhookError::MissingSignature)?;
    verify_signature(secret, payload, signature, now)?;
    serde_json::from_slice(payload).map_err(|_| WebhookError::InvalidPayload)
}

fn object<T: DeserializeOwned>(event: Event) -> Result<T, WebhookError> {
    serde_json::from_value(event.data.object).map_err(|_| WebhookError::InvalidPayload)
}

/// Whether a success event still has to settle a payment in `status`.
///
/// Once a payment has succeeded, been refunded, or partially refunded, its
/// order was already paid and fulfilled, so redeliveries create nothing.
/// A failed attempt can still be followed by a successful one.
#[must_use]
pub const fn settles(status: PaymentStatus) -> bool {
    !(status.is_captured() || matches!(status, PaymentStatus::Refunded))
}

/// Whether a failure event is recorded against a payment in `status`.
#[must_use]
pub const fn records_failure(status: PaymentStatus) -> bool {
    !(status.is_captured() || status.is_final())
}

/// Mark a locked payment succeeded, pay its order, and fulfil adoptions.
///
/// Units that another order took before this payment landed are refunded
/// straight away.
async fn settle(
    conn: &mut PgConnection,
    stripe: &StripeClient,
    payment: &Payment,
    success: &PaymentSuccess,
) -> Result<WebhookOutcome, WebhookError> {
    if !settles(payment.status) {
        info!(payment_id = %payment.id, "Payment already settled");
        return Ok(WebhookOutcome::AlreadyProcessed);
    }

    payments::mark_succeeded(conn, payment.id, success).await?;
    info!(payment_id = %payment.id, order_id = %payment.order_id, "Payment succeeded");

    if orders::mark_paid(conn, payment.order_id).await? {
        let order = order_rows::lock(conn, payment.order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let fulfilment = ecosystem::fulfil_order_adoptions(conn, &order).await?;
        add_breadcrumb(
            "payment",
            "Order paid",
            Some(&[("order_number", order.order_number.as_str())]),
        );
        info!(order_id = %order.id, trees = fulfilment.trees.len(), "Order fulfilled");

        let refund_due = fulfilment.refund_due();
        if refund_due > Decimal::ZERO {
            refund_unclaimed(conn, stripe, payment, success, refund_due).await?;
        }
    }

    Ok(WebhookOutcome::Processed)
}

async fn refund_unclaimed(
    conn: &mut PgConnection,
    stripe: &StripeClient,
    payment: &Payment,
    success: &PaymentSuccess,
    amount: Decimal,
) -> Result<(), WebhookError> {
    let intent_id = success
        .payment_intent_id
        .as_deref()
        .or(payment.stripe_payment_intent_id.as_deref());
    let Some(intent_id) = intent_id else {
        error!(payment_id = %payment.id, %amount, "No payment intent to refund unclaimed units");
        return Ok(());
    };

    let updated = refund_in_tx::<WebhookError>(conn, stripe, payment, intent_id, amount).await?;
    if updated.status == PaymentStatus::Refunded {
        orders::mark_refunded(conn, updated.order_id).await?;
    }
    warn!(payment_id = %payment.id, %amount, status = %updated.status, "Refunded unclaimed units");
    Ok(())
}

fn success_from_session(session: &CheckoutSession) -> PaymentSuccess {
    let intent = session.payment_intent.as_ref();
    let mut success = intent
        .and_then(|intent| intent.as_object())
        .map(success_from_intent)
        .unwrap_or_default();

    success.payment_intent_id = intent.map(|intent| intent.id().to_string());
    if let Some(customer) = &session.customer {
        success.customer_id = Some(customer.id().to_string());
    }
    success
}

fn success_from_intent(intent: &PaymentIntent) -> PaymentSuccess {
    let card = intent.card();
    PaymentSuccess {
        payment_intent_id: Some(intent.id.clone()),
        customer_id: intent.customer.as_ref().map(|c| c.id().to_string()),
        charge_id: intent.charge_id().map(str::to_string),
        card_brand: card.and_then(|c| c.brand.clone()),
        card_last_four: card.and_then(|c| c.last4.clone()),
        payment_method: card.map(|c| {
            PaymentMethod::from_wallet(c.wallet.as_ref().map(|w| w.kind.as_str()))
        }),
    }
}

fn failure_from_intent(intent: &PaymentIntent) -> (Option<&str>, &str) {
    let error = intent.last_payment_error.as_ref();
    let code = error.and_then(|e| e.code.as_deref());
    let message = error
        .and_then(|e| e.message.as_deref())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE);
    (code, message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::stripe::webhook::compute_signature;

    const SECRET: &str = "whsec_7Lm2Qx9Rt4Vb8Nc1";
    const NOW: i64 = 1_760_000_000;

    fn signed(payload: &[u8], at: i64) -> String {
        format!("t={at},v1={}", compute_signature(SECRET, at, payload))
    }

    #[test]
    fn test_parse_event_requires_signature() {
        let secret = SecretString::from(SECRET);
        let err = parse_event(&secret, b"{}", None, NOW).unwrap_err();
        assert_eq!(err.to_string(), "Missing Stripe signature");
    }

    #[test]
    fn test_parse_event_rejects_tampered_body() {
        let secret = SecretString::from(SECRET);
        let header = signed(b"{\"id\":\"evt_1\"}", NOW);
        let err = parse_event(&secret, b"{\"id\":\"evt_2\"}", Some(&header), NOW).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(SignatureError::Mismatch)));
        assert_eq!(err.to_string(), "Invalid signature");
    }

    #[test]
    fn test_parse_event_rejects_non_event_json() {
        let secret = SecretString::from(SECRET);
        let body = b"[1,2,3]";
        let header = signed(body, NOW);
        assert!(matches!(
            parse_event(&secret, body, Some(&header), NOW),
            Err(WebhookError::InvalidPayload)
        ));
    }

    #[test]
    fn test_parse_event_accepts_signed_event() {
        let secret = SecretString::from(SECRET);
        let body = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_1"}}
        })
        .to_string();
        let header = signed(body.as_bytes(), NOW - 10);
        let event = parse_event(&secret, body.as_bytes(), Some(&header), NOW).unwrap();
        assert_eq!(event.kind, "checkout.session.completed");

        let session: CheckoutSession = object(event).unwrap();
        assert_eq!(session.id, "cs_test_1");
    }

    #[test]
    fn test_success_from_session_with_ids() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": "cs_test_1",
            "payment_intent": "pi_123",
            "customer": "cus_9"
        }))
        .unwrap();
        let success = success_from_session(&session);
        assert_eq!(success.payment_intent_id.as_deref(), Some("pi_123"));
        assert_eq!(success.customer_id.as_deref(), Some("cus_9"));
        assert!(success.charge_id.is_none());
    }

    #[test]
    fn test_success_from_intent_reads_card() {
        let intent: PaymentIntent = serde_json::from_value(json!({
            "id": "pi_123",
            "latest_charge": {
                "id": "ch_1",
                "payment_method_details": {
                    "card": {"brand": "visa", "last4": "4242", "wallet": {"type": "apple_pay"}}
                }
            }
        }))
        .unwrap();
        let success = success_from_intent(&intent);
        assert_eq!(success.charge_id.as_deref(), Some("ch_1"));
        assert_eq!(success.card_brand.as_deref(), Some("visa"));
        assert_eq!(success.card_last_four.as_deref(), Some("4242"));
        assert_eq!(success.payment_method, Some(PaymentMethod::ApplePay));
    }

    #[test]
    fn test_failure_defaults_message() {
        let intent: PaymentIntent = serde_json::from_value(json!({"id": "pi_1"})).unwrap();
        assert_eq!(failure_from_intent(&intent), (None, "Payment failed"));

        let intent: PaymentIntent = serde_json::from_value(json!({
            "id": "pi_1",
            "last_payment_error": {"code": "card_declined", "message": "Your card was declined."}
        }))
        .unwrap();
        assert_eq!(
            failure_from_intent(&intent),
            (Some("card_declined"), "Your card was declined.")
        );
    }
}
