//! Payment queries and revenue aggregates.
//!
//! Webhook handlers look payments up with `FOR UPDATE` so that concurrent
//! deliveries of the same event serialize on the payment row.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use nature_marketplace_core::{CurrencyCode, PaymentMethod, PaymentStatus, UserId};

use super::RepositoryError;
use crate::models::payment::Payment;

const PAYMENT_COLUMNS: &str = r"
    id, order_id, user_id, stripe_payment_intent_id, stripe_checkout_session_id,
    stripe_customer_id, stripe_charge_id, status, payment_method, amount, currency,
    refunded_amount, card_last_four, card_brand, error_code, error_message, metadata,
    created_at, updated_at, completed_at
";

/// Which Stripe object a new payment is tracked by.
#[derive(Debug, Clone)]
pub enum StripeReference {
    CheckoutSession(String),
    PaymentIntent(String),
}

/// Fields for a new pending payment.
#[derive(Debug)]
pub struct NewPayment {
    pub order_id: Uuid,
    pub user_id: UserId,
    pub reference: StripeReference,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub metadata: serde_json::Value,
}

/// What Stripe told us about a successful charge.
#[derive(Debug, Default, Clone)]
pub struct PaymentSuccess {
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
    pub charge_id: Option<String>,
    pub card_brand: Option<String>,
    pub card_last_four: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

/// Repository for payment reads.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Payment by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: Uuid) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM marketplace.payment WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(payment)
    }

    /// Payments for an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM marketplace.payment WHERE order_id = $1 ORDER BY created_at DESC"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(payments)
    }

    /// A user's payments, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM marketplace.payment WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(payments)
    }

    /// Payments still waiting on Stripe, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending(&self, limit: i64) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            r"
            SELECT {PAYMENT_COLUMNS} FROM marketplace.payment
            WHERE status IN ('pending', 'processing')
            ORDER BY created_at
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(payments)
    }

    /// Money kept across all captured payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total_revenue(&self) -> Result<Decimal, RepositoryError> {
        let total: Decimal = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(amount - refunded_amount), 0)
            FROM marketplace.payment
            WHERE status IN ('succeeded', 'partially_refunded')
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(total)
    }

    /// Money a user has spent net of refunds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn user_total_spent(&self, user_id: UserId) -> Result<Decimal, RepositoryError> {
        let total: Decimal = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(amount - refunded_amount), 0)
            FROM marketplace.payment
            WHERE user_id = $1 AND status IN ('succeeded', 'partially_refunded')
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(total)
    }
}

/// Record a pending payment.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the Stripe id is already tracked.
#[instrument(skip(pool, payment), fields(order_id = %payment.order_id))]
pub async fn insert(pool: &PgPool, payment: &NewPayment) -> Result<Payment, RepositoryError> {
    let (session_id, intent_id) = match &payment.reference {
        StripeReference::CheckoutSession(id) => (Some(id.as_str()), None),
        StripeReference::PaymentIntent(id) => (None, Some(id.as_str())),
    };

    sqlx::query_as::<_, Payment>(&format!(
        r"
        INSERT INTO marketplace.payment (
            id, order_id, user_id, stripe_checkout_session_id, stripe_payment_intent_id,
            amount, currency, metadata
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {PAYMENT_COLUMNS}
        "
    ))
    .bind(Uuid::new_v4())
    .bind(payment.order_id)
    .bind(payment.user_id)
    .bind(session_id)
    .bind(intent_id)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(&payment.metadata)
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "payment already recorded"))
}

/// Lock a payment by id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM marketplace.payment WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(payment)
}

/// Lock a payment by its checkout session id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_session(
    conn: &mut PgConnection,
    session_id: &str,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM marketplace.payment WHERE stripe_checkout_session_id = $1 FOR UPDATE"
    ))
    .bind(session_id)
    .fetch_optional(conn)
    .await?;

    Ok(payment)
}

/// Lock a payment by its payment intent id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_intent(
    conn: &mut PgConnection,
    intent_id: &str,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM marketplace.payment WHERE stripe_payment_intent_id = $1 FOR UPDATE"
    ))
    .bind(intent_id)
    .fetch_optional(conn)
    .await?;

    Ok(payment)
}

/// The captured payment of an order that can still be refunded, if any.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_refundable_for_order(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        r"
        SELECT {PAYMENT_COLUMNS} FROM marketplace.payment
        WHERE order_id = $1
          AND status IN ('succeeded', 'partially_refunded')
          AND refunded_amount < amount
        ORDER BY completed_at DESC NULLS LAST
        LIMIT 1
        FOR UPDATE
        "
    ))
    .bind(order_id)
    .fetch_optional(conn)
    .await?;

    Ok(payment)
}

/// Mark a payment succeeded, keeping any Stripe ids already recorded.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_succeeded(
    conn: &mut PgConnection,
    id: Uuid,
    success: &PaymentSuccess,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE marketplace.payment
        SET status = 'succeeded',
            stripe_payment_intent_id = COALESCE($2, stripe_payment_intent_id),
            stripe_customer_id = COALESCE($3, stripe_customer_id),
            stripe_charge_id = COALESCE($4, stripe_charge_id),
            card_brand = COALESCE($5, card_brand),
            card_last_four = COALESCE($6, card_last_four),
            payment_method = COALESCE($7, payment_method),
            error_code = NULL,
            error_message = NULL,
            completed_at = COALESCE(completed_at, NOW()),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(success.payment_intent_id.as_deref())
    .bind(success.customer_id.as_deref())
    .bind(success.charge_id.as_deref())
    .bind(success.card_brand.as_deref())
    .bind(success.card_last_four.as_deref())
    .bind(success.payment_method)
    .execute(conn)
    .await?;

    Ok(())
}

/// Mark a payment failed with Stripe's error.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_failed(
    conn: &mut PgConnection,
    id: Uuid,
    error_code: Option<&str>,
    error_message: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE marketplace.payment
        SET status = 'failed', error_code = $2, error_message = $3, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(error_code)
    .bind(error_message)
    .execute(conn)
    .await?;

    Ok(())
}

/// Store a new refunded total and the status it implies.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_refunded(
    conn: &mut PgConnection,
    id: Uuid,
    refunded_amount: Decimal,
    status: PaymentStatus,
) -> Result<Payment, RepositoryError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        r"
        UPDATE marketplace.payment
        SET refunded_amount = $2, status = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {PAYMENT_COLUMNS}
        "
    ))
    .bind(id)
    .bind(refunded_amount)
    .bind(status)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(payment)
}
