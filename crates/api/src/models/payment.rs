//! Payment models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use nature_marketplace_core::{CurrencyCode, PaymentMethod, PaymentStatus, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: UserId,

    pub stripe_payment_intent_id: Option<String>,
    pub stripe_checkout_session_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_charge_id: Option<String>,

    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub refunded_amount: Decimal,

    pub card_last_four: Option<String>,
    pub card_brand: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    #[serde(skip_serializing)]
    pub metadata: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Captured and not yet fully refunded.
    #[must_use]
    pub fn is_refundable(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Succeeded | PaymentStatus::PartiallyRefunded
        ) && self.refunded_amount < self.amount
    }

    /// Amount kept after refunds.
    #[must_use]
    pub fn net_amount(&self) -> Decimal {
        self.amount - self.refunded_amount
    }

    /// Status after `refunded_total` has been returned to the customer.
    #[must_use]
    pub fn status_after_refund(&self, refunded_total: Decimal) -> PaymentStatus {
        if refunded_total >= self.amount {
            PaymentStatus::Refunded
        } else if refunded_total > Decimal::ZERO {
            PaymentStatus::PartiallyRefunded
        } else {
            self.status
        }
    }
}

/// Payment line shown on order status pages and in history.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub refunded_amount: Decimal,
    pub currency: CurrencyCode,
    pub card_brand: Option<String>,
    pub card_last_four: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentSummary {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id,
            order_id: p.order_id,
            status: p.status,
            amount: p.amount,
            refunded_amount: p.refunded_amount,
            currency: p.currency,
            card_brand: p.card_brand.clone(),
            card_last_four: p.card_last_four.clone(),
            created_at: p.created_at,
            completed_at: p.completed_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::str::FromStr;

    use super::*;

    pub(crate) fn payment(status: PaymentStatus, amount: &str, refunded: &str) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            user_id: UserId::new(1),
            stripe_payment_intent_id: Some("pi_123".to_string()),
            stripe_checkout_session_id: None,
            stripe_customer_id: None,
            stripe_charge_id: None,
            status,
            payment_method: PaymentMethod::Card,
            amount: Decimal::from_str(amount).unwrap(),
            currency: CurrencyCode::USD,
            refunded_amount: Decimal::from_str(refunded).unwrap(),
            card_last_four: None,
            card_brand: None,
            error_code: None,
            error_message: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_refundable_rules() {
        assert!(payment(PaymentStatus::Succeeded, "50.00", "0").is_refundable());
        assert!(payment(PaymentStatus::PartiallyRefunded, "50.00", "20.00").is_refundable());
        assert!(!payment(PaymentStatus::PartiallyRefunded, "50.00", "50.00").is_refundable());
        assert!(!payment(PaymentStatus::Pending, "50.00", "0").is_refundable());
        assert!(!payment(PaymentStatus::Failed, "50.00", "0").is_refundable());
    }

    #[test]
    fn test_net_amount_and_refund_status() {
        let p = payment(PaymentStatus::Succeeded, "50.00", "20.00");
        assert_eq!(p.net_amount(), Decimal::from_str("30.00").unwrap());
        assert_eq!(
            p.status_after_refund(Decimal::from_str("20.00").unwrap()),
            PaymentStatus::PartiallyRefunded
        );
        assert_eq!(
            p.status_after_refund(Decimal::from_str("50.00").unwrap()),
            PaymentStatus::Refunded
        );
        assert_eq!(p.status_after_refund(Decimal::ZERO), PaymentStatus::Succeeded);
    }
}
