//! Order and payment lifecycle enums.
//!
//! # Order lifecycle
//!
//! ```text
//! Pending -> Paid -> Processing -> Fulfilled
//!    |        |  \________________/    |
//!    v        v           v            v
//! Cancelled  Cancelled  Refunded    Refunded
//! ```
//!
//! Transitions are validated here and applied with a conditional
//! `UPDATE ... WHERE status = $expected`.

use serde::{Deserialize, Serialize};

/// Error returned when an order status change is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move order from {from} to {to}")]
pub struct StatusTransitionError {
    /// Current status.
    pub from: OrderStatus,
    /// Requested status.
    pub to: OrderStatus,
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.order_status", rename_all = "snake_case")
)]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Fulfilled,
    Cancelled,
    Refunded,
}

str_enum!(OrderStatus, "order status", {
    Pending => "Pending",
    Paid => "Paid",
    Processing => "Processing",
    Fulfilled => "Fulfilled",
    Cancelled => "Cancelled",
    Refunded => "Refunded",
});

impl OrderStatus {
    /// Whether money has been collected for the order.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid | Self::Processing | Self::Fulfilled)
    }

    /// Whether the customer may still cancel.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }

    /// Whether the order may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (
                    Self::Paid,
                    Self::Processing | Self::Fulfilled | Self::Cancelled | Self::Refunded
                )
                | (Self::Processing, Self::Fulfilled | Self::Refunded)
                | (Self::Fulfilled, Self::Refunded)
        )
    }

    /// Validate a transition and return the new status.
    ///
    /// # Errors
    ///
    /// Returns [`StatusTransitionError`] if the transition is not allowed.
    pub const fn transition(self, next: Self) -> Result<Self, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                from: self,
                to: next,
            })
        }
    }
}

/// Payment status as tracked against Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
}

str_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Processing => "processing",
    Succeeded => "succeeded",
    Failed => "failed",
    Cancelled => "cancelled",
    Refunded => "refunded",
    PartiallyRefunded => "partially_refunded",
});

impl PaymentStatus {
    /// Whether the payment captured money (possibly partially refunded since).
    #[must_use]
    pub const fn is_captured(self) -> bool {
        matches!(self, Self::Succeeded | Self::PartiallyRefunded)
    }

    /// Whether no further webhook can change the payment.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Refunded)
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    ApplePay,
    GooglePay,
    BankTransfer,
}

str_enum!(PaymentMethod, "payment method", {
    Card => "card",
    ApplePay => "apple_pay",
    GooglePay => "google_pay",
    BankTransfer => "bank_transfer",
});

impl PaymentMethod {
    /// Map a Stripe card wallet type (`apple_pay`, `google_pay`) to a method.
    #[must_use]
    pub fn from_wallet(wallet: Option<&str>) -> Self {
        match wallet {
            Some("apple_pay") => Self::ApplePay,
            Some("google_pay") => Self::GooglePay,
            _ => Self::Card,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_paid_states() {
        assert!(!OrderStatus::Pending.is_paid());
        assert!(OrderStatus::Paid.is_paid());
        assert!(OrderStatus::Processing.is_paid());
        assert!(OrderStatus::Fulfilled.is_paid());
        assert!(!OrderStatus::Refunded.is_paid());
    }

    #[test]
    fn test_order_cancel_window() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Paid.can_cancel());
        assert!(!OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_order_transition_rejects_backwards() {
        let err = OrderStatus::Fulfilled
            .transition(OrderStatus::Pending)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move order from Fulfilled to Pending");
        assert_eq!(
            OrderStatus::Paid.transition(OrderStatus::Fulfilled),
            Ok(OrderStatus::Fulfilled)
        );
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Cancelled.can_transition_to(*next));
            assert!(!OrderStatus::Refunded.can_transition_to(*next));
        }
    }

    #[test]
    fn test_payment_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::PartiallyRefunded).unwrap(),
            "\"partially_refunded\""
        );
        assert!(PaymentStatus::PartiallyRefunded.is_captured());
        assert!(PaymentStatus::Refunded.is_final());
        assert!(!PaymentStatus::Pending.is_final());
    }

    #[test]
    fn test_payment_method_from_wallet() {
        assert_eq!(PaymentMethod::from_wallet(Some("apple_pay")), PaymentMethod::ApplePay);
        assert_eq!(PaymentMethod::from_wallet(None), PaymentMethod::Card);
    }
}
