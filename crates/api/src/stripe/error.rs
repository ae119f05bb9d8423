//! Stripe-related errors.

use thiserror::Error;

/// Errors that can occur when calling the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed before Stripe answered.
    #[error("Stripe request failed: {0}")]
    Request(String),

    /// Stripe answered with something we could not parse.
    #[error("Stripe response error: {0}")]
    Response(String),

    /// Stripe rejected the request.
    #[error("Stripe API error ({status}): {message}")]
    Api {
        /// HTTP status returned by Stripe.
        status: u16,
        /// Human readable message from Stripe.
        message: String,
        /// Stripe error code, e.g. `card_declined`.
        code: Option<String>,
    },

    /// An amount could not be converted to minor units.
    #[error("invalid amount: {0}")]
    Amount(#[from] nature_marketplace_core::PriceError),
}

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Header missing `t=` or `v1=` parts.
    #[error("malformed signature header")]
    Malformed,

    /// Timestamp outside the tolerance window.
    #[error("signature timestamp outside tolerance")]
    Stale,

    /// No `v1` signature matched.
    #[error("signature mismatch")]
    Mismatch,
}
