//! Cross-crate tests for the Nature Marketplace.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p nature-marketplace-integration-tests
//! ```
//!
//! # Test Files
//!
//! - `order_lifecycle` - Order and payment status machines
//! - `gamification_levels` - Level thresholds and progress
//! - `stripe_webhook` - Signature contract and event payload parsing
//! - `money` - Decimal amounts, minor units, and checkout form encoding
//!
//! None of them needs a database or network access.

use secrecy::SecretString;

use nature_marketplace_api::stripe::webhook::compute_signature;

/// Webhook secret shared by the signature tests.
pub const WEBHOOK_SECRET: &str = "whsec_Zp7Kq2Lm9Xv4Rt8Nb3Wc";

/// A fixed "now" so tolerance checks are deterministic.
pub const NOW: i64 = 1_760_700_000;

/// The webhook secret as the API holds it.
#[must_use]
pub fn webhook_secret() -> SecretString {
    SecretString::from(WEBHOOK_SECRET)
}

/// A `Stripe-Signature` header value for `payload` signed at `timestamp`.
#[must_use]
pub fn signature_header(payload: &[u8], timestamp: i64) -> String {
    format!(
        "t={timestamp},v1={}",
        compute_signature(WEBHOOK_SECRET, timestamp, payload)
    )
}
