//! Stripe integration.
//!
//! This module provides:
//! - [`StripeClient`] for checkout sessions, payment intents, and refunds
//! - Request builders and response types for the objects we read
//! - Webhook signature verification

mod client;
mod error;
pub mod types;
pub mod webhook;

pub use client::StripeClient;
pub use error::{SignatureError, StripeError};
pub use types::{
    CheckoutLine, CheckoutRequest, CheckoutSession, Event, PaymentIntent, PaymentIntentRequest,
    Refund,
};
