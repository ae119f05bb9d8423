//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Email and password accounts
//! - `catalog` - Categories, products, and sponsorship units
//! - `cart` - User and session carts
//! - `orders` - Checkout from cart, cancellation, staff status changes
//! - `payments` - Stripe checkout sessions, payment intents, refunds
//! - `webhook` - Stripe event handling
//! - `ecosystem` - Adopted trees and fulfilment
//! - `gamification` - Points, levels, and badges
//!
//! Services borrow the pool for the length of a request. Steps that must
//! commit together take `&mut PgConnection` instead.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod ecosystem;
pub mod gamification;
pub mod orders;
pub mod payments;
pub mod webhook;
