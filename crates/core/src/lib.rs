//! Nature Marketplace Core - Shared domain types.
//!
//! This crate provides the types used across all Nature Marketplace components:
//! - `api` - JSON HTTP API (catalog, cart, orders, payments, trees, profiles)
//! - `cli` - Command-line tools for migrations and staff management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database access,
//! no HTTP clients. Status machines, level thresholds, slug generation and money
//! conversions live here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, prices, slugs, and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
