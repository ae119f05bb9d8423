//! Core types for the Nature Marketplace.
//!
//! This module provides type-safe wrappers for common domain concepts.

#[macro_use]
mod macros;

pub mod catalog;
pub mod ecosystem;
pub mod email;
pub mod id;
pub mod price;
pub mod profile;
pub mod slug;
pub mod status;

pub use catalog::{PricingType, ProductType, ProductUpdateType, UnitStatus, UnitUpdateType};
pub use ecosystem::{TimelineEventType, TreeStatus};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
pub use profile::{ProfileLevel, Theme};
pub use slug::slugify;
pub use status::{OrderStatus, PaymentMethod, PaymentStatus, StatusTransitionError};

/// Error returned when parsing an enum from an unknown string value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}
