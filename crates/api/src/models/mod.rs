//! Domain models for the marketplace API.
//!
//! Row types derive `sqlx::FromRow` and are read with runtime-checked
//! `query_as` calls. Derived values (sale flags, refundable amounts, level
//! progress) live on the models so handlers never recompute them.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod profile;
pub mod session;
pub mod tree;
pub mod unit;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
