//! Staff rights management.
//!
//! Staff may manage the catalog, change order status, issue refunds, and
//! maintain tree metrics. The API re-reads the flag on every staff request,
//! so a revoke takes effect immediately.

use nature_marketplace_api::db::{RepositoryError, UserRepository};
use nature_marketplace_core::Email;

use crate::error::CliError;

/// Grant (`true`) or revoke (`false`) staff rights for an existing account.
pub async fn set_staff(email: &str, is_staff: bool) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let pool = super::connect().await?;

    let user = UserRepository::new(&pool)
        .set_staff(&email, is_staff)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => CliError::UnknownUser(email.to_string()),
            other => CliError::Repository(other),
        })?;

    if is_staff {
        tracing::info!(user_id = %user.id, email = %user.email, "Staff rights granted");
    } else {
        tracing::info!(user_id = %user.id, email = %user.email, "Staff rights revoked");
    }
    Ok(())
}
