//! CLI error type.

use thiserror::Error;

use nature_marketplace_api::db::RepositoryError;
use nature_marketplace_core::EmailError;

/// Errors from CLI commands. Any of them ends the process with status 1.
#[derive(Debug, Error)]
pub enum CliError {
    /// Neither database variable is set.
    #[error("Missing environment variable: API_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No account with email: {0}")]
    UnknownUser(String),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
