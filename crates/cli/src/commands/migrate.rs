//! Database migration command.
//!
//! Migrations are never run by the server. Apply them before deploying:
//!
//! ```bash
//! nm-cli migrate
//! ```

use crate::error::CliError;

/// Apply pending migrations from `crates/api/migrations/`.
pub async fn run() -> Result<(), CliError> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
