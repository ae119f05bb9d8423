//! Subcommand implementations.

pub mod badges;
pub mod migrate;
pub mod staff;

use secrecy::SecretString;
use sqlx::PgPool;

use nature_marketplace_api::db;

use crate::error::CliError;

/// Connect using `API_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("API_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CliError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&SecretString::from(database_url)).await?)
}
