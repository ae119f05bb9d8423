//! Badge catalog inspection.

use nature_marketplace_api::db::ProfileRepository;

use crate::error::CliError;

/// Log every badge in the catalog, cheapest first.
pub async fn list() -> Result<(), CliError> {
    let pool = super::connect().await?;
    let badges = ProfileRepository::new(&pool).all_badges().await?;

    for badge in &badges {
        tracing::info!(
            name = %badge.name,
            points = badge.points_value,
            icon = %badge.icon,
            "{}",
            badge.description
        );
    }
    tracing::info!(count = badges.len(), "Badge catalog listed");
    Ok(())
}
