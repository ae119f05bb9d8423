//! Sponsorship unit queries and status transitions.
//!
//! Every status change is a single conditional `UPDATE ... WHERE status = ...`
//! that reports whether it applied, so concurrent checkouts cannot both
//! claim the same unit.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use nature_marketplace_core::{ProductId, UnitId, UnitUpdateType, UserId};

use super::RepositoryError;
use crate::models::unit::{SponsorshipUnit, UnitImage, UnitUpdate};

const UNIT_SELECT: &str = r"
    SELECT u.id, u.code, u.name, u.slug, u.product_id,
           p.title AS product_title, p.slug AS product_slug, p.pricing_type,
           u.status, u.description, u.story,
           u.location_name, u.latitude, u.longitude,
           u.location_area, u.latitude_approx, u.longitude_approx, u.approx_radius_km,
           u.species, u.age_years, u.height_cm, u.area_m2, u.co2_absorbed_total, u.co2_per_year,
           u.sponsor_id, s.first_name AS sponsor_first_name, s.last_name AS sponsor_last_name,
           u.reserved_by_order_id, u.sponsored_at, u.sponsorship_expires_at,
           u.is_active, u.is_featured,
           (SELECT i.image_url FROM marketplace.unit_image i
             WHERE i.unit_id = u.id
             ORDER BY i.is_primary DESC, i.display_order, i.id
             LIMIT 1) AS primary_image_url,
           u.created_at, u.updated_at
    FROM marketplace.sponsorship_unit u
    JOIN marketplace.product p ON p.id = u.product_id
    LEFT JOIN marketplace.user s ON s.id = u.sponsor_id
";

const UPDATE_COLUMNS: &str = "id, unit_id, update_type, title, content, image_url, height_cm, co2_absorbed, health_status, is_public, notify_sponsor, created_by, created_at";

/// Fields for a new unit. Derived location fields are filled by the caller.
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub code: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub story: String,
    pub location_name: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub location_area: String,
    pub latitude_approx: Option<Decimal>,
    pub longitude_approx: Option<Decimal>,
    pub approx_radius_km: Decimal,
    pub species: String,
    pub age_years: Option<i32>,
    pub height_cm: Option<Decimal>,
    pub area_m2: Option<Decimal>,
    pub co2_per_year: Option<Decimal>,
    pub is_featured: bool,
}

/// A new update on a unit.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUnitUpdate {
    pub update_type: UnitUpdateType,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub image_url: Option<String>,
    pub height_cm: Option<Decimal>,
    pub co2_absorbed: Option<Decimal>,
    #[serde(default)]
    pub health_status: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub notify_sponsor: bool,
}

const fn default_true() -> bool {
    true
}

/// Repository for sponsorship unit reads.
pub struct UnitRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UnitRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active units of a product, featured first, then by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        only_available: bool,
    ) -> Result<Vec<SponsorshipUnit>, RepositoryError> {
        let units = sqlx::query_as::<_, SponsorshipUnit>(&format!(
            r"
            {UNIT_SELECT}
            WHERE u.product_id = $1 AND u.is_active
              AND (NOT $2 OR u.status = 'available')
            ORDER BY u.is_featured DESC, u.code
            "
        ))
        .bind(product_id)
        .bind(only_available)
        .fetch_all(self.pool)
        .await?;

        Ok(units)
    }

    /// Active unit by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<SponsorshipUnit>, RepositoryError> {
        let unit = sqlx::query_as::<_, SponsorshipUnit>(&format!(
            "{UNIT_SELECT} WHERE u.code = $1 AND u.is_active"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(unit)
    }

    /// Gallery images, primary first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, unit_id: UnitId) -> Result<Vec<UnitImage>, RepositoryError> {
        let images = sqlx::query_as::<_, UnitImage>(
            r"
            SELECT id, unit_id, image_url, alt_text, caption, taken_at, is_primary,
                   display_order, created_at
            FROM marketplace.unit_image
            WHERE unit_id = $1
            ORDER BY is_primary DESC, display_order, id
            ",
        )
        .bind(unit_id)
        .fetch_all(self.pool)
        .await?;

        Ok(images)
    }

    /// Updates newest first; private ones only when `include_private`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn updates(
        &self,
        unit_id: UnitId,
        include_private: bool,
    ) -> Result<Vec<UnitUpdate>, RepositoryError> {
        let updates = sqlx::query_as::<_, UnitUpdate>(&format!(
            r"
            SELECT {UPDATE_COLUMNS}
            FROM marketplace.unit_update
            WHERE unit_id = $1 AND ($2 OR is_public)
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(unit_id)
        .bind(include_private)
        .fetch_all(self.pool)
        .await?;

        Ok(updates)
    }
}

/// `available -> reserved` for an order.
///
/// Returns `false` if the unit is not available or belongs to another product.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn reserve(
    conn: &mut PgConnection,
    code: &str,
    product_id: ProductId,
    order_id: Uuid,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.sponsorship_unit
        SET status = 'reserved', reserved_by_order_id = $3, updated_at = NOW()
        WHERE code = $1 AND product_id = $2 AND is_active AND status = 'available'
        ",
    )
    .bind(code)
    .bind(product_id)
    .bind(order_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Sponsor a unit to the buyer of a paid order.
///
/// Follows `UnitStatus::claimable_by_paid_order`: the unit must still be
/// reserved by this order, or available again after a failed payment attempt
/// released it. Returns `false` when someone else holds it.
///
/// Annual products get a one-year sponsorship; one-time products never expire.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn sponsor(
    conn: &mut PgConnection,
    code: &str,
    order_id: Uuid,
    sponsor_id: UserId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.sponsorship_unit u
        SET status = 'sponsored',
            sponsor_id = $3,
            sponsored_at = NOW(),
            sponsorship_expires_at = CASE
                WHEN p.pricing_type = 'annual' THEN NOW() + INTERVAL '1 year'
                ELSE NULL
            END,
            reserved_by_order_id = NULL,
            updated_at = NOW()
        FROM marketplace.product p
        WHERE p.id = u.product_id
          AND u.code = $1 AND u.is_active
          AND (
              (u.status = 'reserved' AND u.reserved_by_order_id = $2)
              OR u.status = 'available'
          )
        ",
    )
    .bind(code)
    .bind(order_id)
    .bind(sponsor_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// `reserved -> available` for every unit held by an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn release_reservations(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.sponsorship_unit
        SET status = 'available', reserved_by_order_id = NULL, updated_at = NOW()
        WHERE reserved_by_order_id = $1 AND status = 'reserved'
        ",
    )
    .bind(order_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// `sponsored -> available`, clearing the sponsor.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
#[instrument(skip(pool))]
pub async fn release_sponsorship(pool: &PgPool, code: &str) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.sponsorship_unit
        SET status = 'available', sponsor_id = NULL, sponsored_at = NULL,
            sponsorship_expires_at = NULL, updated_at = NOW()
        WHERE code = $1 AND status = 'sponsored'
        ",
    )
    .bind(code)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Insert a unit under a product.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the code or slug is taken.
#[instrument(skip(pool, unit), fields(code = %unit.code))]
pub async fn insert_unit(
    pool: &PgPool,
    product_id: ProductId,
    unit: &NewUnit,
) -> Result<UnitId, RepositoryError> {
    let id: UnitId = sqlx::query_scalar(
        r"
        INSERT INTO marketplace.sponsorship_unit (
            code, name, slug, product_id, description, story,
            location_name, latitude, longitude, location_area,
            latitude_approx, longitude_approx, approx_radius_km,
            species, age_years, height_cm, area_m2, co2_per_year, is_featured
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        RETURNING id
        ",
    )
    .bind(&unit.code)
    .bind(&unit.name)
    .bind(&unit.slug)
    .bind(product_id)
    .bind(&unit.description)
    .bind(&unit.story)
    .bind(&unit.location_name)
    .bind(unit.latitude)
    .bind(unit.longitude)
    .bind(&unit.location_area)
    .bind(unit.latitude_approx)
    .bind(unit.longitude_approx)
    .bind(unit.approx_radius_km)
    .bind(&unit.species)
    .bind(unit.age_years)
    .bind(unit.height_cm)
    .bind(unit.area_m2)
    .bind(unit.co2_per_year)
    .bind(unit.is_featured)
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "unit code or slug already exists"))?;

    Ok(id)
}

/// Post an update on a unit.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_update(
    pool: &PgPool,
    unit_id: UnitId,
    update: &NewUnitUpdate,
    created_by: UserId,
) -> Result<UnitUpdate, RepositoryError> {
    let inserted = sqlx::query_as::<_, UnitUpdate>(&format!(
        r"
        INSERT INTO marketplace.unit_update (
            unit_id, update_type, title, content, image_url, height_cm, co2_absorbed,
            health_status, is_public, notify_sponsor, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {UPDATE_COLUMNS}
        "
    ))
    .bind(unit_id)
    .bind(update.update_type)
    .bind(&update.title)
    .bind(&update.content)
    .bind(update.image_url.as_deref())
    .bind(update.height_cm)
    .bind(update.co2_absorbed)
    .bind(&update.health_status)
    .bind(update.is_public)
    .bind(update.notify_sponsor)
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    Ok(inserted)
}
