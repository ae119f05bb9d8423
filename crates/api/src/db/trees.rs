//! Adopted tree, timeline, and gallery queries.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use nature_marketplace_core::{OrderItemId, ProductId, TimelineEventType, TreeStatus, UserId};

use super::RepositoryError;
use crate::models::tree::{AdoptedTree, GalleryImage, TimelineEvent};

const TREE_SELECT: &str = r"
    SELECT t.id, t.tree_number, t.user_id, t.product_id,
           p.title AS product_title, p.slug AS product_slug, t.order_item_id,
           t.nickname, t.species, t.status, t.location_name, t.latitude, t.longitude,
           t.age_days, t.height_cm, t.co2_offset_kg, t.certificate_url,
           t.adoption_date, t.planted_date,
           (SELECT g.image_url FROM marketplace.tree_gallery_image g
             WHERE g.tree_id = t.id
             ORDER BY g.is_primary DESC, g.uploaded_at DESC, g.id DESC
             LIMIT 1) AS primary_image_url,
           t.created_at, t.updated_at
    FROM marketplace.adopted_tree t
    LEFT JOIN marketplace.product p ON p.id = t.product_id
";

const EVENT_COLUMNS: &str =
    "id, tree_id, event_type, title, description, icon, event_date, created_at";

const GALLERY_COLUMNS: &str = "id, tree_id, image_url, thumbnail_url, caption, alt_text, is_primary, taken_date, uploaded_at";

/// Fields for a newly adopted tree.
#[derive(Debug)]
pub struct NewTree<'a> {
    pub tree_number: &'a str,
    pub user_id: UserId,
    pub product_id: Option<ProductId>,
    pub order_item_id: Option<OrderItemId>,
    pub nickname: &'a str,
    pub species: &'a str,
    pub location_name: &'a str,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub co2_offset_kg: Decimal,
}

/// A new timeline entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTimelineEvent {
    pub event_type: TimelineEventType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub icon: Option<String>,
    pub event_date: Option<NaiveDate>,
}

/// A new gallery image.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGalleryImage {
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub is_primary: bool,
    pub taken_date: Option<NaiveDate>,
}

/// Staff-maintained growth figures. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeMetrics {
    pub height_cm: Option<Decimal>,
    pub co2_offset_kg: Option<Decimal>,
    pub age_days: Option<i32>,
    pub status: Option<TreeStatus>,
}

/// Repository for adopted tree reads.
pub struct TreeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TreeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's trees, most recently adopted first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<AdoptedTree>, RepositoryError> {
        let trees = sqlx::query_as::<_, AdoptedTree>(&format!(
            "{TREE_SELECT} WHERE t.user_id = $1 ORDER BY t.adoption_date DESC, t.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(trees)
    }

    /// Tree by id, only if owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: Uuid,
        user_id: UserId,
    ) -> Result<Option<AdoptedTree>, RepositoryError> {
        let tree = sqlx::query_as::<_, AdoptedTree>(&format!(
            "{TREE_SELECT} WHERE t.id = $1 AND t.user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(tree)
    }

    /// Tree by id regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: Uuid) -> Result<Option<AdoptedTree>, RepositoryError> {
        let tree = sqlx::query_as::<_, AdoptedTree>(&format!("{TREE_SELECT} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(tree)
    }

    /// Timeline, most recent event first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn timeline(&self, tree_id: Uuid) -> Result<Vec<TimelineEvent>, RepositoryError> {
        let events = sqlx::query_as::<_, TimelineEvent>(&format!(
            r"
            SELECT {EVENT_COLUMNS}
            FROM marketplace.timeline_event
            WHERE tree_id = $1
            ORDER BY event_date DESC, created_at DESC, id DESC
            "
        ))
        .bind(tree_id)
        .fetch_all(self.pool)
        .await?;

        Ok(events)
    }

    /// Gallery, primary image first, then newest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn gallery(&self, tree_id: Uuid) -> Result<Vec<GalleryImage>, RepositoryError> {
        let images = sqlx::query_as::<_, GalleryImage>(&format!(
            r"
            SELECT {GALLERY_COLUMNS}
            FROM marketplace.tree_gallery_image
            WHERE tree_id = $1
            ORDER BY is_primary DESC, uploaded_at DESC, id DESC
            "
        ))
        .bind(tree_id)
        .fetch_all(self.pool)
        .await?;

        Ok(images)
    }

    /// Tree count and total CO₂ offset for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self, user_id: UserId) -> Result<(i64, Decimal), RepositoryError> {
        let stats: (i64, Decimal) = sqlx::query_as(
            r"
            SELECT COUNT(*), COALESCE(SUM(co2_offset_kg), 0)
            FROM marketplace.adopted_tree
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(stats)
    }

    /// Rename a tree. Returns `false` if the user doesn't own it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_nickname(
        &self,
        id: Uuid,
        user_id: UserId,
        nickname: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.adopted_tree
            SET nickname = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(nickname)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Apply staff metrics. Returns `false` if the tree doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_metrics(&self, id: Uuid, metrics: &TreeMetrics) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.adopted_tree
            SET height_cm = COALESCE($2, height_cm),
                co2_offset_kg = COALESCE($3, co2_offset_kg),
                age_days = COALESCE($4, age_days),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(metrics.height_cm)
        .bind(metrics.co2_offset_kg)
        .bind(metrics.age_days)
        .bind(metrics.status)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Add a gallery image; a primary image demotes the current one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_image(
        &self,
        tree_id: Uuid,
        image: &NewGalleryImage,
    ) -> Result<GalleryImage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if image.is_primary {
            sqlx::query(
                "UPDATE marketplace.tree_gallery_image SET is_primary = FALSE WHERE tree_id = $1 AND is_primary",
            )
            .bind(tree_id)
            .execute(&mut *tx)
            .await?;
        }

        let inserted = sqlx::query_as::<_, GalleryImage>(&format!(
            r"
            INSERT INTO marketplace.tree_gallery_image
                (tree_id, image_url, thumbnail_url, caption, alt_text, is_primary, taken_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {GALLERY_COLUMNS}
            "
        ))
        .bind(tree_id)
        .bind(&image.image_url)
        .bind(image.thumbnail_url.as_deref())
        .bind(&image.caption)
        .bind(&image.alt_text)
        .bind(image.is_primary)
        .bind(image.taken_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }
}

/// Insert a tree. Returns `None` if the tree number is already taken.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
#[instrument(skip(conn, tree), fields(tree_number = %tree.tree_number))]
pub async fn insert_tree(
    conn: &mut PgConnection,
    tree: &NewTree<'_>,
) -> Result<Option<Uuid>, RepositoryError> {
    let id: Option<Uuid> = sqlx::query_scalar(
        r"
        INSERT INTO marketplace.adopted_tree (
            id, tree_number, user_id, product_id, order_item_id, nickname, species,
            location_name, latitude, longitude, co2_offset_kg
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (tree_number) DO NOTHING
        RETURNING id
        ",
    )
    .bind(Uuid::new_v4())
    .bind(tree.tree_number)
    .bind(tree.user_id)
    .bind(tree.product_id)
    .bind(tree.order_item_id)
    .bind(tree.nickname)
    .bind(tree.species)
    .bind(tree.location_name)
    .bind(tree.latitude)
    .bind(tree.longitude)
    .bind(tree.co2_offset_kg)
    .fetch_optional(conn)
    .await?;

    Ok(id)
}

/// Append an event to a tree's timeline.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_event(
    conn: &mut PgConnection,
    tree_id: Uuid,
    event: &NewTimelineEvent,
) -> Result<TimelineEvent, RepositoryError> {
    let inserted = sqlx::query_as::<_, TimelineEvent>(&format!(
        r"
        INSERT INTO marketplace.timeline_event
            (tree_id, event_type, title, description, icon, event_date)
        VALUES ($1, $2, $3, $4, COALESCE($5, 'eco'), COALESCE($6, CURRENT_DATE))
        RETURNING {EVENT_COLUMNS}
        "
    ))
    .bind(tree_id)
    .bind(event.event_type)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.icon.as_deref())
    .bind(event.event_date)
    .fetch_one(conn)
    .await?;

    Ok(inserted)
}

/// Number of trees a user has adopted.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_for_user(conn: &mut PgConnection, user_id: UserId) -> Result<i64, RepositoryError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM marketplace.adopted_tree WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(conn)
            .await?;

    Ok(count)
}
