//! Adopted trees: fulfilment after payment, the owner's forest, and staff care logs.

use chrono::{Datelike, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

use nature_marketplace_core::{ProductType, TimelineEventType, UserId};

use crate::db::trees::{
    self, NewGalleryImage, NewTimelineEvent, NewTree, TreeMetrics, TreeRepository,
};
use crate::db::{RepositoryError, catalog, orders, profiles, units};
use crate::error::add_breadcrumb;
use crate::models::order::{Order, OrderItem};
use crate::models::tree::{
    ForestStats, GalleryImage, TimelineEvent, TreeDetail, TreeSummary, tree_number_prefix,
};
use crate::services::gamification;

/// Longest nickname a tree can carry.
pub const MAX_NICKNAME_CHARS: usize = 100;

const TREE_NUMBER_ATTEMPTS: usize = 5;

/// Errors from ecosystem operations.
#[derive(Debug, Error)]
pub enum EcosystemError {
    #[error("Tree not found")]
    TreeNotFound,

    #[error("Nickname must be at most {MAX_NICKNAME_CHARS} characters")]
    NicknameTooLong,

    #[error("could not allocate a unique tree number")]
    TreeNumberExhausted,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for EcosystemError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Body of `PATCH /ecosystems/trees/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct NicknameUpdate {
    pub nickname: String,
}

/// Adopted tree service.
pub struct EcosystemService<'a> {
    pool: &'a PgPool,
    trees: TreeRepository<'a>,
}

impl<'a> EcosystemService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            trees: TreeRepository::new(pool),
        }
    }

    /// The user's forest.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::Repository` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<TreeSummary>, EcosystemError> {
        let trees = self.trees.list_for_user(user_id).await?;
        Ok(trees.iter().map(TreeSummary::from).collect())
    }

    /// A tree with its timeline and gallery.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::TreeNotFound` if the tree doesn't exist or isn't theirs.
    pub async fn detail(&self, id: Uuid, user_id: UserId) -> Result<TreeDetail, EcosystemError> {
        let tree = self
            .trees
            .get_for_user(id, user_id)
            .await?
            .ok_or(EcosystemError::TreeNotFound)?;
        let timeline = self.trees.timeline(id).await?;
        let gallery = self.trees.gallery(id).await?;

        Ok(TreeDetail::new(&tree, timeline, gallery))
    }

    /// Rename one of the user's trees. A blank nickname clears it.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::NicknameTooLong` past the length limit.
    /// Returns `EcosystemError::TreeNotFound` if the tree doesn't exist or isn't theirs.
    #[instrument(skip(self, nickname))]
    pub async fn update_nickname(
        &self,
        id: Uuid,
        user_id: UserId,
        nickname: &str,
    ) -> Result<TreeDetail, EcosystemError> {
        let nickname = nickname.trim();
        if nickname.chars().count() > MAX_NICKNAME_CHARS {
            return Err(EcosystemError::NicknameTooLong);
        }
        if !self.trees.update_nickname(id, user_id, nickname).await? {
            return Err(EcosystemError::TreeNotFound);
        }

        self.detail(id, user_id).await
    }

    /// Timeline of one of the user's trees.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::TreeNotFound` if the tree doesn't exist or isn't theirs.
    pub async fn timeline(
        &self,
        id: Uuid,
        user_id: UserId,
    ) -> Result<Vec<TimelineEvent>, EcosystemError> {
        self.ensure_owner(id, user_id).await?;
        Ok(self.trees.timeline(id).await?)
    }

    /// Gallery of one of the user's trees.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::TreeNotFound` if the tree doesn't exist or isn't theirs.
    pub async fn gallery(
        &self,
        id: Uuid,
        user_id: UserId,
    ) -> Result<Vec<GalleryImage>, EcosystemError> {
        self.ensure_owner(id, user_id).await?;
        Ok(self.trees.gallery(id).await?)
    }

    /// Tree count and CO₂ impact.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::Repository` if the query fails.
    pub async fn stats(&self, user_id: UserId) -> Result<ForestStats, EcosystemError> {
        let (count, co2) = self.trees.stats(user_id).await?;
        Ok(ForestStats::new(count, co2))
    }

    /// Staff: log an event on any tree.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::TreeNotFound` if the tree doesn't exist.
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn add_event(
        &self,
        id: Uuid,
        event: &NewTimelineEvent,
    ) -> Result<TimelineEvent, EcosystemError> {
        self.trees.get(id).await?.ok_or(EcosystemError::TreeNotFound)?;

        let mut conn = self.pool.acquire().await?;
        let inserted = trees::insert_event(&mut conn, id, event).await?;
        info!(tree_id = %id, event_id = %inserted.id, "Timeline event added");

        Ok(inserted)
    }

    /// Staff: add a gallery image to any tree.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::TreeNotFound` if the tree doesn't exist.
    #[instrument(skip(self, image))]
    pub async fn add_image(
        &self,
        id: Uuid,
        image: &NewGalleryImage,
    ) -> Result<GalleryImage, EcosystemError> {
        self.trees.get(id).await?.ok_or(EcosystemError::TreeNotFound)?;
        Ok(self.trees.insert_image(id, image).await?)
    }

    /// Staff: update growth figures. Absent fields keep their values.
    ///
    /// # Errors
    ///
    /// Returns `EcosystemError::TreeNotFound` if the tree doesn't exist.
    #[instrument(skip(self, metrics))]
    pub async fn update_metrics(
        &self,
        id: Uuid,
        metrics: &TreeMetrics,
    ) -> Result<TreeDetail, EcosystemError> {
        if !self.trees.update_metrics(id, metrics).await? {
            return Err(EcosystemError::TreeNotFound);
        }

        let tree = self.trees.get(id).await?.ok_or(EcosystemError::TreeNotFound)?;
        let timeline = self.trees.timeline(id).await?;
        let gallery = self.trees.gallery(id).await?;
        Ok(TreeDetail::new(&tree, timeline, gallery))
    }

    async fn ensure_owner(&self, id: Uuid, user_id: UserId) -> Result<(), EcosystemError> {
        self.trees
            .get_for_user(id, user_id)
            .await?
            .map(|_| ())
            .ok_or(EcosystemError::TreeNotFound)
    }
}

/// What fulfilment produced for a paid order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fulfilment {
    /// Adopted trees created.
    pub trees: Vec<Uuid>,
    /// Units someone else took before this order's payment landed.
    pub unclaimed_units: Vec<UnclaimedUnit>,
}

/// A paid line whose sponsorship unit could not be handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclaimedUnit {
    pub code: String,
    pub amount: Decimal,
}

impl Fulfilment {
    /// Money owed back for units the buyer paid for but did not get.
    #[must_use]
    pub fn refund_due(&self) -> Decimal {
        self.unclaimed_units.iter().map(|unit| unit.amount).sum()
    }
}

/// Turn a freshly paid order into sponsorships and adopted trees.
///
/// Units selected on the order become sponsored by the buyer. A unit that
/// another order took in the meantime is reported in
/// [`Fulfilment::unclaimed_units`] and its line yields no trees. Each other
/// tree item yields one adopted tree per unit of quantity, with a milestone
/// event and adoption points. Tree badges are checked once at the end.
///
/// # Errors
///
/// Returns `EcosystemError::TreeNumberExhausted` if no free tree number is found.
#[instrument(skip(conn, order), fields(order_id = %order.id))]
pub async fn fulfil_order_adoptions(
    conn: &mut PgConnection,
    order: &Order,
) -> Result<Fulfilment, EcosystemError> {
    let items = orders::items(conn, order.id).await?;
    let mut fulfilment = Fulfilment::default();

    for item in &items {
        if let Some(code) = item.unit_code.as_deref() {
            if units::sponsor(conn, code, order.id, order.user_id).await? {
                info!(unit = code, user_id = %order.user_id, "Unit sponsored");
            } else {
                error!(unit = code, order_id = %order.id, "Paid unit was taken by another order");
                fulfilment.unclaimed_units.push(UnclaimedUnit {
                    code: code.to_string(),
                    amount: item.line_total,
                });
                continue;
            }
        }

        if item.product_type == ProductType::Tree {
            fulfilment.trees.extend(adopt_trees(conn, order.user_id, item).await?);
        }
    }

    let created = fulfilment.trees.len();
    if created == 0 {
        return Ok(fulfilment);
    }

    let display_name = order
        .customer_email
        .split('@')
        .next()
        .unwrap_or_default();
    let profile = profiles::get_or_create(conn, order.user_id, display_name).await?;
    for _ in 0..created {
        gamification::add_points(conn, profile.id, gamification::ADOPTION_POINTS, "Tree Adoption")
            .await?;
    }

    let tree_count = trees::count_for_user(conn, order.user_id).await?;
    gamification::check_tree_badges(conn, profile.id, tree_count).await?;

    let profile = profiles::get_or_create(conn, order.user_id, display_name).await?;
    gamification::check_point_badges(conn, profile.id, profile.total_points_earned).await?;

    info!(trees = created, tree_count, "Adoptions fulfilled");
    add_breadcrumb(
        "adoption",
        "Trees adopted",
        Some(&[("order_number", order.order_number.as_str())]),
    );

    Ok(fulfilment)
}

async fn adopt_trees(
    conn: &mut PgConnection,
    user_id: UserId,
    item: &OrderItem,
) -> Result<Vec<Uuid>, EcosystemError> {
    let product = match item.product_id {
        Some(id) => catalog::product_by_id(conn, id).await?,
        None => None,
    };

    let species = product
        .as_ref()
        .map(|p| p.species.trim())
        .filter(|species| !species.is_empty())
        .unwrap_or(item.product_title.as_str())
        .to_string();
    let nickname: String = item
        .selected_options
        .get("nickname")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .chars()
        .take(MAX_NICKNAME_CHARS)
        .collect();
    let location_name = product.as_ref().map_or("", |p| p.location_name.as_str());
    let latitude = product.as_ref().and_then(|p| p.location_lat).unwrap_or(Decimal::ZERO);
    let longitude = product.as_ref().and_then(|p| p.location_lng).unwrap_or(Decimal::ZERO);
    let co2_offset_kg = product.as_ref().and_then(|p| p.co2_offset_kg).unwrap_or(Decimal::ZERO);
    let prefix = tree_number_prefix(&species);

    let event = NewTimelineEvent {
        event_type: TimelineEventType::Milestone,
        title: "Tree Adopted".to_string(),
        description: format!("{species} was adopted and added to your forest."),
        icon: Some("park".to_string()),
        event_date: None,
    };

    let mut created = Vec::new();
    for _ in 0..item.quantity {
        let mut tree_id = None;
        for _ in 0..TREE_NUMBER_ATTEMPTS {
            let number = tree_number(&prefix, Utc::now().year(), rand::rng().random_range(0..10_000));
            tree_id = trees::insert_tree(
                conn,
                &NewTree {
                    tree_number: &number,
                    user_id,
                    product_id: item.product_id,
                    order_item_id: Some(item.id),
                    nickname: &nickname,
                    species: &species,
                    location_name,
                    latitude,
                    longitude,
                    co2_offset_kg,
                },
            )
            .await?;
            if tree_id.is_some() {
                break;
            }
        }
        let tree_id = tree_id.ok_or(EcosystemError::TreeNumberExhausted)?;

        trees::insert_event(conn, tree_id, &event).await?;
        created.push(tree_id);
    }

    Ok(created)
}

/// `{PFX}-{YYYY}-{NNNN}`.
fn tree_number(prefix: &str, year: i32, serial: u16) -> String {
    format!("{prefix}-{year}-{serial:04}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_number_format() {
        assert_eq!(tree_number("CEI", 2026, 7), "CEI-2026-0007");
        assert_eq!(tree_number(&tree_number_prefix(""), 2025, 1234), "TRE-2025-1234");
    }

    #[test]
    fn test_refund_due_sums_unclaimed_lines() {
        let fulfilment = Fulfilment {
            trees: vec![Uuid::nil()],
            unclaimed_units: vec![
                UnclaimedUnit {
                    code: "CEI-014".to_string(),
                    amount: Decimal::new(4500, 2),
                },
                UnclaimedUnit {
                    code: "PAR-002".to_string(),
                    amount: Decimal::new(7500, 2),
                },
            ],
        };
        assert_eq!(fulfilment.refund_due(), Decimal::new(12000, 2));
        assert_eq!(Fulfilment::default().refund_due(), Decimal::ZERO);
    }

    #[test]
    fn test_nickname_limit_message() {
        assert_eq!(
            EcosystemError::NicknameTooLong.to_string(),
            "Nickname must be at most 100 characters"
        );
    }
}
