//! Cart and cart line queries.

use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::{debug, instrument};

use nature_marketplace_core::{CartId, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::{Cart, CartLine, CartOwner};

const CART_COLUMNS: &str = "id, user_id, session_key, created_at, updated_at";

const LINE_SELECT: &str = r"
    SELECT ci.id, ci.product_id, p.title AS product_title, p.slug AS product_slug,
           p.product_type, p.price AS unit_price, p.currency, p.is_active, p.stock,
           p.is_unlimited_stock,
           (SELECT i.image_url FROM marketplace.product_image i
             WHERE i.product_id = p.id
             ORDER BY i.is_primary DESC, i.display_order, i.id
             LIMIT 1) AS primary_image_url,
           ci.quantity, ci.selected_options, ci.created_at
    FROM marketplace.cart_item ci
    JOIN marketplace.product p ON p.id = ci.product_id
";

/// Repository for carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Existing cart for an owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>, RepositoryError> {
        find_cart(self.pool, owner).await
    }

    /// Cart for an owner, created on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        get_or_create_cart(self.pool, owner).await
    }

    /// Lines in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        fetch_lines(self.pool, cart_id).await
    }

    /// The line for one product, if present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let line = sqlx::query_as::<_, CartLine>(&format!(
            "{LINE_SELECT} WHERE ci.cart_id = $1 AND ci.product_id = $2"
        ))
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(line)
    }

    /// Insert a line or overwrite its quantity and options.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
        selected_options: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO marketplace.cart_item (cart_id, product_id, quantity, selected_options)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id) DO UPDATE
            SET quantity = EXCLUDED.quantity,
                selected_options = EXCLUDED.selected_options,
                updated_at = NOW()
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(selected_options)
        .execute(self.pool)
        .await?;

        touch(self.pool, cart_id).await
    }

    /// Set a line's quantity. Returns `false` if there is no such line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.cart_item
            SET quantity = $3, updated_at = NOW()
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        touch(self.pool, cart_id).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove a line. Returns `false` if there was no such line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM marketplace.cart_item WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        touch(self.pool, cart_id).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear(&mut conn, cart_id).await
    }

    /// Fold an anonymous session cart into a user's cart and delete it.
    ///
    /// Quantities of shared products are summed; options are merged with the
    /// session cart's keys winning. Returns the number of lines moved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// merged in that case.
    #[instrument(skip(self, session_key), fields(user_id = %user_id))]
    pub async fn merge_session_cart(
        &self,
        session_key: &str,
        user_id: UserId,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let owner = CartOwner::Session(session_key.to_string());
        let Some(anonymous) = find_cart(&mut *tx, &owner).await? else {
            return Ok(0);
        };
        let target = get_or_create_cart(&mut *tx, &CartOwner::User(user_id)).await?;

        let moved = sqlx::query(&format!(
            r"
            INSERT INTO marketplace.cart_item AS existing
                (cart_id, product_id, quantity, selected_options)
            SELECT $2, product_id,
                   CASE WHEN {names_unit} THEN 1 ELSE quantity END,
                   selected_options
            FROM marketplace.cart_item
            WHERE cart_id = $1
            ON CONFLICT (cart_id, product_id) DO UPDATE
            SET quantity = CASE
                    WHEN {merged_names_unit} THEN 1
                    ELSE existing.quantity + EXCLUDED.quantity
                END,
                selected_options = existing.selected_options || EXCLUDED.selected_options,
                updated_at = NOW()
            ",
            names_unit = names_unit("selected_options"),
            merged_names_unit =
                names_unit("(existing.selected_options || EXCLUDED.selected_options)"),
        ))
        .bind(anonymous.id)
        .bind(target.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM marketplace.cart WHERE id = $1")
            .bind(anonymous.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(moved, "Merged session cart");
        Ok(moved)
    }
}

/// SQL predicate: the options in `column` name a unit. Mirrors
/// [`selected_unit_code`](crate::models::cart::selected_unit_code).
fn names_unit(column: &str) -> String {
    format!("(jsonb_typeof({column} -> 'unit_code') = 'string' AND BTRIM({column} ->> 'unit_code') <> '')")
}

/// Lines of a cart, read inside an existing transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines(conn: &mut PgConnection, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
    fetch_lines(conn, cart_id).await
}

/// Remove every line of a cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear(conn: &mut PgConnection, cart_id: CartId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM marketplace.cart_item WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;

    touch(conn, cart_id).await
}

async fn fetch_lines<'e, E: PgExecutor<'e>>(
    executor: E,
    cart_id: CartId,
) -> Result<Vec<CartLine>, RepositoryError> {
    let lines = sqlx::query_as::<_, CartLine>(&format!(
        "{LINE_SELECT} WHERE ci.cart_id = $1 ORDER BY ci.created_at, ci.id"
    ))
    .bind(cart_id)
    .fetch_all(executor)
    .await?;

    Ok(lines)
}

async fn find_cart<'e, E: PgExecutor<'e>>(
    executor: E,
    owner: &CartOwner,
) -> Result<Option<Cart>, RepositoryError> {
    let cart = match owner {
        CartOwner::User(user_id) => {
            sqlx::query_as::<_, Cart>(&format!(
                "SELECT {CART_COLUMNS} FROM marketplace.cart WHERE user_id = $1"
            ))
            .bind(*user_id)
            .fetch_optional(executor)
            .await?
        }
        CartOwner::Session(key) => {
            sqlx::query_as::<_, Cart>(&format!(
                "SELECT {CART_COLUMNS} FROM marketplace.cart WHERE session_key = $1"
            ))
            .bind(key.as_str())
            .fetch_optional(executor)
            .await?
        }
    };

    Ok(cart)
}

async fn get_or_create_cart<'e, E: PgExecutor<'e>>(
    executor: E,
    owner: &CartOwner,
) -> Result<Cart, RepositoryError> {
    let cart = match owner {
        CartOwner::User(user_id) => {
            sqlx::query_as::<_, Cart>(&format!(
                r"
                INSERT INTO marketplace.cart AS c (user_id) VALUES ($1)
                ON CONFLICT (user_id) DO UPDATE SET updated_at = c.updated_at
                RETURNING {CART_COLUMNS}
                "
            ))
            .bind(*user_id)
            .fetch_one(executor)
            .await?
        }
        CartOwner::Session(key) => {
            sqlx::query_as::<_, Cart>(&format!(
                r"
                INSERT INTO marketplace.cart AS c (session_key) VALUES ($1)
                ON CONFLICT (session_key) DO UPDATE SET updated_at = c.updated_at
                RETURNING {CART_COLUMNS}
                "
            ))
            .bind(key.as_str())
            .fetch_one(executor)
            .await?
        }
    };

    Ok(cart)
}

async fn touch<'e, E: PgExecutor<'e>>(executor: E, cart_id: CartId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE marketplace.cart SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(executor)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_unit_checks_string_code() {
        let predicate = names_unit("selected_options");
        assert!(predicate.contains("jsonb_typeof(selected_options -> 'unit_code') = 'string'"));
        assert!(predicate.contains("BTRIM(selected_options ->> 'unit_code') <> ''"));
    }
}
