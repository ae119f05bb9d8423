//! Cart service.
//!
//! Carts belong to a user or to an anonymous session key. Line prices are
//! always read live from the product, never stored on the line.

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, instrument};

use nature_marketplace_core::{ProductId, UnitStatus};

use crate::db::{CartRepository, ProductRepository, RepositoryError, UnitRepository};
use crate::models::cart::{
    CartOwner, CartSummary, CartView, merge_options, quantity_fits_options, selected_unit_code,
};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Quantity cannot be negative")]
    NegativeQuantity,

    #[error("Product not available")]
    ProductUnavailable,

    #[error("Requested quantity not available")]
    QuantityUnavailable,

    #[error("Item not found in cart")]
    ItemNotFound,

    #[error("Selected unit is not available")]
    UnitUnavailable,

    #[error("A selected unit can only be added once")]
    UnitQuantity,

    #[error("Selected options must be an object")]
    InvalidOptions,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Body of `POST /cart/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default = "empty_options")]
    pub selected_options: serde_json::Value,
}

const fn default_quantity() -> i32 {
    1
}

fn empty_options() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Cart service.
pub struct CartService<'a> {
    pool: &'a PgPool,
    carts: CartRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            carts: CartRepository::new(pool),
        }
    }

    /// The owner's cart, created on first access.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn get(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        let cart = self.carts.get_or_create(owner).await?;
        let lines = self.carts.lines(cart.id).await?;

        Ok(CartView::new(&cart, &lines))
    }

    /// Totals only.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn summary(&self, owner: &CartOwner) -> Result<CartSummary, CartError> {
        let Some(cart) = self.carts.find(owner).await? else {
            return Ok(CartSummary::from_lines(&[]));
        };
        let lines = self.carts.lines(cart.id).await?;

        Ok(CartSummary::from_lines(&lines))
    }

    /// Add a product. An existing line gains the quantity and merges options.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for quantities below 1.
    /// Returns `CartError::UnitQuantity` if a line naming a unit would exceed one.
    /// Returns `CartError::ProductUnavailable` if the combined quantity can't be supplied.
    /// Returns `CartError::UnitUnavailable` if a selected unit can't be sponsored.
    #[instrument(skip(self, owner, input), fields(product_id = %input.product_id))]
    pub async fn add(&self, owner: &CartOwner, input: &AddToCart) -> Result<CartView, CartError> {
        if input.quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        if !input.selected_options.is_object() {
            return Err(CartError::InvalidOptions);
        }

        let cart = self.carts.get_or_create(owner).await?;
        let existing = self.carts.line(cart.id, input.product_id).await?;

        let (quantity, options) = match &existing {
            Some(line) => (
                line.quantity.saturating_add(input.quantity),
                merge_options(&line.selected_options, &input.selected_options),
            ),
            None => (input.quantity, input.selected_options.clone()),
        };

        if !quantity_fits_options(&options, quantity) {
            return Err(CartError::UnitQuantity);
        }

        if !ProductRepository::new(self.pool)
            .check_availability(input.product_id, quantity)
            .await?
        {
            return Err(CartError::ProductUnavailable);
        }

        if let Some(code) = selected_unit_code(&options) {
            self.ensure_unit_available(code, input.product_id).await?;
        }

        self.carts
            .upsert_line(cart.id, input.product_id, quantity, &options)
            .await?;
        debug!(cart_id = %cart.id, quantity, "Cart line saved");

        let lines = self.carts.lines(cart.id).await?;
        Ok(CartView::new(&cart, &lines))
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NegativeQuantity` for negative quantities.
    /// Returns `CartError::ItemNotFound` if the product isn't in the cart.
    /// Returns `CartError::UnitQuantity` for a line naming a unit and a quantity above one.
    /// Returns `CartError::QuantityUnavailable` if the quantity can't be supplied.
    #[instrument(skip(self, owner))]
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        if quantity < 0 {
            return Err(CartError::NegativeQuantity);
        }
        if quantity == 0 {
            return self.remove(owner, product_id).await;
        }

        let cart = self.carts.find(owner).await?.ok_or(CartError::ItemNotFound)?;
        let line = self
            .carts
            .line(cart.id, product_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;
        if !quantity_fits_options(&line.selected_options, quantity) {
            return Err(CartError::UnitQuantity);
        }

        if !ProductRepository::new(self.pool)
            .check_availability(product_id, quantity)
            .await?
        {
            return Err(CartError::QuantityUnavailable);
        }

        if !self.carts.set_quantity(cart.id, product_id, quantity).await? {
            return Err(CartError::ItemNotFound);
        }

        let lines = self.carts.lines(cart.id).await?;
        Ok(CartView::new(&cart, &lines))
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the product isn't in the cart.
    #[instrument(skip(self, owner))]
    pub async fn remove(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
    ) -> Result<CartView, CartError> {
        let cart = self.carts.find(owner).await?.ok_or(CartError::ItemNotFound)?;
        if !self.carts.remove_line(cart.id, product_id).await? {
            return Err(CartError::ItemNotFound);
        }

        let lines = self.carts.lines(cart.id).await?;
        Ok(CartView::new(&cart, &lines))
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn clear(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        let cart = self.carts.get_or_create(owner).await?;
        self.carts.clear(cart.id).await?;

        Ok(CartView::new(&cart, &[]))
    }

    async fn ensure_unit_available(
        &self,
        code: &str,
        product_id: ProductId,
    ) -> Result<(), CartError> {
        let unit = UnitRepository::new(self.pool)
            .get_by_code(code)
            .await?
            .ok_or(CartError::UnitUnavailable)?;

        if unit.product_id != product_id || unit.status != UnitStatus::Available {
            return Err(CartError::UnitUnavailable);
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_to_cart_defaults() {
        let input: AddToCart = serde_json::from_value(serde_json::json!({"product_id": 7})).unwrap();
        assert_eq!(input.product_id, ProductId::new(7));
        assert_eq!(input.quantity, 1);
        assert_eq!(input.selected_options, serde_json::json!({}));
    }

    #[test]
    fn test_add_to_cart_with_options() {
        let input: AddToCart = serde_json::from_value(serde_json::json!({
            "product_id": 3,
            "quantity": 2,
            "selected_options": {"nickname": "Luna", "unit_code": "CB-001"}
        }))
        .unwrap();
        assert_eq!(input.quantity, 2);
        assert_eq!(selected_unit_code(&input.selected_options), Some("CB-001"));
    }
}
