//! Inventory ledger: the only writer of product stock.
//!
//! Every call takes the unit of work it runs in, so a check and the
//! decrement that follows it observe the same transaction.

use common::ProductId;
use storage::{Product, UnitOfWork};
use thiserror::Error;

use crate::error::DomainError;

/// Errors raised by stock checks and stock changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Not enough units are available.
    #[error("Insufficient stock for product: {product_name}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },
}

impl InventoryError {
    fn insufficient(product: &Product, requested: u32) -> Self {
        InventoryError::InsufficientStock {
            product_id: product.id,
            product_name: product.display_name().to_string(),
            requested,
            available: product.quantity,
        }
    }
}

/// Stateless access to per-product stock inside a unit of work.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Fails with `InsufficientStock` unless `product` has at least
    /// `requested` units.
    pub fn ensure_available(product: &Product, requested: u32) -> Result<(), InventoryError> {
        if product.quantity >= requested {
            Ok(())
        } else {
            Err(InventoryError::insufficient(product, requested))
        }
    }

    /// Returns true iff the product currently has at least `requested` units.
    pub async fn check_available<U: UnitOfWork>(
        tx: &mut U,
        product_id: ProductId,
        requested: u32,
    ) -> Result<bool, DomainError> {
        let product = tx
            .product(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        Ok(product.quantity >= requested)
    }

    /// Takes `quantity` units out of stock.
    ///
    /// The store applies the change only if enough units remain, so a
    /// concurrent writer that got there first turns into
    /// `InsufficientStock` rather than negative stock.
    pub async fn decrement<U: UnitOfWork>(
        tx: &mut U,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), DomainError> {
        if tx.decrement_stock(product_id, quantity).await? {
            return Ok(());
        }

        let product = tx
            .product(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        tracing::warn!(
            %product_id,
            requested = quantity,
            available = product.quantity,
            "stock decrement refused"
        );
        Err(InventoryError::insufficient(&product, quantity).into())
    }

    /// Puts `quantity` units back into stock.
    ///
    /// Additive and unconditional. Returns false if the product no longer
    /// exists, in which case there is nothing to restore.
    pub async fn increment<U: UnitOfWork>(
        tx: &mut U,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, DomainError> {
        let restored = tx.increment_stock(product_id, quantity).await?;
        if !restored {
            tracing::debug!(%product_id, quantity, "product gone, stock not restored");
        }
        Ok(restored)
    }
}
