//! Domain error types.

use storage::StorageError;
use thiserror::Error;

use crate::cart::CartError;
use crate::import::ImportError;
use crate::inventory::InventoryError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the store.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stock check or stock change failed.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// A cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// An order operation failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// A bulk import could not be read.
    #[error(transparent)]
    Import(#[from] ImportError),
}

impl DomainError {
    /// Short machine-readable label, used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Storage(_) => "storage",
            DomainError::Inventory(InventoryError::InsufficientStock { .. }) => "insufficient_stock",
            DomainError::Inventory(InventoryError::ProductNotFound(_)) => "product_not_found",
            DomainError::Cart(_) => "cart",
            DomainError::Order(OrderError::EmptyCart) => "empty_cart",
            DomainError::Order(OrderError::InvalidDelivery { .. }) => "invalid_delivery",
            DomainError::Order(OrderError::OrderNumberCollision) => "order_number_collision",
            DomainError::Order(_) => "order",
            DomainError::Import(_) => "import",
        }
    }
}
