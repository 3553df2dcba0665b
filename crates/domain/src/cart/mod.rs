//! Per-shop shopping carts.

mod service;
mod view;

pub use service::CartService;
pub use view::{CartLineView, CartView};

use common::{ProductId, ShopId};
use thiserror::Error;

/// Errors that can occur during cart operations.
///
/// Carts and items owned by another customer are reported as not found.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// No cart exists for this customer and shop.
    #[error("Cart not found")]
    CartNotFound,

    /// No such item in any of the customer's carts.
    #[error("Cart item not found")]
    CartItemNotFound,

    /// The product does not exist or is not for sale.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The shop does not exist.
    #[error("Shop not found: {0}")]
    ShopNotFound(ShopId),

    /// Quantity must be a positive integer.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },
}
