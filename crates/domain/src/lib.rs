//! Domain layer for the marketplace.
//!
//! This crate provides the workflows that touch stock:
//! - Inventory ledger with a floor at zero
//! - Per-shop carts with price snapshots
//! - Order placement and cancellation with year-scoped order numbers
//! - Bulk product import from CSV

pub mod cart;
pub mod error;
pub mod import;
pub mod inventory;
pub mod order;

pub use cart::{CartError, CartLineView, CartService, CartView};
pub use error::DomainError;
pub use import::{ImportError, ImportReport, ImportRowError, ProductImporter};
pub use inventory::{InventoryError, InventoryLedger};
pub use order::{
    DEFAULT_MAX_ATTEMPTS, DeliveryDetails, OrderDetails, OrderError, OrderLineView, OrderNumber,
    OrderService, ParseOrderNumberError,
};
