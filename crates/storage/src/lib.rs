//! Persistence layer for the marketplace.
//!
//! All reads and writes go through a [`UnitOfWork`] obtained from a
//! [`Store`]. A unit of work is a database transaction: it is either
//! committed explicitly or rolled back, and dropping it without committing
//! discards every write it made.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StorageError};
pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use postgres::{PostgresStore, PostgresUnitOfWork};
pub use records::{
    Cart, CartItem, CartLine, City, Delivery, NewCartItem, NewOrder, NewOrderItem, NewProduct,
    Nomenclature, NomenclatureStatus, Order, OrderItem, Product, ProductSpec, Shop,
};
pub use store::{Store, UnitOfWork};

/// Name of the unique constraint on `orders.order_number`.
pub const ORDER_NUMBER_CONSTRAINT: &str = "unique_order_number";

/// Name of the unique constraint on `(carts.user_id, carts.shop_id)`.
pub const CART_OWNER_CONSTRAINT: &str = "unique_user_shop_cart";

/// Name of the unique constraint on `(cart_items.cart_id, cart_items.product_id)`.
pub const CART_PRODUCT_CONSTRAINT: &str = "unique_cart_product";
