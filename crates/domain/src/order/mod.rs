//! Order placement and cancellation.

mod delivery;
mod number;
mod service;
mod view;

pub use delivery::DeliveryDetails;
pub use number::{OrderNumber, ParseOrderNumberError};
pub use service::{DEFAULT_MAX_ATTEMPTS, OrderService};
pub use view::{OrderDetails, OrderLineView};

use common::OrderStatus;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The cart has no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// A delivery field is missing or malformed.
    #[error("Invalid delivery field {field}: {reason}")]
    InvalidDelivery { field: &'static str, reason: String },

    /// No such order for this customer.
    #[error("Order not found")]
    OrderNotFound,

    /// Only pending or confirmed orders can be cancelled.
    #[error("Order cannot be cancelled in {status} state")]
    OrderNotCancellable { status: OrderStatus },

    /// Every attempt to assign an order number clashed with a concurrent
    /// order.
    #[error("Could not assign a unique order number, please retry")]
    OrderNumberCollision,
}
