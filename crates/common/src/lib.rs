//! Types shared by every layer of the marketplace.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, ParseStatusError};
pub use types::{
    CartId, CartItemId, CityId, CompanyId, CustomerId, NomenclatureId, OrderId, OrderItemId,
    ProductId, ShopId,
};
