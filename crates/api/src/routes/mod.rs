pub mod carts;
pub mod customer;
pub mod health;
pub mod json;
pub mod metrics;
pub mod orders;
