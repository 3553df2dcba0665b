use serde::{Deserialize, Serialize};

/// Declares a typed row identifier backed by a database `BIGINT`.
///
/// Keeping each table's key in its own type prevents passing a shop id where
/// a product id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database key.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw database key.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// A registered customer (the `users` table).
    CustomerId
);
row_id!(
    /// A seller company owning one or more shops.
    CompanyId
);
row_id!(
    /// A shop selling product listings.
    ShopId
);
row_id!(
    /// A delivery city.
    CityId
);
row_id!(
    /// A catalog-level product definition shared between sellers.
    NomenclatureId
);
row_id!(
    /// A concrete product listing of one shop.
    ProductId
);
row_id!(CartId);
row_id!(CartItemId);
row_id!(OrderId);
row_id!(OrderItemId);
