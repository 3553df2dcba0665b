//! Row types read from and written to the store.

use chrono::{DateTime, Utc};
use common::{
    CartId, CartItemId, CityId, CompanyId, CustomerId, Money, NomenclatureId, OrderId,
    OrderItemId, OrderStatus, ProductId, ShopId,
};
use serde::{Deserialize, Serialize};

/// A product listing of one shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub nomenclature_id: NomenclatureId,
    pub name_ru: String,
    pub name_kz: String,
    pub price: Money,
    /// Units available for sale. Never negative.
    pub quantity: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Name used in customer-facing messages.
    pub fn display_name(&self) -> &str {
        &self.name_ru
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub shop_id: ShopId,
    pub nomenclature_id: NomenclatureId,
    pub name_ru: String,
    pub name_kz: String,
    pub price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub product_id: ProductId,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub company_id: CompanyId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name_ru: String,
    pub name_kz: String,
}

/// Approval state of a nomenclature entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NomenclatureStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl NomenclatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NomenclatureStatus::Pending => "pending",
            NomenclatureStatus::Approved => "approved",
            NomenclatureStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(NomenclatureStatus::Pending),
            "approved" => Some(NomenclatureStatus::Approved),
            "rejected" => Some(NomenclatureStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nomenclature {
    pub id: NomenclatureId,
    pub name_ru: String,
    pub name_kz: String,
    pub status: NomenclatureStatus,
}

/// A customer's cart for one shop. At most one exists per (customer, shop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Product price captured when the item was first added.
    pub price: Money,
}

impl CartItem {
    pub fn subtotal(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

/// A cart item together with the current state of its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

/// Delivery details copied verbatim onto an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub address: String,
    pub entry: Option<String>,
    pub floor: Option<String>,
    pub apartment: Option<String>,
    pub intercom: Option<String>,
    pub city_id: CityId,
    pub contact_phone: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub total: Money,
    pub delivery: Delivery,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub subtotal: Money,
    pub total: Money,
    pub delivery: Delivery,
}

/// A historical order line. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// Weak reference; the product may since have been deleted.
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price: Money,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price: Money,
    pub subtotal: Money,
}
