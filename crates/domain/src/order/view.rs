use serde::{Deserialize, Serialize};
use storage::{City, Order, OrderItem, Product, Shop};

/// An order line with the product as it is now, if it still exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineView {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<Product>,
}

/// A fully loaded order: header, lines, shop and delivery city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub shop: Option<Shop>,
    pub delivery_city: Option<City>,
    pub items: Vec<OrderLineView>,
    pub items_count: u64,
}

impl OrderDetails {
    pub fn new(
        order: Order,
        shop: Option<Shop>,
        delivery_city: Option<City>,
        items: Vec<OrderLineView>,
    ) -> Self {
        let items_count = items.iter().map(|line| u64::from(line.item.quantity)).sum();
        Self {
            order,
            shop,
            delivery_city,
            items,
            items_count,
        }
    }
}
