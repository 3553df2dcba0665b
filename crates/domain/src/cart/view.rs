use common::Money;
use serde::{Deserialize, Serialize};
use storage::{Cart, CartItem, CartLine, Product, Shop};

/// A cart item with its current product and line subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub item: CartItem,
    pub subtotal: Money,
    pub product: Product,
}

impl From<CartLine> for CartLineView {
    fn from(line: CartLine) -> Self {
        Self {
            subtotal: line.item.subtotal(),
            item: line.item,
            product: line.product,
        }
    }
}

/// A fully loaded cart as returned to customers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub shop: Option<Shop>,
    pub items: Vec<CartLineView>,
    /// Total units across all lines.
    pub items_count: u64,
    /// Sum of quantity times the price captured at add time.
    pub total: Money,
}

impl CartView {
    pub fn new(cart: Cart, shop: Option<Shop>, lines: Vec<CartLine>) -> Self {
        let items: Vec<CartLineView> = lines.into_iter().map(CartLineView::from).collect();
        let items_count = items.iter().map(|line| u64::from(line.item.quantity)).sum();
        let total = items.iter().map(|line| line.subtotal).sum();
        Self {
            cart,
            shop,
            items,
            items_count,
            total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
