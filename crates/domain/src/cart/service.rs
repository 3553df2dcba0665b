//! Cart service: customer-scoped cart mutations.

use common::{CartItemId, CustomerId, ProductId, ShopId};
use storage::{Cart, CartItem, NewCartItem, Store, UnitOfWork};

use super::{CartError, CartView};
use crate::error::DomainError;
use crate::inventory::InventoryLedger;

/// Service for managing shopping carts.
///
/// A customer has at most one cart per shop. Every operation verifies that
/// the cart (or item) belongs to the acting customer before touching it.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lists every cart of a customer with lines and totals.
    #[tracing::instrument(skip(self))]
    pub async fn carts(&self, customer_id: CustomerId) -> Result<Vec<CartView>, DomainError> {
        let mut tx = self.store.begin().await?;
        let carts = tx.carts_for_customer(customer_id).await?;

        let mut views = Vec::with_capacity(carts.len());
        for cart in carts {
            views.push(load_view(&mut tx, cart).await?);
        }

        tx.commit().await?;
        Ok(views)
    }

    /// Returns the customer's cart for a shop, creating it if needed.
    #[tracing::instrument(skip(self))]
    pub async fn cart_for_shop(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<CartView, DomainError> {
        let mut tx = self.store.begin().await?;
        if tx.shop(shop_id).await?.is_none() {
            return Err(CartError::ShopNotFound(shop_id).into());
        }

        let cart = tx.get_or_create_cart(customer_id, shop_id).await?;
        let view = load_view(&mut tx, cart).await?;

        tx.commit().await?;
        Ok(view)
    }

    /// Returns the customer's existing cart for a shop.
    #[tracing::instrument(skip(self))]
    pub async fn find_cart(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<CartView, DomainError> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .cart_for(customer_id, shop_id)
            .await?
            .ok_or(CartError::CartNotFound)?;
        let view = load_view(&mut tx, cart).await?;

        tx.commit().await?;
        Ok(view)
    }

    /// Adds a product to the cart of its shop.
    ///
    /// If the cart already holds the product, its quantity grows instead and
    /// the combined quantity is checked against current stock. New lines
    /// capture the product's current price.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: Option<u32>,
    ) -> Result<CartView, DomainError> {
        let quantity = positive(quantity.unwrap_or(1))?;

        let mut tx = self.store.begin().await?;
        let product = tx
            .product(product_id)
            .await?
            .filter(|product| product.is_active)
            .ok_or(CartError::ProductNotFound(product_id))?;
        InventoryLedger::ensure_available(&product, quantity)?;

        let cart = tx.get_or_create_cart(customer_id, product.shop_id).await?;

        match tx.cart_item_for_product(cart.id, product.id).await? {
            Some(existing) => {
                let merged = existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CartError::InvalidQuantity { quantity })?;
                InventoryLedger::ensure_available(&product, merged)?;
                tx.set_cart_item_quantity(existing.id, merged).await?;
            }
            None => {
                tx.insert_cart_item(NewCartItem {
                    cart_id: cart.id,
                    product_id: product.id,
                    quantity,
                    price: product.price,
                })
                .await?;
            }
        }

        let view = load_view(&mut tx, cart).await?;
        tx.commit().await?;

        metrics::counter!("cart_mutations_total", "op" => "add").increment(1);
        Ok(view)
    }

    /// Sets the quantity of a cart item after checking current stock.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: CustomerId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        let quantity = positive(quantity)?;

        let mut tx = self.store.begin().await?;
        let (item, cart) = owned_item(&mut tx, customer_id, item_id).await?;
        let product = tx
            .product(item.product_id)
            .await?
            .ok_or(CartError::ProductNotFound(item.product_id))?;
        InventoryLedger::ensure_available(&product, quantity)?;

        tx.set_cart_item_quantity(item.id, quantity).await?;
        let view = load_view(&mut tx, cart).await?;
        tx.commit().await?;

        metrics::counter!("cart_mutations_total", "op" => "update").increment(1);
        Ok(view)
    }

    /// Removes one line from a cart. The cart itself remains.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: CustomerId,
        item_id: CartItemId,
    ) -> Result<CartView, DomainError> {
        let mut tx = self.store.begin().await?;
        let (item, cart) = owned_item(&mut tx, customer_id, item_id).await?;

        tx.delete_cart_item(item.id).await?;
        let view = load_view(&mut tx, cart).await?;
        tx.commit().await?;

        metrics::counter!("cart_mutations_total", "op" => "remove").increment(1);
        Ok(view)
    }

    /// Removes every line from the customer's cart for a shop.
    #[tracing::instrument(skip(self))]
    pub async fn clear(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<CartView, DomainError> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .cart_for(customer_id, shop_id)
            .await?
            .ok_or(CartError::CartNotFound)?;

        let removed = tx.clear_cart(cart.id).await?;
        let view = load_view(&mut tx, cart).await?;
        tx.commit().await?;

        tracing::debug!(removed, "cart cleared");
        metrics::counter!("cart_mutations_total", "op" => "clear").increment(1);
        Ok(view)
    }
}

fn positive(quantity: u32) -> Result<u32, CartError> {
    if quantity == 0 {
        Err(CartError::InvalidQuantity { quantity })
    } else {
        Ok(quantity)
    }
}

/// Loads an item together with its cart, if the cart is the customer's.
async fn owned_item<U: UnitOfWork>(
    tx: &mut U,
    customer_id: CustomerId,
    item_id: CartItemId,
) -> Result<(CartItem, Cart), DomainError> {
    let item = tx
        .cart_item(item_id)
        .await?
        .ok_or(CartError::CartItemNotFound)?;
    let cart = tx
        .cart(item.cart_id)
        .await?
        .filter(|cart| cart.customer_id == customer_id)
        .ok_or(CartError::CartItemNotFound)?;
    Ok((item, cart))
}

pub(crate) async fn load_view<U: UnitOfWork>(tx: &mut U, cart: Cart) -> Result<CartView, DomainError> {
    let shop = tx.shop(cart.shop_id).await?;
    let lines = tx.cart_lines(cart.id).await?;
    Ok(CartView::new(cart, shop, lines))
}
