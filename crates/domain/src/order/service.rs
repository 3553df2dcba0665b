//! Order service: checkout and cancellation.

use std::time::Instant;

use chrono::{Datelike, Utc};
use common::{CartId, CustomerId, Money, OrderId, OrderStatus};
use storage::{
    Delivery, NewOrder, NewOrderItem, ORDER_NUMBER_CONSTRAINT, Order, Store, UnitOfWork,
};

use super::{DeliveryDetails, OrderDetails, OrderError, OrderLineView, OrderNumber};
use crate::cart::CartError;
use crate::error::DomainError;
use crate::inventory::InventoryLedger;

/// Attempts made at placing an order before a number collision is
/// reported to the caller.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Service for placing, reading and cancelling orders.
///
/// Each operation runs in a single unit of work. Any failure drops the unit
/// of work, which discards every write it made.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
    max_attempts: u32,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets how many times placement is attempted when the order number
    /// collides with a concurrent order. At least one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Turns a customer's cart into an order.
    ///
    /// Validates delivery details, checks stock for every line before
    /// touching anything, then writes the order and its items, takes the
    /// stock and empties the cart. All of it commits together or not at
    /// all. A clash on the order number retries the whole unit of work.
    #[tracing::instrument(skip(self, details))]
    pub async fn place_order(
        &self,
        customer_id: CustomerId,
        cart_id: CartId,
        details: DeliveryDetails,
    ) -> Result<OrderDetails, DomainError> {
        let started = Instant::now();
        let result = self.place_with_retry(customer_id, cart_id, details).await;

        match &result {
            Ok(placed) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::histogram!("order_placement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %placed.order.id,
                    order_number = %placed.order.order_number,
                    total = %placed.order.total,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("order_placement_failures_total", "reason" => e.kind())
                    .increment(1);
                match e {
                    DomainError::Inventory(_) => tracing::warn!(error = %e, "order rejected"),
                    DomainError::Storage(_) => tracing::error!(error = %e, "order placement failed"),
                    _ => tracing::debug!(error = %e, "order rejected"),
                }
            }
        }

        result
    }

    async fn place_with_retry(
        &self,
        customer_id: CustomerId,
        cart_id: CartId,
        details: DeliveryDetails,
    ) -> Result<OrderDetails, DomainError> {
        let delivery = details.validate()?;

        let mut attempt = 1;
        loop {
            match self.try_place(customer_id, cart_id, &delivery).await {
                Err(DomainError::Storage(e)) if e.is_unique_violation(ORDER_NUMBER_CONSTRAINT) => {
                    metrics::counter!("order_number_collisions_total").increment(1);
                    tracing::warn!(attempt, "order number collision");
                    if attempt >= self.max_attempts {
                        return Err(OrderError::OrderNumberCollision.into());
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_place(
        &self,
        customer_id: CustomerId,
        cart_id: CartId,
        delivery: &Delivery,
    ) -> Result<OrderDetails, DomainError> {
        let mut tx = self.store.begin().await?;

        if tx.city(delivery.city_id).await?.is_none() {
            return Err(OrderError::InvalidDelivery {
                field: "delivery_city_id",
                reason: "does not exist".to_string(),
            }
            .into());
        }

        let cart = tx
            .cart(cart_id)
            .await?
            .filter(|cart| cart.customer_id == customer_id)
            .ok_or(CartError::CartNotFound)?;
        let lines = tx.cart_lines(cart.id).await?;
        if lines.is_empty() {
            return Err(OrderError::EmptyCart.into());
        }

        for line in &lines {
            InventoryLedger::ensure_available(&line.product, line.item.quantity)?;
        }

        let number = OrderNumber::next_for_year(&mut tx, Utc::now().year()).await?;
        let subtotal: Money = lines.iter().map(|line| line.item.subtotal()).sum();

        let order = tx
            .insert_order(NewOrder {
                order_number: number.to_string(),
                customer_id,
                shop_id: cart.shop_id,
                subtotal,
                total: subtotal,
                delivery: delivery.clone(),
            })
            .await?;

        for line in &lines {
            tx.insert_order_item(NewOrderItem {
                order_id: order.id,
                product_id: line.product.id,
                product_name: line.product.display_name().to_string(),
                quantity: line.item.quantity,
                price: line.item.price,
                subtotal: line.item.subtotal(),
            })
            .await?;
            InventoryLedger::decrement(&mut tx, line.product.id, line.item.quantity).await?;
        }

        tx.clear_cart(cart.id).await?;

        let details = load_details(&mut tx, order).await?;
        tx.commit().await?;
        Ok(details)
    }

    /// Cancels a pending or confirmed order and puts its stock back.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        customer_id: CustomerId,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        let mut tx = self.store.begin().await?;
        let order = owned_order(&mut tx, customer_id, order_id).await?;

        if !order.status.can_cancel() {
            return Err(OrderError::OrderNotCancellable {
                status: order.status,
            }
            .into());
        }

        for item in tx.order_items(order.id).await? {
            InventoryLedger::increment(&mut tx, item.product_id, item.quantity).await?;
        }
        tx.set_order_status(order.id, OrderStatus::Cancelled).await?;

        let order = tx.order(order.id).await?.ok_or(OrderError::OrderNotFound)?;
        let details = load_details(&mut tx, order).await?;
        tx.commit().await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_number = %details.order.order_number, "order cancelled");
        Ok(details)
    }

    /// Loads one of the customer's orders.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        customer_id: CustomerId,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        let mut tx = self.store.begin().await?;
        let order = owned_order(&mut tx, customer_id, order_id).await?;
        let details = load_details(&mut tx, order).await?;
        tx.commit().await?;
        Ok(details)
    }

    /// Lists the customer's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<OrderDetails>, DomainError> {
        let mut tx = self.store.begin().await?;
        let orders = tx.orders_for_customer(customer_id).await?;

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(load_details(&mut tx, order).await?);
        }

        tx.commit().await?;
        Ok(details)
    }
}

/// Loads an order if it belongs to the customer.
async fn owned_order<U: UnitOfWork>(
    tx: &mut U,
    customer_id: CustomerId,
    order_id: OrderId,
) -> Result<Order, DomainError> {
    let order = tx
        .order(order_id)
        .await?
        .filter(|order| order.customer_id == customer_id)
        .ok_or(OrderError::OrderNotFound)?;
    Ok(order)
}

async fn load_details<U: UnitOfWork>(tx: &mut U, order: Order) -> Result<OrderDetails, DomainError> {
    let shop = tx.shop(order.shop_id).await?;
    let city = tx.city(order.delivery.city_id).await?;

    let mut lines = Vec::new();
    for item in tx.order_items(order.id).await? {
        let product = tx.product(item.product_id).await?;
        lines.push(OrderLineView { item, product });
    }

    Ok(OrderDetails::new(order, shop, city, lines))
}
