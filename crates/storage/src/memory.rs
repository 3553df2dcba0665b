use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartId, CartItemId, CityId, CompanyId, CustomerId, Money, NomenclatureId, OrderId,
    OrderItemId, OrderStatus, ProductId, ShopId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CART_PRODUCT_CONSTRAINT, Cart, CartItem, CartLine, City, NewCartItem,
    NewOrder, NewOrderItem, NewProduct, Nomenclature, NomenclatureStatus, ORDER_NUMBER_CONSTRAINT,
    Order, OrderItem, Product, ProductSpec, Result, Shop, StorageError,
    store::{Store, UnitOfWork},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    shops: BTreeMap<ShopId, Shop>,
    cities: BTreeMap<CityId, City>,
    nomenclatures: BTreeMap<NomenclatureId, Nomenclature>,
    products: BTreeMap<ProductId, Product>,
    product_specs: Vec<ProductSpec>,
    carts: BTreeMap<CartId, Cart>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    order_items: BTreeMap<OrderItemId, OrderItem>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// In-memory store implementation for testing and local runs.
///
/// A unit of work holds an exclusive lock on every table for its whole
/// lifetime, so transactions are fully serialized. The same constraints the
/// PostgreSQL schema declares are checked on write.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    forced_order_number_collisions: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` order inserts fail with a duplicate order
    /// number, as a concurrent writer would cause.
    pub fn inject_order_number_collisions(&self, count: usize) {
        self.forced_order_number_collisions
            .store(count, Ordering::SeqCst);
    }

    pub async fn add_shop(&self, company_id: CompanyId, name: &str) -> Shop {
        let mut tables = self.tables.lock().await;
        let shop = Shop {
            id: ShopId::new(tables.next_id()),
            company_id,
            name: name.to_string(),
        };
        tables.shops.insert(shop.id, shop.clone());
        shop
    }

    pub async fn add_city(&self, name_ru: &str, name_kz: &str) -> City {
        let mut tables = self.tables.lock().await;
        let city = City {
            id: CityId::new(tables.next_id()),
            name_ru: name_ru.to_string(),
            name_kz: name_kz.to_string(),
        };
        tables.cities.insert(city.id, city.clone());
        city
    }

    pub async fn add_nomenclature(
        &self,
        name_ru: &str,
        name_kz: &str,
        status: NomenclatureStatus,
    ) -> Nomenclature {
        let mut tables = self.tables.lock().await;
        let nomenclature = Nomenclature {
            id: NomenclatureId::new(tables.next_id()),
            name_ru: name_ru.to_string(),
            name_kz: name_kz.to_string(),
            status,
        };
        tables
            .nomenclatures
            .insert(nomenclature.id, nomenclature.clone());
        nomenclature
    }

    /// Inserts an active product outside of any unit of work.
    pub async fn add_product(
        &self,
        shop_id: ShopId,
        name: &str,
        price: Money,
        quantity: u32,
    ) -> Product {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(tables.next_id()),
            shop_id,
            nomenclature_id: NomenclatureId::new(0),
            name_ru: name.to_string(),
            name_kz: name.to_string(),
            price,
            quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(product.id, product.clone());
        product
    }

    /// Overwrites product fields the way a seller edit would.
    pub async fn update_product(&self, id: ProductId, update: impl FnOnce(&mut Product)) {
        let mut tables = self.tables.lock().await;
        if let Some(product) = tables.products.get_mut(&id) {
            update(product);
            product.updated_at = Utc::now();
        }
    }

    pub async fn remove_product(&self, id: ProductId) {
        let mut tables = self.tables.lock().await;
        tables.products.remove(&id);
        tables.cart_items.retain(|_, item| item.product_id != id);
    }

    /// Sets an order's status directly, as an external fulfillment process
    /// would.
    pub async fn force_order_status(&self, id: OrderId, status: OrderStatus) {
        let mut tables = self.tables.lock().await;
        if let Some(order) = tables.orders.get_mut(&id) {
            order.status = status;
        }
    }

    /// Moves an order's creation time, e.g. into a previous year.
    pub async fn backdate_order(&self, id: OrderId, created_at: DateTime<Utc>) {
        let mut tables = self.tables.lock().await;
        if let Some(order) = tables.orders.get_mut(&id) {
            order.created_at = created_at;
        }
    }

    pub async fn product_snapshot(&self, id: ProductId) -> Option<Product> {
        self.tables.lock().await.products.get(&id).cloned()
    }

    pub async fn product_specs(&self, id: ProductId) -> Vec<ProductSpec> {
        self.tables
            .lock()
            .await
            .product_specs
            .iter()
            .filter(|spec| spec.product_id == id)
            .cloned()
            .collect()
    }

    pub async fn product_count(&self) -> usize {
        self.tables.lock().await.products.len()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    pub async fn order_item_count(&self) -> usize {
        self.tables.lock().await.order_items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork> {
        let tables = self.tables.clone().lock_owned().await;
        let pre_image = Some(tables.clone());
        Ok(InMemoryUnitOfWork {
            tables,
            pre_image,
            forced_order_number_collisions: self.forced_order_number_collisions.clone(),
        })
    }
}

/// A serialized in-memory transaction.
///
/// Holds the store lock until it is committed, rolled back or dropped. Unless
/// committed, the tables are restored to their state at `begin`.
pub struct InMemoryUnitOfWork {
    tables: OwnedMutexGuard<Tables>,
    pre_image: Option<Tables>,
    forced_order_number_collisions: Arc<AtomicUsize>,
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if let Some(pre_image) = self.pre_image.take() {
            *self.tables = pre_image;
        }
    }
}

impl InMemoryUnitOfWork {
    fn take_forced_collision(&self) -> bool {
        self.forced_order_number_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn unique_violation(constraint: &str) -> StorageError {
    StorageError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn foreign_key_violation(constraint: &str) -> StorageError {
    StorageError::ForeignKeyViolation {
        constraint: constraint.to_string(),
    }
}

fn check_violation(constraint: &str) -> StorageError {
    StorageError::CheckViolation {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(mut self) -> Result<()> {
        self.pre_image = None;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        // Drop restores the pre-image.
        Ok(())
    }

    async fn shop(&mut self, id: ShopId) -> Result<Option<Shop>> {
        Ok(self.tables.shops.get(&id).cloned())
    }

    async fn shop_by_name(&mut self, company_id: CompanyId, name: &str) -> Result<Option<Shop>> {
        Ok(self
            .tables
            .shops
            .values()
            .find(|shop| shop.company_id == company_id && shop.name == name)
            .cloned())
    }

    async fn city(&mut self, id: CityId) -> Result<Option<City>> {
        Ok(self.tables.cities.get(&id).cloned())
    }

    async fn approved_nomenclature(&mut self, name_ru: &str) -> Result<Option<Nomenclature>> {
        Ok(self
            .tables
            .nomenclatures
            .values()
            .find(|n| n.status == NomenclatureStatus::Approved && n.name_ru == name_ru)
            .cloned())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        if !self.tables.shops.contains_key(&product.shop_id) {
            return Err(foreign_key_violation("products_shop_id_fkey"));
        }
        if !self.tables.nomenclatures.contains_key(&product.nomenclature_id) {
            return Err(foreign_key_violation("products_nomenclature_id_fkey"));
        }

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(self.tables.next_id()),
            shop_id: product.shop_id,
            nomenclature_id: product.nomenclature_id,
            name_ru: product.name_ru,
            name_kz: product.name_kz,
            price: product.price,
            quantity: product.quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn insert_product_spec(&mut self, spec: ProductSpec) -> Result<()> {
        if !self.tables.products.contains_key(&spec.product_id) {
            return Err(foreign_key_violation("product_specs_product_id_fkey"));
        }
        self.tables.product_specs.push(spec);
        Ok(())
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool> {
        let Some(product) = self.tables.products.get_mut(&id) else {
            return Ok(false);
        };
        match product.quantity.checked_sub(quantity) {
            Some(remaining) => {
                product.quantity = remaining;
                product.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool> {
        let Some(product) = self.tables.products.get_mut(&id) else {
            return Ok(false);
        };
        product.quantity = product
            .quantity
            .checked_add(quantity)
            .ok_or(StorageError::QuantityOutOfRange(quantity))?;
        product.updated_at = Utc::now();
        Ok(true)
    }

    async fn cart(&mut self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.tables.carts.get(&id).cloned())
    }

    async fn cart_for(
        &mut self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Option<Cart>> {
        Ok(self
            .tables
            .carts
            .values()
            .find(|cart| cart.customer_id == customer_id && cart.shop_id == shop_id)
            .cloned())
    }

    async fn get_or_create_cart(
        &mut self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Cart> {
        if let Some(cart) = self.cart_for(customer_id, shop_id).await? {
            return Ok(cart);
        }
        if !self.tables.shops.contains_key(&shop_id) {
            return Err(foreign_key_violation("carts_shop_id_fkey"));
        }

        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(self.tables.next_id()),
            customer_id,
            shop_id,
            created_at: now,
            updated_at: now,
        };
        self.tables.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn carts_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Cart>> {
        Ok(self
            .tables
            .carts
            .values()
            .filter(|cart| cart.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let tables = &*self.tables;
        Ok(tables
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .filter_map(|item| {
                tables.products.get(&item.product_id).map(|product| CartLine {
                    item: item.clone(),
                    product: product.clone(),
                })
            })
            .collect())
    }

    async fn cart_item(&mut self, id: CartItemId) -> Result<Option<CartItem>> {
        Ok(self.tables.cart_items.get(&id).cloned())
    }

    async fn cart_item_for_product(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        Ok(self
            .tables
            .cart_items
            .values()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
            .cloned())
    }

    async fn insert_cart_item(&mut self, item: NewCartItem) -> Result<CartItem> {
        if item.quantity == 0 {
            return Err(check_violation("cart_items_quantity_positive"));
        }
        if !self.tables.carts.contains_key(&item.cart_id) {
            return Err(foreign_key_violation("cart_items_cart_id_fkey"));
        }
        if !self.tables.products.contains_key(&item.product_id) {
            return Err(foreign_key_violation("cart_items_product_id_fkey"));
        }
        if self
            .cart_item_for_product(item.cart_id, item.product_id)
            .await?
            .is_some()
        {
            return Err(unique_violation(CART_PRODUCT_CONSTRAINT));
        }

        let item = CartItem {
            id: CartItemId::new(self.tables.next_id()),
            cart_id: item.cart_id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
        };
        self.tables.cart_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn set_cart_item_quantity(&mut self, id: CartItemId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(check_violation("cart_items_quantity_positive"));
        }
        if let Some(item) = self.tables.cart_items.get_mut(&id) {
            item.quantity = quantity;
        }
        Ok(())
    }

    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<()> {
        self.tables.cart_items.remove(&id);
        Ok(())
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let before = self.tables.cart_items.len();
        self.tables
            .cart_items
            .retain(|_, item| item.cart_id != cart_id);
        Ok((before - self.tables.cart_items.len()) as u64)
    }

    async fn latest_order_number_with_prefix(&mut self, prefix: &str) -> Result<Option<String>> {
        Ok(self
            .tables
            .orders
            .values()
            .rev()
            .find(|order| order.order_number.starts_with(prefix))
            .map(|order| order.order_number.clone()))
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        if self.take_forced_collision()
            || self
                .tables
                .orders
                .values()
                .any(|existing| existing.order_number == order.order_number)
        {
            return Err(unique_violation(ORDER_NUMBER_CONSTRAINT));
        }
        if !self.tables.shops.contains_key(&order.shop_id) {
            return Err(foreign_key_violation("orders_shop_id_fkey"));
        }
        if !self.tables.cities.contains_key(&order.delivery.city_id) {
            return Err(foreign_key_violation("orders_delivery_city_id_fkey"));
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(self.tables.next_id()),
            order_number: order.order_number,
            customer_id: order.customer_id,
            shop_id: order.shop_id,
            status: OrderStatus::Pending,
            subtotal: order.subtotal,
            total: order.total,
            delivery: order.delivery,
            created_at: now,
            updated_at: now,
        };
        self.tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        if item.quantity == 0 {
            return Err(check_violation("order_items_quantity_check"));
        }
        if !self.tables.orders.contains_key(&item.order_id) {
            return Err(foreign_key_violation("order_items_order_id_fkey"));
        }

        let item = OrderItem {
            id: OrderItemId::new(self.tables.next_id()),
            order_id: item.order_id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            price: item.price,
            subtotal: item.subtotal,
        };
        self.tables.order_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.orders.get(&id).cloned())
    }

    async fn orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let mut orders: Vec<_> = self
            .tables
            .orders
            .values()
            .filter(|order| order.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .tables
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        if let Some(order) = self.tables.orders.get_mut(&id) {
            order.status = status;
            order.updated_at = Utc::now();
        }
        Ok(())
    }
}
