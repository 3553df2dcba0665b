use async_trait::async_trait;
use common::{CartId, CartItemId, CityId, CompanyId, CustomerId, OrderId, OrderStatus, ProductId, ShopId};

use crate::{
    Cart, CartItem, CartLine, City, NewCartItem, NewOrder, NewOrderItem, NewProduct, Nomenclature,
    Order, OrderItem, Product, ProductSpec, Result, Shop,
};

/// A source of units of work.
///
/// All implementations must be thread-safe (Send + Sync) so one store can be
/// shared between request handlers.
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction type handed out by this store.
    type Tx: UnitOfWork;

    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// One database transaction.
///
/// Writes become visible to other units of work only after [`commit`]. A unit
/// of work that is dropped without being committed is rolled back, so an early
/// return through `?` never leaves partial state behind.
///
/// [`commit`]: UnitOfWork::commit
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    /// Persists every write made through this unit of work.
    async fn commit(self) -> Result<()>;

    /// Discards every write made through this unit of work.
    async fn rollback(self) -> Result<()>;

    // -- Reference data --

    async fn shop(&mut self, id: ShopId) -> Result<Option<Shop>>;

    async fn shop_by_name(&mut self, company_id: CompanyId, name: &str) -> Result<Option<Shop>>;

    async fn city(&mut self, id: CityId) -> Result<Option<City>>;

    /// Finds an approved nomenclature entry by its Russian name.
    async fn approved_nomenclature(&mut self, name_ru: &str) -> Result<Option<Nomenclature>>;

    // -- Products --

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>>;

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    async fn insert_product_spec(&mut self, spec: ProductSpec) -> Result<()>;

    /// Removes `quantity` units from a product's stock if at least that many
    /// are available.
    ///
    /// The check and the write are a single conditional update, so concurrent
    /// callers cannot both succeed against the same units. Returns `false`
    /// when the product is missing or short.
    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool>;

    /// Adds `quantity` units back to a product's stock. Returns `false` when
    /// the product no longer exists.
    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool>;

    // -- Carts --

    async fn cart(&mut self, id: CartId) -> Result<Option<Cart>>;

    async fn cart_for(&mut self, customer_id: CustomerId, shop_id: ShopId)
    -> Result<Option<Cart>>;

    /// Returns the customer's cart for a shop, creating it if necessary.
    async fn get_or_create_cart(&mut self, customer_id: CustomerId, shop_id: ShopId)
    -> Result<Cart>;

    async fn carts_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Cart>>;

    /// Returns the cart's items joined with their current products, in the
    /// order they were added.
    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>>;

    async fn cart_item(&mut self, id: CartItemId) -> Result<Option<CartItem>>;

    async fn cart_item_for_product(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>>;

    async fn insert_cart_item(&mut self, item: NewCartItem) -> Result<CartItem>;

    async fn set_cart_item_quantity(&mut self, id: CartItemId, quantity: u32) -> Result<()>;

    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<()>;

    /// Deletes every item of a cart. The cart row itself is kept.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64>;

    // -- Orders --

    /// Returns the number of the most recently inserted order whose number
    /// starts with `prefix`.
    /// The match is on the number itself, never on `created_at`.
    async fn latest_order_number_with_prefix(&mut self, prefix: &str) -> Result<Option<String>>;

    /// Inserts an order with status `pending`.
    ///
    /// Fails with [`StorageError::UniqueViolation`] on a duplicate order
    /// number.
    ///
    /// [`StorageError::UniqueViolation`]: crate::StorageError::UniqueViolation
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem>;

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Returns the customer's orders, newest first.
    async fn orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>>;

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()>;
}
