use async_trait::async_trait;
use common::{
    CartId, CartItemId, CityId, CompanyId, CustomerId, Money, NomenclatureId, OrderId,
    OrderItemId, OrderStatus, ProductId, ShopId,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::{
    CART_OWNER_CONSTRAINT, Cart, CartItem, CartLine, City, Delivery, NewCartItem, NewOrder,
    NewOrderItem, NewProduct, Nomenclature, NomenclatureStatus, Order, OrderItem, Product,
    ProductSpec, Result, Shop, StorageError,
    store::{Store, UnitOfWork},
};

const PRODUCT_COLUMNS: &str = "id, shop_id, nomenclature_id, name_ru, name_kz, price, quantity, \
     is_active, created_at, updated_at";

const CART_COLUMNS: &str = "id, user_id, shop_id, created_at, updated_at";

const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, price";

const ORDER_COLUMNS: &str = "id, order_number, user_id, shop_id, status, subtotal, total, \
     delivery_address, delivery_entry, delivery_floor, delivery_apartment, delivery_intercom, \
     delivery_city_id, contact_phone, delivery_notes, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, price, subtotal";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to the given database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresUnitOfWork;

    async fn begin(&self) -> Result<PostgresUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnitOfWork { tx })
    }
}

/// A unit of work backed by a PostgreSQL transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| StorageError::QuantityOutOfRange(quantity))
}

fn read_quantity(row: &PgRow, column: &str) -> Result<u32> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| StorageError::Decode(format!("{column} is negative: {value}")))
}

fn read_money(row: &PgRow, column: &str) -> Result<Money> {
    Ok(Money::new(row.try_get::<Decimal, _>(column)?))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        shop_id: ShopId::new(row.try_get("shop_id")?),
        nomenclature_id: NomenclatureId::new(row.try_get("nomenclature_id")?),
        name_ru: row.try_get("name_ru")?,
        name_kz: row.try_get("name_kz")?,
        price: read_money(row, "price")?,
        quantity: read_quantity(row, "quantity")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart(row: &PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::new(row.try_get("id")?),
        customer_id: CustomerId::new(row.try_get("user_id")?),
        shop_id: ShopId::new(row.try_get("shop_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: &PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::new(row.try_get("id")?),
        cart_id: CartId::new(row.try_get("cart_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: read_quantity(row, "quantity")?,
        price: read_money(row, "price")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        order_number: row.try_get("order_number")?,
        customer_id: CustomerId::new(row.try_get("user_id")?),
        shop_id: ShopId::new(row.try_get("shop_id")?),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StorageError::Decode(e.to_string()))?,
        subtotal: read_money(row, "subtotal")?,
        total: read_money(row, "total")?,
        delivery: Delivery {
            address: row.try_get("delivery_address")?,
            entry: row.try_get("delivery_entry")?,
            floor: row.try_get("delivery_floor")?,
            apartment: row.try_get("delivery_apartment")?,
            intercom: row.try_get("delivery_intercom")?,
            city_id: CityId::new(row.try_get("delivery_city_id")?),
            contact_phone: row.try_get("contact_phone")?,
            notes: row.try_get("delivery_notes")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: read_quantity(row, "quantity")?,
        price: read_money(row, "price")?,
        subtotal: read_money(row, "subtotal")?,
    })
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn shop(&mut self, id: ShopId) -> Result<Option<Shop>> {
        let row = sqlx::query("SELECT id, company_id, name FROM shops WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(Shop {
                id: ShopId::new(row.try_get("id")?),
                company_id: CompanyId::new(row.try_get("company_id")?),
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn shop_by_name(&mut self, company_id: CompanyId, name: &str) -> Result<Option<Shop>> {
        let row = sqlx::query(
            "SELECT id, company_id, name FROM shops WHERE company_id = $1 AND name = $2",
        )
        .bind(company_id.as_i64())
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(Shop {
                id: ShopId::new(row.try_get("id")?),
                company_id: CompanyId::new(row.try_get("company_id")?),
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn city(&mut self, id: CityId) -> Result<Option<City>> {
        let row = sqlx::query("SELECT id, name_ru, name_kz FROM cities WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(City {
                id: CityId::new(row.try_get("id")?),
                name_ru: row.try_get("name_ru")?,
                name_kz: row.try_get("name_kz")?,
            })),
            None => Ok(None),
        }
    }

    async fn approved_nomenclature(&mut self, name_ru: &str) -> Result<Option<Nomenclature>> {
        let row = sqlx::query(
            r#"
            SELECT id, name_ru, name_kz, status
            FROM nomenclatures
            WHERE status = 'approved' AND name_ru = $1
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(name_ru)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let status: String = row.try_get("status")?;
                Ok(Some(Nomenclature {
                    id: NomenclatureId::new(row.try_get("id")?),
                    name_ru: row.try_get("name_ru")?,
                    name_kz: row.try_get("name_kz")?,
                    status: NomenclatureStatus::parse(&status).ok_or_else(|| {
                        StorageError::Decode(format!("unknown nomenclature status: {status}"))
                    })?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (shop_id, nomenclature_id, name_ru, name_kz, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.shop_id.as_i64())
        .bind(product.nomenclature_id.as_i64())
        .bind(&product.name_ru)
        .bind(&product.name_kz)
        .bind(product.price.amount())
        .bind(db_quantity(product.quantity)?)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_product(&row)
    }

    async fn insert_product_spec(&mut self, spec: ProductSpec) -> Result<()> {
        sqlx::query(
            "INSERT INTO product_specs (product_id, spec_name, spec_value) VALUES ($1, $2, $3)",
        )
        .bind(spec.product_id.as_i64())
        .bind(&spec.name)
        .bind(&spec.value)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool> {
        // The row lock taken by UPDATE serializes concurrent decrements; the
        // guard is re-evaluated against the committed quantity.
        let result = sqlx::query(
            r#"
            UPDATE products
            SET quantity = quantity - $2, updated_at = NOW()
            WHERE id = $1 AND quantity >= $2
            "#,
        )
        .bind(id.as_i64())
        .bind(db_quantity(quantity)?)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET quantity = quantity + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(db_quantity(quantity)?)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn cart(&mut self, id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query(&format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_cart).transpose()
    }

    async fn cart_for(
        &mut self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Option<Cart>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 AND shop_id = $2"
        ))
        .bind(customer_id.as_i64())
        .bind(shop_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_cart).transpose()
    }

    async fn get_or_create_cart(
        &mut self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Cart> {
        // DO UPDATE (rather than DO NOTHING) makes RETURNING yield the
        // existing row as well.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO carts (user_id, shop_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT {CART_OWNER_CONSTRAINT} DO UPDATE SET updated_at = carts.updated_at
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(customer_id.as_i64())
        .bind(shop_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_cart(&row)
    }

    async fn carts_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Cart>> {
        let rows = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 ORDER BY id ASC"
        ))
        .bind(customer_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_cart).collect()
    }

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT ci.id AS item_id, ci.cart_id, ci.quantity AS item_quantity,
                   ci.price AS item_price,
                   p.id, p.shop_id, p.nomenclature_id, p.name_ru, p.name_kz, p.price,
                   p.quantity, p.is_active, p.created_at, p.updated_at
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id ASC
            "#,
        )
        .bind(cart_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| {
                let product = row_to_product(row)?;
                let item = CartItem {
                    id: CartItemId::new(row.try_get("item_id")?),
                    cart_id: CartId::new(row.try_get("cart_id")?),
                    product_id: product.id,
                    quantity: read_quantity(row, "item_quantity")?,
                    price: read_money(row, "item_price")?,
                };
                Ok(CartLine { item, product })
            })
            .collect()
    }

    async fn cart_item(&mut self, id: CartItemId) -> Result<Option<CartItem>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_cart_item).transpose()
    }

    async fn cart_item_for_product(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 AND product_id = $2"
        ))
        .bind(cart_id.as_i64())
        .bind(product_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_cart_item).transpose()
    }

    async fn insert_cart_item(&mut self, item: NewCartItem) -> Result<CartItem> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            RETURNING {CART_ITEM_COLUMNS}
            "#
        ))
        .bind(item.cart_id.as_i64())
        .bind(item.product_id.as_i64())
        .bind(db_quantity(item.quantity)?)
        .bind(item.price.amount())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_cart_item(&row)
    }

    async fn set_cart_item_quantity(&mut self, id: CartItemId, quantity: u32) -> Result<()> {
        sqlx::query("UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_i64())
            .bind(db_quantity(quantity)?)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn latest_order_number_with_prefix(&mut self, prefix: &str) -> Result<Option<String>> {
        let number: Option<String> = sqlx::query_scalar(
            r#"
            SELECT order_number
            FROM orders
            WHERE starts_with(order_number, $1)
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(prefix)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(number)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (
                order_number, user_id, shop_id, status, subtotal, total,
                delivery_address, delivery_entry, delivery_floor, delivery_apartment,
                delivery_intercom, delivery_city_id, contact_phone, delivery_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order.order_number)
        .bind(order.customer_id.as_i64())
        .bind(order.shop_id.as_i64())
        .bind(OrderStatus::Pending.as_str())
        .bind(order.subtotal.amount())
        .bind(order.total.amount())
        .bind(&order.delivery.address)
        .bind(&order.delivery.entry)
        .bind(&order.delivery.floor)
        .bind(&order.delivery.apartment)
        .bind(&order.delivery.intercom)
        .bind(order.delivery.city_id.as_i64())
        .bind(&order.delivery.contact_phone)
        .bind(&order.delivery.notes)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order(&row)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity, price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_ITEM_COLUMNS}
            "#
        ))
        .bind(item.order_id.as_i64())
        .bind(item.product_id.as_i64())
        .bind(&item.product_name)
        .bind(db_quantity(item.quantity)?)
        .bind(item.price.amount())
        .bind(item.subtotal.amount())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order_item(&row)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(customer_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id ASC"
        ))
        .bind(order_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_order_item).collect()
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_i64())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }
}
