//! PostgreSQL-backed store.

use async_trait::async_trait;
use common::{CartItemId, Money, OrderId, OrderStatus, Party, ProductId, ShopId, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::records::{CartItem, Order, OrderItem, Product, Shop, StatusPatch};
use crate::repository::{CartRepository, OrderRepository, ProductRepository, ShopRepository};
use crate::{Result, StoreError};

/// PostgreSQL implementation of all four repositories.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            shop_id: ShopId::from_uuid(row.try_get::<Uuid, _>("shop_id")?),
            name: row.try_get("name")?,
            price: Money::new(row.try_get("price")?),
            stock: u32::try_from(row.try_get::<i32, _>("stock")?)
                .map_err(|_| StoreError::Corrupt("negative stock".to_string()))?,
            category: row.try_get("category")?,
        })
    }

    fn row_to_cart_item(row: &PgRow) -> Result<CartItem> {
        Ok(CartItem {
            id: CartItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            shop_id: ShopId::from_uuid(row.try_get::<Uuid, _>("shop_id")?),
            quantity: u32::try_from(row.try_get::<i32, _>("quantity")?)
                .map_err(|_| StoreError::Corrupt("negative cart quantity".to_string()))?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status_name: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_name)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown order status {status_name:?}")))?;

        let cancel_by = row
            .try_get::<Option<String>, _>("cancel_by")?
            .map(|name| {
                Party::parse(&name)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown party {name:?}")))
            })
            .transpose()?;

        let prior_status = row
            .try_get::<Option<String>, _>("prior_status")?
            .map(|name| {
                OrderStatus::parse(&name)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown order status {name:?}")))
            })
            .transpose()?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            buyer_id: UserId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            shop_id: ShopId::from_uuid(row.try_get::<Uuid, _>("shop_id")?),
            recipient: row.try_get("recipient")?,
            telephone: row.try_get("telephone")?,
            address: row.try_get("address")?,
            note: row.try_get("note")?,
            total_price: Money::new(row.try_get("total_price")?),
            proof_reference: row.try_get("proof_reference")?,
            status,
            cancel_by,
            prior_status,
            version: row.try_get("version")?,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: u32::try_from(row.try_get::<i32, _>("quantity")?)
                .map_err(|_| StoreError::Corrupt("negative order quantity".to_string()))?,
            unit_price: Money::new(row.try_get("unit_price")?),
        })
    }
}

#[async_trait]
impl ProductRepository for PostgresStore {
    async fn insert(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, shop_id, name, price, stock, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.shop_id.as_uuid())
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(i32::try_from(product.stock).unwrap_or(i32::MAX))
        .bind(&product.category)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn decrement_stock(&self, quantities: &[(ProductId, u32)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (product_id, quantity) in quantities {
            // Conditional update: the check and the write are one
            // statement, so a concurrent checkout cannot slip between
            // them and oversell.
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
            )
            .bind(product_id.as_uuid())
            .bind(i64::from(*quantity))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back every decrement
                // already applied in this batch.
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                        .bind(product_id.as_uuid())
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(if exists {
                    StoreError::InsufficientStock {
                        product_id: *product_id,
                    }
                } else {
                    StoreError::NotFound {
                        entity: "product",
                        id: product_id.to_string(),
                    }
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn restore_stock(&self, quantities: &[(ProductId, u32)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (product_id, quantity) in quantities {
            sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
                .bind(product_id.as_uuid())
                .bind(i64::from(*quantity))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ShopRepository for PostgresStore {
    async fn insert(&self, shop: Shop) -> Result<()> {
        sqlx::query("INSERT INTO shops (id, owner_id, name) VALUES ($1, $2, $3)")
            .bind(shop.id.as_uuid())
            .bind(shop.owner_id.as_uuid())
            .bind(&shop.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: ShopId) -> Result<Option<Shop>> {
        let row = sqlx::query("SELECT * FROM shops WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Shop {
                id,
                owner_id: UserId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }

    async fn list_owned_by(&self, owner_id: UserId) -> Result<Vec<Shop>> {
        let rows = sqlx::query("SELECT * FROM shops WHERE owner_id = $1 ORDER BY id")
            .bind(owner_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(Shop {
                    id: ShopId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    owner_id,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CartRepository for PostgresStore {
    async fn upsert_add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        shop_id: ShopId,
        quantity: u32,
    ) -> Result<CartItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, shop_id, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING *
            "#,
        )
        .bind(CartItemId::new().as_uuid())
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(shop_id.as_uuid())
        .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_cart_item(&row)
    }

    async fn get(&self, id: CartItemId) -> Result<Option<CartItem>> {
        let row = sqlx::query("SELECT * FROM cart_items WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_cart_item).transpose()
    }

    async fn get_many(&self, ids: &[CartItemId]) -> Result<Vec<CartItem>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query("SELECT * FROM cart_items WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_cart_item).collect()
    }

    async fn set_quantity(&self, id: CartItemId, quantity: u32) -> Result<()> {
        let result = sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "cart item",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: CartItemId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[CartItemId]) -> Result<()> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
            .bind(&uuids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY shop_id, product_id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_cart_item).collect()
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn create(&self, order: Order, items: Vec<OrderItem>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let insert = sqlx::query(
            r#"
            INSERT INTO orders (
                id, buyer_id, shop_id, recipient, telephone, address, note,
                total_price, proof_reference, status, cancel_by, prior_status,
                version, idempotency_key, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.buyer_id.as_uuid())
        .bind(order.shop_id.as_uuid())
        .bind(&order.recipient)
        .bind(&order.telephone)
        .bind(&order.address)
        .bind(&order.note)
        .bind(order.total_price.amount())
        .bind(&order.proof_reference)
        .bind(order.status.as_str())
        .bind(order.cancel_by.map(|p| p.as_str()))
        .bind(order.prior_status.map(|s| s.as_str()))
        .bind(order.version)
        .bind(&order.idempotency_key)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &insert
            && db_err.is_unique_violation()
        {
            return Err(StoreError::DuplicateIdempotencyKey {
                buyer_id: order.buyer_id,
                key: order.idempotency_key,
            });
        }
        insert?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
            .bind(item.unit_price.amount())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query("SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_id")
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_order_item).collect()
    }

    async fn find_by_idempotency_key(
        &self,
        buyer_id: UserId,
        key: &str,
    ) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE buyer_id = $1 AND idempotency_key = $2")
            .bind(buyer_id.as_uuid())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn list_active_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE buyer_id = $1 AND status NOT IN ('Delivered', 'Cancelled')
            ORDER BY created_at DESC
            "#,
        )
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn list_history_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE buyer_id = $1 AND status IN ('Delivered', 'Cancelled')
            ORDER BY created_at DESC
            "#,
        )
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn list_active_for_shops(&self, shop_ids: &[ShopId]) -> Result<Vec<Order>> {
        let uuids: Vec<Uuid> = shop_ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE shop_id = ANY($1) AND status NOT IN ('Delivered', 'Cancelled')
            ORDER BY created_at DESC
            "#,
        )
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected_version: i64,
        patch: StatusPatch,
    ) -> Result<Order> {
        // The version check and the write are one statement; a racing
        // writer sees zero rows affected instead of overwriting.
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, cancel_by = $3, prior_status = $4, version = version + 1
            WHERE id = $1 AND version = $5
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(patch.status.as_str())
        .bind(patch.cancel_by.map(|p| p.as_str()))
        .bind(patch.prior_status.map(|s| s.as_str()))
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(&row),
            None => {
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                        .bind(id.as_uuid())
                        .fetch_optional(&self.pool)
                        .await?;
                match actual {
                    Some(actual) => Err(StoreError::Conflict {
                        order_id: id,
                        expected: expected_version,
                        actual,
                    }),
                    None => Err(StoreError::NotFound {
                        entity: "order",
                        id: id.to_string(),
                    }),
                }
            }
        }
    }
}
