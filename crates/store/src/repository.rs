//! Repository traits.
//!
//! The domain services are written against these traits and receive an
//! implementation at construction time; nothing in the domain layer
//! touches a backend directly.

use async_trait::async_trait;
use common::{CartItemId, OrderId, ProductId, ShopId, UserId};

use crate::records::{CartItem, Order, OrderItem, Product, Shop, StatusPatch};
use crate::Result;

/// Inventory counters and product lookups.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert(&self, product: Product) -> Result<()>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>>;

    /// Decrements stock for every listed product, all-or-nothing.
    ///
    /// Each decrement applies only if the product's stock covers the
    /// requested quantity at the moment of the update; on the first
    /// product that cannot cover its quantity the whole batch fails with
    /// [`StoreError::InsufficientStock`](crate::StoreError::InsufficientStock)
    /// and no stock is changed.
    async fn decrement_stock(&self, quantities: &[(ProductId, u32)]) -> Result<()>;

    /// Adds the listed quantities back onto stock.
    ///
    /// Restoration is additive, never a reset to an earlier observed
    /// value.
    async fn restore_stock(&self, quantities: &[(ProductId, u32)]) -> Result<()>;
}

/// Shop lookups, used to resolve the seller side of an order.
#[async_trait]
pub trait ShopRepository: Send + Sync {
    async fn insert(&self, shop: Shop) -> Result<()>;

    async fn get(&self, id: ShopId) -> Result<Option<Shop>>;

    /// Shops owned by the given user.
    async fn list_owned_by(&self, owner_id: UserId) -> Result<Vec<Shop>>;
}

/// Per-user cart contents.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Adds `quantity` of a product to the user's cart.
    ///
    /// Creates the row on first add and increments the quantity in place
    /// on subsequent adds, so a (user, product) pair never has two rows.
    async fn upsert_add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        shop_id: ShopId,
        quantity: u32,
    ) -> Result<CartItem>;

    async fn get(&self, id: CartItemId) -> Result<Option<CartItem>>;

    /// Fetches the listed rows; missing ids are simply absent from the
    /// result.
    async fn get_many(&self, ids: &[CartItemId]) -> Result<Vec<CartItem>>;

    /// Sets the quantity of an existing row.
    async fn set_quantity(&self, id: CartItemId, quantity: u32) -> Result<()>;

    /// Deletes a row; deleting a missing id is a no-op.
    async fn delete(&self, id: CartItemId) -> Result<()>;

    /// Deletes the listed rows; missing ids are skipped.
    async fn delete_many(&self, ids: &[CartItemId]) -> Result<()>;

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<CartItem>>;
}

/// Order headers, items, and the status compare-and-set.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order with its items.
    ///
    /// Fails with
    /// [`StoreError::DuplicateIdempotencyKey`](crate::StoreError::DuplicateIdempotencyKey)
    /// when the buyer already has an order under the same key.
    async fn create(&self, order: Order, items: Vec<OrderItem>) -> Result<()>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>>;

    async fn find_by_idempotency_key(&self, buyer_id: UserId, key: &str)
        -> Result<Option<Order>>;

    /// The buyer's non-terminal orders, newest first.
    async fn list_active_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>>;

    /// The buyer's terminal (delivered or cancelled) orders, newest first.
    async fn list_history_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>>;

    /// Non-terminal orders across the given shops, newest first.
    async fn list_active_for_shops(&self, shop_ids: &[ShopId]) -> Result<Vec<Order>>;

    /// Applies a status patch if and only if the stored version still
    /// equals `expected_version`, bumping the version by one.
    ///
    /// A mismatch fails with
    /// [`StoreError::Conflict`](crate::StoreError::Conflict) and leaves
    /// the order untouched; the caller decides whether to re-read and
    /// retry.
    async fn update_status(
        &self,
        id: OrderId,
        expected_version: i64,
        patch: StatusPatch,
    ) -> Result<Order>;
}
