//! In-memory store for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CartItemId, OrderId, ProductId, ShopId, UserId};
use tokio::sync::RwLock;

use crate::records::{CartItem, Order, OrderItem, Product, Shop, StatusPatch};
use crate::repository::{CartRepository, OrderRepository, ProductRepository, ShopRepository};
use crate::{Result, StoreError};

#[derive(Default)]
struct OrdersState {
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<OrderItem>>,
    idempotency: HashMap<(UserId, String), OrderId>,
}

/// In-memory implementation of all four repositories.
///
/// Provides the same interface and atomicity guarantees as the
/// PostgreSQL implementation: batch stock updates are validated and
/// applied under one write lock, and status writes compare-and-set the
/// order version.
#[derive(Clone, Default)]
pub struct MemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    shops: Arc<RwLock<HashMap<ShopId, Shop>>>,
    cart: Arc<RwLock<HashMap<CartItemId, CartItem>>>,
    orders: Arc<RwLock<OrdersState>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cart rows across all users.
    pub async fn cart_row_count(&self) -> usize {
        self.cart.read().await.len()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.orders.len()
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn insert(&self, product: Product) -> Result<()> {
        self.products.write().await.insert(product.id, product);
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn decrement_stock(&self, quantities: &[(ProductId, u32)]) -> Result<()> {
        let mut products = self.products.write().await;

        // Validate the whole batch before touching anything.
        for (product_id, quantity) in quantities {
            let product = products
                .get(product_id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "product",
                    id: product_id.to_string(),
                })?;
            if product.stock < *quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: *product_id,
                });
            }
        }

        for (product_id, quantity) in quantities {
            if let Some(product) = products.get_mut(product_id) {
                product.stock -= quantity;
            }
        }

        Ok(())
    }

    async fn restore_stock(&self, quantities: &[(ProductId, u32)]) -> Result<()> {
        let mut products = self.products.write().await;
        for (product_id, quantity) in quantities {
            if let Some(product) = products.get_mut(product_id) {
                product.stock += quantity;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ShopRepository for MemoryStore {
    async fn insert(&self, shop: Shop) -> Result<()> {
        self.shops.write().await.insert(shop.id, shop);
        Ok(())
    }

    async fn get(&self, id: ShopId) -> Result<Option<Shop>> {
        Ok(self.shops.read().await.get(&id).cloned())
    }

    async fn list_owned_by(&self, owner_id: UserId) -> Result<Vec<Shop>> {
        let shops = self.shops.read().await;
        let mut owned: Vec<Shop> = shops
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|s| s.id);
        Ok(owned)
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn upsert_add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        shop_id: ShopId,
        quantity: u32,
    ) -> Result<CartItem> {
        let mut cart = self.cart.write().await;

        if let Some(existing) = cart
            .values_mut()
            .find(|item| item.user_id == user_id && item.product_id == product_id)
        {
            existing.quantity += quantity;
            return Ok(existing.clone());
        }

        let item = CartItem {
            id: CartItemId::new(),
            user_id,
            product_id,
            shop_id,
            quantity,
        };
        cart.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: CartItemId) -> Result<Option<CartItem>> {
        Ok(self.cart.read().await.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[CartItemId]) -> Result<Vec<CartItem>> {
        let cart = self.cart.read().await;
        Ok(ids.iter().filter_map(|id| cart.get(id).cloned()).collect())
    }

    async fn set_quantity(&self, id: CartItemId, quantity: u32) -> Result<()> {
        let mut cart = self.cart.write().await;
        let item = cart.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "cart item",
            id: id.to_string(),
        })?;
        item.quantity = quantity;
        Ok(())
    }

    async fn delete(&self, id: CartItemId) -> Result<()> {
        self.cart.write().await.remove(&id);
        Ok(())
    }

    async fn delete_many(&self, ids: &[CartItemId]) -> Result<()> {
        let mut cart = self.cart.write().await;
        for id in ids {
            cart.remove(id);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let cart = self.cart.read().await;
        let mut items: Vec<CartItem> = cart
            .values()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.shop_id, item.product_id));
        Ok(items)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create(&self, order: Order, items: Vec<OrderItem>) -> Result<()> {
        let mut state = self.orders.write().await;

        let key = (order.buyer_id, order.idempotency_key.clone());
        if state.idempotency.contains_key(&key) {
            return Err(StoreError::DuplicateIdempotencyKey {
                buyer_id: order.buyer_id,
                key: order.idempotency_key,
            });
        }

        state.idempotency.insert(key, order.id);
        state.items.insert(order.id, items);
        state.orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.orders.get(&id).cloned())
    }

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .orders
            .read()
            .await
            .items
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_by_idempotency_key(
        &self,
        buyer_id: UserId,
        key: &str,
    ) -> Result<Option<Order>> {
        let state = self.orders.read().await;
        Ok(state
            .idempotency
            .get(&(buyer_id, key.to_string()))
            .and_then(|order_id| state.orders.get(order_id))
            .cloned())
    }

    async fn list_active_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>> {
        let state = self.orders.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.buyer_id == buyer_id && o.is_active())
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_history_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>> {
        let state = self.orders.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.buyer_id == buyer_id && !o.is_active())
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_active_for_shops(&self, shop_ids: &[ShopId]) -> Result<Vec<Order>> {
        let state = self.orders.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| shop_ids.contains(&o.shop_id) && o.is_active())
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected_version: i64,
        patch: StatusPatch,
    ) -> Result<Order> {
        let mut state = self.orders.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: id.to_string(),
            })?;

        if order.version != expected_version {
            return Err(StoreError::Conflict {
                order_id: id,
                expected: expected_version,
                actual: order.version,
            });
        }

        order.status = patch.status;
        order.cancel_by = patch.cancel_by;
        order.prior_status = patch.prior_status;
        order.version += 1;
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{Money, OrderStatus, Party};

    use super::*;

    fn sample_product(shop_id: ShopId, stock: u32) -> Product {
        Product {
            id: ProductId::new(),
            shop_id,
            name: "Robusta beans 500g".to_string(),
            price: Money::new(55_000),
            stock,
            category: "coffee".to_string(),
        }
    }

    fn sample_order(buyer_id: UserId, shop_id: ShopId, key: &str) -> Order {
        Order {
            id: OrderId::new(),
            buyer_id,
            shop_id,
            recipient: "Rina".to_string(),
            telephone: "0812".to_string(),
            address: "Jl. Merdeka 1".to_string(),
            note: String::new(),
            total_price: Money::new(85_000),
            proof_reference: "proof/1.jpg".to_string(),
            status: OrderStatus::AwaitingPayment,
            cancel_by: None,
            prior_status: None,
            version: 1,
            idempotency_key: key.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn decrement_stock_is_all_or_nothing() {
        let store = MemoryStore::new();
        let shop_id = ShopId::new();
        let a = sample_product(shop_id, 5);
        let b = sample_product(shop_id, 1);
        ProductRepository::insert(&store, a.clone()).await.unwrap();
        ProductRepository::insert(&store, b.clone()).await.unwrap();

        let result = store.decrement_stock(&[(a.id, 2), (b.id, 3)]).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock { product_id }) if product_id == b.id
        ));

        // The first product's stock must be untouched.
        let a_after = ProductRepository::get(&store, a.id).await.unwrap().unwrap();
        assert_eq!(a_after.stock, 5);
    }

    #[tokio::test]
    async fn restore_stock_is_additive() {
        let store = MemoryStore::new();
        let product = sample_product(ShopId::new(), 5);
        ProductRepository::insert(&store, product.clone())
            .await
            .unwrap();

        store.decrement_stock(&[(product.id, 3)]).await.unwrap();
        store.restore_stock(&[(product.id, 3)]).await.unwrap();

        let after = ProductRepository::get(&store, product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.stock, 5);
    }

    #[tokio::test]
    async fn cart_add_increments_in_place() {
        let store = MemoryStore::new();
        let user_id = UserId::new();
        let product_id = ProductId::new();
        let shop_id = ShopId::new();

        let first = store
            .upsert_add(user_id, product_id, shop_id, 1)
            .await
            .unwrap();
        let second = store
            .upsert_add(user_id, product_id, shop_id, 2)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);
        assert_eq!(store.cart_row_count().await, 1);
    }

    #[tokio::test]
    async fn cart_delete_is_idempotent() {
        let store = MemoryStore::new();
        let id = CartItemId::new();
        store.delete(id).await.unwrap();
        store.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn update_status_compare_and_set() {
        let store = MemoryStore::new();
        let order = sample_order(UserId::new(), ShopId::new(), "k-1");
        let order_id = order.id;
        store.create(order, vec![]).await.unwrap();

        let patch = StatusPatch {
            status: OrderStatus::Prepared,
            cancel_by: None,
            prior_status: None,
        };
        let updated = store.update_status(order_id, 1, patch).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Prepared);
        assert_eq!(updated.version, 2);

        // A second writer holding the stale version loses the race.
        let stale = StatusPatch {
            status: OrderStatus::CancelPending,
            cancel_by: Some(Party::Buyer),
            prior_status: Some(OrderStatus::Prepared),
        };
        let result = store.update_status(order_id, 1, stale).await;
        assert!(matches!(
            result,
            Err(StoreError::Conflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_rejected() {
        let store = MemoryStore::new();
        let buyer_id = UserId::new();
        let shop_id = ShopId::new();

        store
            .create(sample_order(buyer_id, shop_id, "k-1"), vec![])
            .await
            .unwrap();
        let result = store
            .create(sample_order(buyer_id, shop_id, "k-1"), vec![])
            .await;

        assert!(matches!(
            result,
            Err(StoreError::DuplicateIdempotencyKey { .. })
        ));

        // A different buyer may reuse the same key.
        store
            .create(sample_order(UserId::new(), shop_id, "k-1"), vec![])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn buyer_lists_split_active_and_history() {
        let store = MemoryStore::new();
        let buyer_id = UserId::new();
        let shop_id = ShopId::new();

        let active = sample_order(buyer_id, shop_id, "k-1");
        let mut done = sample_order(buyer_id, shop_id, "k-2");
        done.status = OrderStatus::Delivered;

        store.create(active.clone(), vec![]).await.unwrap();
        store.create(done.clone(), vec![]).await.unwrap();

        let current = store.list_active_for_buyer(buyer_id).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, active.id);

        let history = store.list_history_for_buyer(buyer_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, done.id);
    }

    #[tokio::test]
    async fn idempotency_lookup_returns_order() {
        let store = MemoryStore::new();
        let buyer_id = UserId::new();
        let order = sample_order(buyer_id, ShopId::new(), "k-9");
        let order_id = order.id;
        store.create(order, vec![]).await.unwrap();

        let found = store
            .find_by_idempotency_key(buyer_id, "k-9")
            .await
            .unwrap();
        assert_eq!(found.map(|o| o.id), Some(order_id));

        let missing = store
            .find_by_idempotency_key(buyer_id, "other")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
