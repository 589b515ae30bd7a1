//! Cart service: per-user cart contents grouped by shop.

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{CartItemId, Money, ProductId, ShopId, UserId};
use serde::Serialize;
use store::{CartItem, CartRepository, ProductRepository, ShopRepository, StoreError};
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product has no stock left to add.
    #[error("product {product_id} is out of stock")]
    OutOfStock { product_id: ProductId },

    /// The product does not exist.
    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// The cart item does not exist or belongs to another user.
    #[error("cart item not found: {cart_item_id}")]
    ItemNotFound { cart_item_id: CartItemId },

    /// Zero quantity on an add.
    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A repository error occurred.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One line of the cart view, priced from the live product.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// A user's cart items belonging to one shop; the unit of checkout.
#[derive(Debug, Clone, Serialize)]
pub struct ShopCart {
    pub shop_id: ShopId,
    pub shop_name: String,
    pub items: Vec<CartLine>,
    pub subtotal: Money,
}

/// The full cart of a user, grouped by shop.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub shops: Vec<ShopCart>,
    pub grand_total: Money,
}

/// Service for cart mutations and the grouped cart view.
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
    shops: Arc<dyn ShopRepository>,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        products: Arc<dyn ProductRepository>,
        shops: Arc<dyn ShopRepository>,
    ) -> Self {
        Self {
            carts,
            products,
            shops,
        }
    }

    /// Adds a product to the user's cart, incrementing the quantity in
    /// place when the product is already there.
    ///
    /// Fails with [`CartError::OutOfStock`] when the live stock is zero.
    /// A positive stock lower than the requested quantity is accepted
    /// here; the authoritative stock check happens at checkout.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or(CartError::ProductNotFound { product_id })?;

        if product.stock == 0 {
            return Err(CartError::OutOfStock { product_id });
        }

        Ok(self
            .carts
            .upsert_add(user_id, product_id, product.shop_id, quantity)
            .await?)
    }

    /// Sets the quantity of a cart item; a quantity below 1 removes it.
    ///
    /// Live stock is not re-validated here.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
        quantity: u32,
    ) -> Result<(), CartError> {
        let item = self
            .carts
            .get(cart_item_id)
            .await?
            .filter(|item| item.user_id == user_id)
            .ok_or(CartError::ItemNotFound { cart_item_id })?;

        if quantity < 1 {
            self.carts.delete(item.id).await?;
        } else {
            self.carts.set_quantity(item.id, quantity).await?;
        }
        Ok(())
    }

    /// Removes a cart item. Removing a missing item, or an item owned by
    /// another user, is a no-op success.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
    ) -> Result<(), CartError> {
        if let Some(item) = self.carts.get(cart_item_id).await?
            && item.user_id == user_id
        {
            self.carts.delete(cart_item_id).await?;
        }
        Ok(())
    }

    /// Computes the user's cart grouped by shop, with live prices.
    ///
    /// Recomputed on every call and never cached. Lines whose product
    /// has disappeared from the catalog are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn view(&self, user_id: UserId) -> Result<CartView, CartError> {
        let items = self.carts.list_for_user(user_id).await?;

        let mut by_shop: BTreeMap<ShopId, Vec<CartLine>> = BTreeMap::new();
        for item in items {
            let Some(product) = self.products.get(item.product_id).await? else {
                continue;
            };
            by_shop.entry(item.shop_id).or_default().push(CartLine {
                cart_item_id: item.id,
                product_id: item.product_id,
                product_name: product.name,
                quantity: item.quantity,
                unit_price: product.price,
                line_total: product.price.times(item.quantity),
            });
        }

        let mut shops = Vec::with_capacity(by_shop.len());
        let mut grand_total = Money::zero();
        for (shop_id, lines) in by_shop {
            let subtotal: Money = lines.iter().map(|line| line.line_total).sum();
            grand_total += subtotal;
            let shop_name = self
                .shops
                .get(shop_id)
                .await?
                .map(|shop| shop.name)
                .unwrap_or_default();
            shops.push(ShopCart {
                shop_id,
                shop_name,
                items: lines,
                subtotal,
            });
        }

        Ok(CartView { shops, grand_total })
    }
}

#[cfg(test)]
mod tests {
    use store::{MemoryStore, Product, Shop};

    use super::*;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: CartService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let service = CartService::new(store.clone(), store.clone(), store.clone());
        Fixture { store, service }
    }

    async fn seed_product(fx: &Fixture, price: i64, stock: u32) -> Product {
        let shop = Shop {
            id: ShopId::new(),
            owner_id: UserId::new(),
            name: "Kopi Senja".to_string(),
        };
        ShopRepository::insert(fx.store.as_ref(), shop.clone())
            .await
            .unwrap();
        let product = Product {
            id: ProductId::new(),
            shop_id: shop.id,
            name: "Arabica beans 1kg".to_string(),
            price: Money::new(price),
            stock,
            category: "coffee".to_string(),
        };
        ProductRepository::insert(fx.store.as_ref(), product.clone())
            .await
            .unwrap();
        product
    }

    #[tokio::test]
    async fn add_item_increments_existing_row() {
        let fx = fixture();
        let user_id = UserId::new();
        let product = seed_product(&fx, 100_000, 10).await;

        let first = fx.service.add_item(user_id, product.id, 1).await.unwrap();
        let second = fx.service.add_item(user_id, product.id, 2).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);
    }

    #[tokio::test]
    async fn add_item_out_of_stock_rejected() {
        let fx = fixture();
        let product = seed_product(&fx, 100_000, 0).await;

        let result = fx.service.add_item(UserId::new(), product.id, 1).await;
        assert!(matches!(result, Err(CartError::OutOfStock { .. })));
    }

    #[tokio::test]
    async fn add_unknown_product_rejected() {
        let fx = fixture();
        let result = fx.service.add_item(UserId::new(), ProductId::new(), 1).await;
        assert!(matches!(result, Err(CartError::ProductNotFound { .. })));
    }

    #[tokio::test]
    async fn update_quantity_below_one_removes() {
        let fx = fixture();
        let user_id = UserId::new();
        let product = seed_product(&fx, 100_000, 10).await;
        let item = fx.service.add_item(user_id, product.id, 2).await.unwrap();

        fx.service.update_quantity(user_id, item.id, 0).await.unwrap();

        let view = fx.service.view(user_id).await.unwrap();
        assert!(view.shops.is_empty());
    }

    #[tokio::test]
    async fn update_quantity_of_foreign_item_not_found() {
        let fx = fixture();
        let owner = UserId::new();
        let product = seed_product(&fx, 100_000, 10).await;
        let item = fx.service.add_item(owner, product.id, 1).await.unwrap();

        let intruder = UserId::new();
        let result = fx.service.update_quantity(intruder, item.id, 5).await;
        assert!(matches!(result, Err(CartError::ItemNotFound { .. })));
    }

    #[tokio::test]
    async fn remove_item_is_idempotent() {
        let fx = fixture();
        let user_id = UserId::new();
        fx.service
            .remove_item(user_id, CartItemId::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn view_groups_by_shop_and_totals() {
        let fx = fixture();
        let user_id = UserId::new();
        let a = seed_product(&fx, 100_000, 10).await;
        let b = seed_product(&fx, 50_000, 10).await;

        fx.service.add_item(user_id, a.id, 2).await.unwrap();
        fx.service.add_item(user_id, b.id, 1).await.unwrap();

        let view = fx.service.view(user_id).await.unwrap();
        assert_eq!(view.shops.len(), 2);
        assert_eq!(view.grand_total, Money::new(250_000));

        let shop_a = view
            .shops
            .iter()
            .find(|s| s.shop_id == a.shop_id)
            .unwrap();
        assert_eq!(shop_a.subtotal, Money::new(200_000));
        assert_eq!(shop_a.items.len(), 1);
        assert_eq!(shop_a.items[0].line_total, Money::new(200_000));
    }

    #[tokio::test]
    async fn view_skips_vanished_products() {
        let fx = fixture();
        let user_id = UserId::new();
        let product = seed_product(&fx, 100_000, 10).await;
        fx.service.add_item(user_id, product.id, 1).await.unwrap();

        // Simulate the product disappearing from the catalog: the cart
        // row survives but the view must not show a priceless line.
        let orphan_user = UserId::new();
        fx.store
            .upsert_add(orphan_user, ProductId::new(), ShopId::new(), 1)
            .await
            .unwrap();

        let view = fx.service.view(orphan_user).await.unwrap();
        assert!(view.shops.is_empty());
        assert_eq!(view.grand_total, Money::zero());
    }
}
