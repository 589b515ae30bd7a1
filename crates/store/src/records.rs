//! Persisted record shapes.

use chrono::{DateTime, Utc};
use common::{CartItemId, Money, OrderId, OrderStatus, Party, ProductId, ShopId, UserId};
use serde::{Deserialize, Serialize};

/// A sellable product owned by a shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub name: String,
    pub price: Money,
    /// Units on hand; never negative.
    pub stock: u32,
    pub category: String,
}

/// A shop and its owning user.
///
/// The owner is the seller side of every order placed against the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub owner_id: UserId,
    pub name: String,
}

/// One row of a user's cart.
///
/// Unique per (user, product); repeated adds increment `quantity` in
/// place. A row never stores quantity zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Denormalized from the product so checkout can group by shop
    /// without a join.
    pub shop_id: ShopId,
    pub quantity: u32,
}

/// An order header.
///
/// Everything except `status`, `cancel_by`, `prior_status`, and `version`
/// is immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub shop_id: ShopId,
    pub recipient: String,
    pub telephone: String,
    pub address: String,
    pub note: String,
    /// Item subtotal plus the flat delivery fee, fixed at creation.
    pub total_price: Money,
    /// Reference to the uploaded payment-proof asset.
    pub proof_reference: String,
    pub status: OrderStatus,
    /// Which party opened the currently pending cancellation request.
    pub cancel_by: Option<Party>,
    /// The state to restore when a pending cancellation is denied.
    pub prior_status: Option<OrderStatus>,
    /// Optimistic-concurrency counter, bumped on every status write.
    pub version: i64,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Returns true while the order still needs buyer or seller action.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// One line of an order, with the unit price snapshotted at creation.
///
/// The snapshot is never recomputed from the live product price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    /// Returns the line total (quantity x snapshotted unit price).
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// The mutable slice of an order written by a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPatch {
    pub status: OrderStatus,
    pub cancel_by: Option<Party>,
    pub prior_status: Option<OrderStatus>,
}
