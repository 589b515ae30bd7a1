//! Order lifecycle service.

use std::sync::Arc;

use common::{OrderId, OrderStatus, Party, UserId};
use store::{
    Order, OrderItem, OrderRepository, ProductRepository, ShopRepository, StoreError,
};

use super::transitions::{self, Transition};
use super::OrderError;

/// An order together with its snapshotted items.
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Service applying lifecycle transitions and serving order queries.
///
/// Every transition resolves the acting user to a [`Party`], runs the
/// pure transition rule, and writes the result with a compare-and-set on
/// the version it read. A racing writer loses with
/// [`StoreError::Conflict`]; nothing is retried server-side.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    shops: Arc<dyn ShopRepository>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        shops: Arc<dyn ShopRepository>,
    ) -> Self {
        Self {
            orders,
            products,
            shops,
        }
    }

    /// Full order detail, visible to the order's buyer and seller only.
    #[tracing::instrument(skip(self))]
    pub async fn detail(&self, user_id: UserId, order_id: OrderId) -> Result<OrderDetail, OrderError> {
        let order = self.load(order_id).await?;
        self.party_of(&order, user_id, "view order").await?;
        let items = self.orders.items(order_id).await?;
        Ok(OrderDetail { order, items })
    }

    /// The buyer's orders still in flight, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn active_for_buyer(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_active_for_buyer(user_id).await?)
    }

    /// The buyer's delivered and cancelled orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn history_for_buyer(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_history_for_buyer(user_id).await?)
    }

    /// Orders still in flight across the shops the user owns.
    #[tracing::instrument(skip(self))]
    pub async fn sales_for_seller(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        let shops = self.shops.list_owned_by(user_id).await?;
        if shops.is_empty() {
            return Ok(Vec::new());
        }
        let shop_ids: Vec<_> = shops.into_iter().map(|shop| shop.id).collect();
        Ok(self.orders.list_active_for_shops(&shop_ids).await?)
    }

    /// Opens a cancellation request as the acting user's party.
    ///
    /// When the caller declares which party it is acting as, the claim
    /// must match the derived party.
    #[tracing::instrument(skip(self))]
    pub async fn request_cancel(
        &self,
        user_id: UserId,
        order_id: OrderId,
        declared: Option<Party>,
    ) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        let party = self.party_of(&order, user_id, "request cancellation").await?;
        if let Some(declared) = declared
            && declared != party
        {
            return Err(OrderError::Forbidden {
                action: "request cancellation as the other party",
            });
        }
        let transition = transitions::request_cancel(&order, party)?;
        self.apply(order, transition).await
    }

    /// Accepts the pending cancellation as the counterparty.
    #[tracing::instrument(skip(self))]
    pub async fn approve_cancel(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        let party = self.party_of(&order, user_id, "approve cancellation").await?;
        let transition = transitions::approve_cancel(&order, party)?;
        self.apply(order, transition).await
    }

    /// Refuses the pending cancellation as the counterparty; the order
    /// resumes from the remembered state.
    #[tracing::instrument(skip(self))]
    pub async fn deny_cancel(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        let party = self.party_of(&order, user_id, "deny cancellation").await?;
        let transition = transitions::deny_cancel(&order, party)?;
        self.apply(order, transition).await
    }

    /// Seller-side payment review of an order awaiting payment.
    #[tracing::instrument(skip(self))]
    pub async fn decide_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
        accepted: bool,
    ) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        self.require_seller(&order, user_id, "decide payment").await?;
        let transition = transitions::decide_payment(&order, accepted)?;
        let updated = self.apply(order, transition).await?;
        metrics::counter!("payment_decisions_total").increment(1);
        Ok(updated)
    }

    /// Seller-side forward shipping advancement.
    #[tracing::instrument(skip(self))]
    pub async fn advance_shipping(
        &self,
        user_id: UserId,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        self.require_seller(&order, user_id, "advance shipping").await?;
        let transition = transitions::advance_shipping(&order, target)?;
        self.apply(order, transition).await
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Resolves the acting user against the order's two-party relation:
    /// the buyer placed it, the seller owns its shop.
    async fn party_of(
        &self,
        order: &Order,
        user_id: UserId,
        action: &'static str,
    ) -> Result<Party, OrderError> {
        if order.buyer_id == user_id {
            return Ok(Party::Buyer);
        }
        let shop = self
            .shops
            .get(order.shop_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "shop",
                id: order.shop_id.to_string(),
            })?;
        if shop.owner_id == user_id {
            return Ok(Party::Seller);
        }
        Err(OrderError::Forbidden { action })
    }

    async fn require_seller(
        &self,
        order: &Order,
        user_id: UserId,
        action: &'static str,
    ) -> Result<(), OrderError> {
        match self.party_of(order, user_id, action).await? {
            Party::Seller => Ok(()),
            Party::Buyer => Err(OrderError::Forbidden { action }),
        }
    }

    /// Writes the transition with a compare-and-set on the version read
    /// with the order, then restores stock when the transition asks for
    /// it.
    async fn apply(&self, order: Order, transition: Transition) -> Result<Order, OrderError> {
        let updated = self
            .orders
            .update_status(order.id, order.version, transition.patch)
            .await?;

        if transition.restock {
            let items = self.orders.items(order.id).await?;
            let quantities: Vec<_> = items
                .iter()
                .map(|item| (item.product_id, item.quantity))
                .collect();
            self.products.restore_stock(&quantities).await?;
            metrics::counter!("orders_cancelled_total").increment(1);
            tracing::info!(order_id = %order.id, "order cancelled, stock restored");
        }

        Ok(updated)
    }
}
