//! Checkout: materializes a one-shop cart selection into an order.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{CartItemId, Money, OrderId, OrderStatus, ProductId, ShopId, UserId};
use serde::Deserialize;
use store::{
    CartRepository, Order, OrderItem, OrderRepository, ProductRepository, StoreError,
};
use thiserror::Error;

/// Flat per-order delivery charge, independent of item count.
pub const DELIVERY_FEE: Money = Money::new(30_000);

/// Largest accepted payment-proof upload.
pub const MAX_PROOF_BYTES: u64 = 5 * 1024 * 1024;

const ACCEPTED_PROOF_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    /// The selection is empty, references unknown or foreign cart items,
    /// or spans more than one shop.
    #[error("no valid single-shop selection to check out")]
    EmptySelection,

    /// No payment proof was supplied.
    #[error("payment proof is required")]
    PaymentProofMissing,

    /// The payment proof is not an accepted image or is too large.
    #[error("invalid payment proof: {0}")]
    InvalidProof(String),

    /// A selected product no longer exists in the catalog.
    #[error("product no longer available: {product_id}")]
    ProductUnavailable { product_id: ProductId },

    /// Live stock cannot cover the selection.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// A repository error occurred.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The payment-confirmation image attached at checkout.
///
/// The bytes themselves are uploaded out of band; the service only sees
/// the stored asset reference plus the metadata it validates.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentProof {
    pub reference: String,
    pub content_type: String,
    pub size_bytes: u64,
}

impl PaymentProof {
    fn validate(&self) -> Result<(), CheckoutError> {
        if !ACCEPTED_PROOF_TYPES.contains(&self.content_type.as_str()) {
            return Err(CheckoutError::InvalidProof(format!(
                "unsupported media type {:?}",
                self.content_type
            )));
        }
        if self.size_bytes > MAX_PROOF_BYTES {
            return Err(CheckoutError::InvalidProof(format!(
                "{} bytes exceeds the {} byte limit",
                self.size_bytes, MAX_PROOF_BYTES
            )));
        }
        Ok(())
    }
}

/// Command to place an order from selected cart items.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// Shop declared by the client; cross-checked against the shop the
    /// selected items actually belong to.
    pub shop_id: Option<ShopId>,
    pub selected_items: Vec<CartItemId>,
    pub recipient: String,
    pub telephone: String,
    pub address: String,
    pub note: String,
    pub proof: Option<PaymentProof>,
    /// Required so a resubmitted request lands on the first order
    /// instead of materializing twice.
    pub idempotency_key: String,
}

/// Service that converts a cart selection into an immutable order.
pub struct CheckoutService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            carts,
            products,
            orders,
        }
    }

    /// Places an order for the buyer from the selected cart items.
    ///
    /// All-or-nothing: either the order exists with stock decremented
    /// and the consumed cart rows removed, or nothing changed. Replaying
    /// the same idempotency key returns the already-created order.
    #[tracing::instrument(skip(self, cmd), fields(buyer = %buyer_id))]
    pub async fn place_order(
        &self,
        buyer_id: UserId,
        cmd: PlaceOrder,
    ) -> Result<Order, CheckoutError> {
        let started = Instant::now();

        for (field, value) in [
            ("recipient", &cmd.recipient),
            ("telephone", &cmd.telephone),
            ("address", &cmd.address),
            ("idempotency_key", &cmd.idempotency_key),
        ] {
            if value.trim().is_empty() {
                return Err(CheckoutError::Validation(format!(
                    "{field} must not be blank"
                )));
            }
        }

        // Replay of an already-accepted submission.
        if let Some(existing) = self
            .orders
            .find_by_idempotency_key(buyer_id, &cmd.idempotency_key)
            .await?
        {
            tracing::info!(order_id = %existing.id, "idempotent replay of checkout");
            return Ok(existing);
        }

        let items = self.load_selection(buyer_id, &cmd).await?;

        let proof = cmd.proof.as_ref().ok_or(CheckoutError::PaymentProofMissing)?;
        proof.validate()?;

        // Snapshot prices and names from the live catalog. From here on
        // the order never reads the product price again.
        let order_id = OrderId::new();
        let mut order_items = Vec::with_capacity(items.len());
        let mut quantities = Vec::with_capacity(items.len());
        for item in &items {
            let product = self.products.get(item.product_id).await?.ok_or(
                CheckoutError::ProductUnavailable {
                    product_id: item.product_id,
                },
            )?;
            order_items.push(OrderItem {
                order_id,
                product_id: item.product_id,
                product_name: product.name,
                quantity: item.quantity,
                unit_price: product.price,
            });
            quantities.push((item.product_id, item.quantity));
        }

        let subtotal: Money = order_items.iter().map(OrderItem::line_total).sum();
        let order = Order {
            id: order_id,
            buyer_id,
            shop_id: items[0].shop_id,
            recipient: cmd.recipient,
            telephone: cmd.telephone,
            address: cmd.address,
            note: cmd.note,
            total_price: subtotal + DELIVERY_FEE,
            proof_reference: proof.reference.clone(),
            status: OrderStatus::AwaitingPayment,
            cancel_by: None,
            prior_status: None,
            version: 1,
            idempotency_key: cmd.idempotency_key.clone(),
            created_at: Utc::now(),
        };

        // Commit-time stock check and reservation, atomic per product
        // and all-or-nothing across the selection.
        match self.products.decrement_stock(&quantities).await {
            Ok(()) => {}
            Err(StoreError::InsufficientStock { product_id }) => {
                return Err(CheckoutError::InsufficientStock { product_id });
            }
            Err(StoreError::NotFound { id, .. }) => {
                let product_id = id
                    .parse()
                    .map_err(|_| StoreError::Corrupt(format!("bad product id {id:?}")))?;
                return Err(CheckoutError::ProductUnavailable { product_id });
            }
            Err(err) => return Err(err.into()),
        }

        match self.orders.create(order.clone(), order_items).await {
            Ok(()) => {}
            Err(StoreError::DuplicateIdempotencyKey { .. }) => {
                // Lost the replay race; give the reservation back and
                // hand out the order that won.
                self.products.restore_stock(&quantities).await?;
                let existing = self
                    .orders
                    .find_by_idempotency_key(buyer_id, &cmd.idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Corrupt("idempotency winner vanished".to_string())
                    })?;
                return Ok(existing);
            }
            Err(err) => {
                self.products.restore_stock(&quantities).await?;
                return Err(err.into());
            }
        }

        // Consumed items leave the cart only after the order exists.
        self.carts.delete_many(&cmd.selected_items).await?;

        metrics::counter!("orders_placed_total").increment(1);
        metrics::histogram!("checkout_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(order_id = %order.id, total = %order.total_price, "order placed");

        Ok(order)
    }

    /// Loads and validates the selection: every id must resolve to a
    /// cart row of this buyer, and all rows must share one shop.
    async fn load_selection(
        &self,
        buyer_id: UserId,
        cmd: &PlaceOrder,
    ) -> Result<Vec<store::CartItem>, CheckoutError> {
        if cmd.selected_items.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }

        let items = self.carts.get_many(&cmd.selected_items).await?;
        if items.len() != cmd.selected_items.len()
            || items.iter().any(|item| item.user_id != buyer_id)
        {
            return Err(CheckoutError::EmptySelection);
        }

        let shop_id = items[0].shop_id;
        if items.iter().any(|item| item.shop_id != shop_id) {
            return Err(CheckoutError::EmptySelection);
        }

        if let Some(declared) = cmd.shop_id
            && declared != shop_id
        {
            return Err(CheckoutError::Validation(
                "selected items do not belong to the declared shop".to_string(),
            ));
        }

        Ok(items)
    }
}
