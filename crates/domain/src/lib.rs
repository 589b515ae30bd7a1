//! Domain services for the marketplace order lifecycle.
//!
//! This crate owns the business rules on top of the repository layer:
//! - [`CartService`] — per-user cart contents grouped by shop
//! - [`CheckoutService`] — materializes a one-shop cart selection into an
//!   immutable order, snapshotting prices and reserving stock
//! - [`OrderService`] — the order state machine: payment decision,
//!   shipping advancement, and the buyer/seller cancellation negotiation
//!
//! Services are handed repository implementations at construction time
//! and hold no state of their own.

pub mod cart;
pub mod checkout;
pub mod order;

pub use cart::{CartError, CartLine, CartService, CartView, ShopCart};
pub use checkout::{
    CheckoutError, CheckoutService, PaymentProof, PlaceOrder, DELIVERY_FEE, MAX_PROOF_BYTES,
};
pub use order::{OrderDetail, OrderError, OrderService};
