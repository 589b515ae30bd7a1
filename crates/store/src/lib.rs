//! Repository layer for the marketplace order service.
//!
//! Record shapes and repository traits for products, shops, carts, and
//! orders, with two interchangeable backends:
//! - [`MemoryStore`] for tests and local development
//! - [`PostgresStore`] for production
//!
//! Both backends give the same atomicity guarantees: stock decrements are
//! all-or-nothing per order and conditional per product, and order status
//! writes are compare-and-set on the order's version.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use records::{CartItem, Order, OrderItem, Product, Shop, StatusPatch};
pub use repository::{CartRepository, OrderRepository, ProductRepository, ShopRepository};
