use common::{OrderId, ProductId, UserId};
use thiserror::Error;

/// Errors that can occur in the repository layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A status write lost a race: the expected version did not match the
    /// stored version.
    #[error("conflict on order {order_id}: expected version {expected}, found {actual}")]
    Conflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    /// A stock decrement would have driven a product's stock negative.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// An order with the same (buyer, idempotency key) already exists.
    #[error("duplicate idempotency key {key:?} for buyer {buyer_id}")]
    DuplicateIdempotencyKey { buyer_id: UserId, key: String },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;
