//! Order lifecycle: state machine, cancellation negotiation, payment
//! decision, and shipping advancement.

mod service;
mod transitions;

pub use service::{OrderDetail, OrderService};
pub use transitions::Transition;

use common::OrderStatus;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during order lifecycle operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order does not exist.
    #[error("order not found")]
    NotFound,

    /// The requested action is not valid from the order's current state.
    #[error("cannot {action} from {current} state")]
    InvalidStateTransition {
        current: OrderStatus,
        action: &'static str,
    },

    /// The acting user is not allowed to perform this action.
    #[error("{action} is not allowed for this user")]
    Forbidden { action: &'static str },

    /// A repository error occurred. A lost status race surfaces here as
    /// [`StoreError::Conflict`].
    #[error(transparent)]
    Store(#[from] StoreError),
}
