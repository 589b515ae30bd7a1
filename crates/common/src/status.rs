//! Order lifecycle state and the two-party relation.

use serde::{Deserialize, Serialize};

/// The lifecycle state of an order.
///
/// State transitions:
/// ```text
/// AwaitingPayment ──► Prepared ──► Shipped ──► Delivered
///        │                │           │
///        └────────────────┴───────────┴──► CancelPending ──► Cancelled
///        │                                       │    (deny restores the
///        └──(payment rejected)──► Cancelled ◄────┘     remembered state)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Waiting for the seller to review the payment proof.
    #[default]
    AwaitingPayment,

    /// Payment accepted, the seller is preparing the shipment.
    Prepared,

    /// Shipment handed to the courier.
    Shipped,

    /// Shipment received by the buyer (terminal state).
    Delivered,

    /// A cancellation request is open and awaiting the other party.
    CancelPending,

    /// Order was cancelled and stock restored (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns true if a cancellation request may be opened in this state.
    pub fn can_request_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::AwaitingPayment | OrderStatus::Prepared | OrderStatus::Shipped
        )
    }

    /// Returns the state name as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "AwaitingPayment",
            OrderStatus::Prepared => "Prepared",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::CancelPending => "CancelPending",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a persisted state name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AwaitingPayment" => Some(OrderStatus::AwaitingPayment),
            "Prepared" => Some(OrderStatus::Prepared),
            "Shipped" => Some(OrderStatus::Shipped),
            "Delivered" => Some(OrderStatus::Delivered),
            "CancelPending" => Some(OrderStatus::CancelPending),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One side of the buyer/seller relation on an order.
///
/// The buyer is the user who placed the order; the seller is the owner of
/// the order's shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Buyer,
    Seller,
}

impl Party {
    /// Returns the opposite party.
    pub fn other(&self) -> Party {
        match self {
            Party::Buyer => Party::Seller,
            Party::Seller => Party::Buyer,
        }
    }

    /// Returns the party name as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Buyer => "buyer",
            Party::Seller => "seller",
        }
    }

    /// Parses a persisted party name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buyer" => Some(Party::Buyer),
            "seller" => Some(Party::Seller),
            _ => None,
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_awaiting_payment() {
        assert_eq!(OrderStatus::default(), OrderStatus::AwaitingPayment);
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::AwaitingPayment.is_terminal());
        assert!(!OrderStatus::Prepared.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(!OrderStatus::CancelPending.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn cancel_request_allowed_states() {
        assert!(OrderStatus::AwaitingPayment.can_request_cancel());
        assert!(OrderStatus::Prepared.can_request_cancel());
        assert!(OrderStatus::Shipped.can_request_cancel());
        assert!(!OrderStatus::CancelPending.can_request_cancel());
        assert!(!OrderStatus::Delivered.can_request_cancel());
        assert!(!OrderStatus::Cancelled.can_request_cancel());
    }

    #[test]
    fn status_name_roundtrip() {
        for status in [
            OrderStatus::AwaitingPayment,
            OrderStatus::Prepared,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::CancelPending,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("Draft"), None);
    }

    #[test]
    fn party_other_side() {
        assert_eq!(Party::Buyer.other(), Party::Seller);
        assert_eq!(Party::Seller.other(), Party::Buyer);
    }

    #[test]
    fn party_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Party::Buyer).unwrap(), "\"buyer\"");
        let p: Party = serde_json::from_str("\"seller\"").unwrap();
        assert_eq!(p, Party::Seller);
    }
}
