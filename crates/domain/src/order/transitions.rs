//! Pure transition rules for the order state machine.
//!
//! Each rule inspects an order and produces the [`StatusPatch`] to write
//! plus whether stock must be restored. Writing the patch (and detecting
//! races) is the service's job.

use common::{OrderStatus, Party};
use store::{Order, StatusPatch};

use super::OrderError;

/// The outcome of a transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub patch: StatusPatch,
    /// True when the order items' quantities must be added back onto
    /// product stock.
    pub restock: bool,
}

fn invalid(order: &Order, action: &'static str) -> OrderError {
    OrderError::InvalidStateTransition {
        current: order.status,
        action,
    }
}

/// Seller reviews the payment proof: accept moves the order into
/// preparation, reject cancels it outright and releases the stock.
pub fn decide_payment(order: &Order, accepted: bool) -> Result<Transition, OrderError> {
    if order.status != OrderStatus::AwaitingPayment {
        return Err(invalid(order, "decide payment"));
    }

    Ok(if accepted {
        Transition {
            patch: StatusPatch {
                status: OrderStatus::Prepared,
                cancel_by: None,
                prior_status: None,
            },
            restock: false,
        }
    } else {
        Transition {
            patch: StatusPatch {
                status: OrderStatus::Cancelled,
                cancel_by: None,
                prior_status: None,
            },
            restock: true,
        }
    })
}

/// Seller moves the shipment forward one step:
/// `Prepared -> Shipped -> Delivered`.
pub fn advance_shipping(order: &Order, target: OrderStatus) -> Result<Transition, OrderError> {
    let valid = matches!(
        (order.status, target),
        (OrderStatus::Prepared, OrderStatus::Shipped)
            | (OrderStatus::Shipped, OrderStatus::Delivered)
    );
    if !valid {
        return Err(invalid(order, "advance shipping"));
    }

    Ok(Transition {
        patch: StatusPatch {
            status: target,
            cancel_by: None,
            prior_status: None,
        },
        restock: false,
    })
}

/// Either party opens a cancellation request; the current state is
/// remembered so a denial can restore it.
pub fn request_cancel(order: &Order, by: Party) -> Result<Transition, OrderError> {
    if !order.status.can_request_cancel() {
        return Err(invalid(order, "request cancellation"));
    }

    Ok(Transition {
        patch: StatusPatch {
            status: OrderStatus::CancelPending,
            cancel_by: Some(by),
            prior_status: Some(order.status),
        },
        restock: false,
    })
}

/// The counterparty accepts the pending cancellation; the order ends and
/// the stock goes back.
pub fn approve_cancel(order: &Order, actor: Party) -> Result<Transition, OrderError> {
    let requested_by = pending_request(order, "approve cancellation")?;
    if actor == requested_by {
        return Err(OrderError::Forbidden {
            action: "approve own cancellation request",
        });
    }

    Ok(Transition {
        patch: StatusPatch {
            status: OrderStatus::Cancelled,
            // Keep the initiator on record.
            cancel_by: Some(requested_by),
            prior_status: None,
        },
        restock: true,
    })
}

/// The counterparty refuses the pending cancellation; the order resumes
/// from the remembered state.
pub fn deny_cancel(order: &Order, actor: Party) -> Result<Transition, OrderError> {
    let requested_by = pending_request(order, "deny cancellation")?;
    if actor == requested_by {
        return Err(OrderError::Forbidden {
            action: "deny own cancellation request",
        });
    }

    let prior = order
        .prior_status
        .ok_or_else(|| invalid(order, "deny cancellation"))?;

    Ok(Transition {
        patch: StatusPatch {
            status: prior,
            cancel_by: None,
            prior_status: None,
        },
        restock: false,
    })
}

fn pending_request(order: &Order, action: &'static str) -> Result<Party, OrderError> {
    if order.status != OrderStatus::CancelPending {
        return Err(invalid(order, action));
    }
    order.cancel_by.ok_or_else(|| invalid(order, action))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{Money, OrderId, ShopId, UserId};

    use super::*;

    fn order_in(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(),
            buyer_id: UserId::new(),
            shop_id: ShopId::new(),
            recipient: "Rina".to_string(),
            telephone: "0812".to_string(),
            address: "Jl. Merdeka 1".to_string(),
            note: String::new(),
            total_price: Money::new(130_000),
            proof_reference: "proof/1.jpg".to_string(),
            status,
            cancel_by: None,
            prior_status: None,
            version: 1,
            idempotency_key: "k-1".to_string(),
            created_at: Utc::now(),
        }
    }

    fn pending_from(status: OrderStatus, by: Party) -> Order {
        let mut order = order_in(OrderStatus::CancelPending);
        order.cancel_by = Some(by);
        order.prior_status = Some(status);
        order
    }

    #[test]
    fn payment_accepted_prepares_order() {
        let t = decide_payment(&order_in(OrderStatus::AwaitingPayment), true).unwrap();
        assert_eq!(t.patch.status, OrderStatus::Prepared);
        assert!(!t.restock);
    }

    #[test]
    fn payment_rejected_cancels_and_restocks() {
        let t = decide_payment(&order_in(OrderStatus::AwaitingPayment), false).unwrap();
        assert_eq!(t.patch.status, OrderStatus::Cancelled);
        assert!(t.restock);
    }

    #[test]
    fn payment_decision_only_while_awaiting() {
        for status in [
            OrderStatus::Prepared,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::CancelPending,
            OrderStatus::Cancelled,
        ] {
            let result = decide_payment(&order_in(status), true);
            assert!(matches!(
                result,
                Err(OrderError::InvalidStateTransition { .. })
            ));
        }
    }

    #[test]
    fn shipping_advances_one_step_at_a_time() {
        let t = advance_shipping(&order_in(OrderStatus::Prepared), OrderStatus::Shipped).unwrap();
        assert_eq!(t.patch.status, OrderStatus::Shipped);

        let t = advance_shipping(&order_in(OrderStatus::Shipped), OrderStatus::Delivered).unwrap();
        assert_eq!(t.patch.status, OrderStatus::Delivered);

        // No skipping and no advancing while a cancellation is pending.
        assert!(advance_shipping(&order_in(OrderStatus::Prepared), OrderStatus::Delivered).is_err());
        assert!(advance_shipping(
            &pending_from(OrderStatus::Prepared, Party::Buyer),
            OrderStatus::Shipped
        )
        .is_err());
        assert!(advance_shipping(&order_in(OrderStatus::AwaitingPayment), OrderStatus::Shipped)
            .is_err());
    }

    #[test]
    fn cancel_request_remembers_prior_state() {
        for status in [
            OrderStatus::AwaitingPayment,
            OrderStatus::Prepared,
            OrderStatus::Shipped,
        ] {
            let t = request_cancel(&order_in(status), Party::Buyer).unwrap();
            assert_eq!(t.patch.status, OrderStatus::CancelPending);
            assert_eq!(t.patch.cancel_by, Some(Party::Buyer));
            assert_eq!(t.patch.prior_status, Some(status));
            assert!(!t.restock);
        }
    }

    #[test]
    fn overlapping_cancel_requests_rejected() {
        let order = pending_from(OrderStatus::Shipped, Party::Buyer);
        let result = request_cancel(&order, Party::Seller);
        assert!(matches!(
            result,
            Err(OrderError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn cancel_request_rejected_in_terminal_states() {
        for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let result = request_cancel(&order_in(status), Party::Buyer);
            assert!(matches!(
                result,
                Err(OrderError::InvalidStateTransition { .. })
            ));
        }
    }

    #[test]
    fn approval_by_counterparty_cancels_and_restocks() {
        let order = pending_from(OrderStatus::Shipped, Party::Buyer);
        let t = approve_cancel(&order, Party::Seller).unwrap();
        assert_eq!(t.patch.status, OrderStatus::Cancelled);
        assert_eq!(t.patch.cancel_by, Some(Party::Buyer));
        assert!(t.restock);
    }

    #[test]
    fn self_approval_forbidden() {
        let order = pending_from(OrderStatus::Shipped, Party::Buyer);
        let result = approve_cancel(&order, Party::Buyer);
        assert!(matches!(result, Err(OrderError::Forbidden { .. })));
    }

    #[test]
    fn denial_restores_remembered_state() {
        let order = pending_from(OrderStatus::Prepared, Party::Seller);
        let t = deny_cancel(&order, Party::Buyer).unwrap();
        assert_eq!(t.patch.status, OrderStatus::Prepared);
        assert_eq!(t.patch.cancel_by, None);
        assert_eq!(t.patch.prior_status, None);
        assert!(!t.restock);
    }

    #[test]
    fn self_denial_forbidden() {
        let order = pending_from(OrderStatus::Prepared, Party::Seller);
        let result = deny_cancel(&order, Party::Seller);
        assert!(matches!(result, Err(OrderError::Forbidden { .. })));
    }

    #[test]
    fn approval_outside_pending_rejected() {
        let result = approve_cancel(&order_in(OrderStatus::Shipped), Party::Seller);
        assert!(matches!(
            result,
            Err(OrderError::InvalidStateTransition { .. })
        ));
    }
}
