//! Order status state machine
//!
//! One allowed-edge table; every transition anywhere in the system
//! (request handlers, webhook reconciliation, scheduler sweeps) is
//! checked against it before the guarded write is attempted.

use shared::models::OrderStatus;

/// Is `from -> to` an allowed business transition?
///
/// Cancellation is reachable from every non-terminal status; the
/// forward chain moves one stage at a time; RETURNED exists only as the
/// post-sale edge out of DONE.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Cancelled)
            | (AwaitingPayment, Confirmed)
            | (AwaitingPayment, Cancelled)
            | (Confirmed, Packing)
            | (Confirmed, Cancelled)
            | (Packing, Shipping)
            | (Packing, Cancelled)
            | (Shipping, Delivering)
            | (Shipping, Cancelled)
            | (Delivering, Done)
            | (Delivering, Cancelled)
            | (Done, Returned)
    )
}

/// Customers may only cancel before staff has picked the order up.
pub fn customer_can_cancel(from: OrderStatus) -> bool {
    matches!(from, OrderStatus::Pending | OrderStatus::AwaitingPayment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::OrderStatus::*;

    const ALL: [OrderStatus; 9] = [
        Pending,
        AwaitingPayment,
        Confirmed,
        Packing,
        Shipping,
        Delivering,
        Done,
        Cancelled,
        Returned,
    ];

    #[test]
    fn forward_chain_is_allowed() {
        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(AwaitingPayment, Confirmed));
        assert!(can_transition(Confirmed, Packing));
        assert!(can_transition(Packing, Shipping));
        assert!(can_transition(Shipping, Delivering));
        assert!(can_transition(Delivering, Done));
        assert!(can_transition(Done, Returned));
    }

    #[test]
    fn no_stage_skipping() {
        assert!(!can_transition(Pending, Packing));
        assert!(!can_transition(Confirmed, Shipping));
        assert!(!can_transition(Packing, Done));
        assert!(!can_transition(AwaitingPayment, Packing));
    }

    #[test]
    fn terminal_statuses_are_closed() {
        // From CANCELLED and RETURNED nothing is allowed; from DONE only
        // the documented RETURNED edge.
        for to in ALL {
            assert!(!can_transition(Cancelled, to), "CANCELLED -> {to} must be rejected");
            assert!(!can_transition(Returned, to), "RETURNED -> {to} must be rejected");
            if to != Returned {
                assert!(!can_transition(Done, to), "DONE -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn returned_only_from_done() {
        for from in ALL {
            assert_eq!(can_transition(from, Returned), from == Done);
        }
    }

    #[test]
    fn no_self_loops() {
        for status in ALL {
            assert!(!can_transition(status, status));
        }
    }

    #[test]
    fn customer_cancel_window() {
        assert!(customer_can_cancel(Pending));
        assert!(customer_can_cancel(AwaitingPayment));
        assert!(!customer_can_cancel(Confirmed));
        assert!(!customer_can_cancel(Delivering));
    }
}
