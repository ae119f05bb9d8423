//! Order, payment, and sponsorship unit status machines.

use std::str::FromStr;

use nature_marketplace_api::services::ecosystem::{Fulfilment, UnclaimedUnit};
use nature_marketplace_api::services::orders::PaymentArrival;
use nature_marketplace_api::services::webhook::{records_failure, settles};
use nature_marketplace_core::{OrderStatus, PaymentStatus, UnitStatus};
use rust_decimal::Decimal;

#[test]
fn happy_path_reaches_fulfilled() {
    let status = OrderStatus::Pending
        .transition(OrderStatus::Paid)
        .and_then(|s| s.transition(OrderStatus::Processing))
        .and_then(|s| s.transition(OrderStatus::Fulfilled));

    assert_eq!(status, Ok(OrderStatus::Fulfilled));
}

#[test]
fn terminal_statuses_go_nowhere() {
    for &next in OrderStatus::ALL {
        assert!(!OrderStatus::Cancelled.can_transition_to(next));
        assert!(!OrderStatus::Refunded.can_transition_to(next));
    }
}

#[test]
fn no_status_transitions_to_itself() {
    for &status in OrderStatus::ALL {
        assert!(!status.can_transition_to(status), "{status} -> {status}");
    }
}

#[test]
fn pending_cannot_skip_payment() {
    let err = OrderStatus::Pending
        .transition(OrderStatus::Fulfilled)
        .unwrap_err();

    assert_eq!(err.from, OrderStatus::Pending);
    assert_eq!(err.to, OrderStatus::Fulfilled);
    assert_eq!(err.to_string(), "cannot move order from Pending to Fulfilled");
}

#[test]
fn only_unshipped_orders_can_be_cancelled() {
    let cancellable: Vec<_> = OrderStatus::ALL
        .iter()
        .copied()
        .filter(|status| status.can_cancel())
        .collect();

    assert_eq!(cancellable, [OrderStatus::Pending, OrderStatus::Paid]);
    for status in cancellable {
        assert!(status.can_transition_to(OrderStatus::Cancelled));
    }
}

#[test]
fn refunds_follow_collected_money() {
    for &status in OrderStatus::ALL {
        assert_eq!(
            status.can_transition_to(OrderStatus::Refunded),
            status.is_paid(),
            "{status}"
        );
    }
}

#[test]
fn payment_capture_and_finality_do_not_overlap() {
    for &status in PaymentStatus::ALL {
        assert!(!(status.is_captured() && status.is_final()), "{status}");
    }
    assert!(PaymentStatus::PartiallyRefunded.is_captured());
    assert!(!PaymentStatus::Pending.is_final());
}

#[test]
fn statuses_use_their_wire_names() {
    assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "\"Paid\"");
    assert_eq!(
        serde_json::to_string(&PaymentStatus::PartiallyRefunded).unwrap(),
        "\"partially_refunded\""
    );
    assert_eq!("Refunded".parse::<OrderStatus>().unwrap(), OrderStatus::Refunded);
}

#[test]
fn success_settles_at_most_once() {
    for &status in PaymentStatus::ALL {
        if settles(status) {
            assert!(!settles(PaymentStatus::Succeeded), "{status}");
        }
    }

    let settling: Vec<_> = PaymentStatus::ALL
        .iter()
        .copied()
        .filter(|&status| settles(status))
        .collect();
    assert_eq!(
        settling,
        [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
        ]
    );
}

#[test]
fn failures_only_touch_open_payments() {
    let recorded: Vec<_> = PaymentStatus::ALL
        .iter()
        .copied()
        .filter(|&status| records_failure(status))
        .collect();

    assert_eq!(recorded, [PaymentStatus::Pending, PaymentStatus::Processing]);
}

#[test]
fn payment_arrival_depends_on_order_status() {
    for &status in OrderStatus::ALL {
        let expected = match status {
            OrderStatus::Pending => PaymentArrival::Pay,
            OrderStatus::Cancelled | OrderStatus::Refunded => PaymentArrival::Closed,
            _ => PaymentArrival::AlreadyPaid,
        };
        assert_eq!(PaymentArrival::for_status(status), expected, "{status}");
    }
}

#[test]
fn failed_attempt_then_success_still_sponsors_the_unit() {
    // Checkout reserves the unit.
    assert!(UnitStatus::Available.can_transition_to(UnitStatus::Reserved));

    // The first attempt fails while pending and the unit is released.
    assert!(records_failure(PaymentStatus::Pending));
    assert!(UnitStatus::Reserved.can_transition_to(UnitStatus::Available));

    // The retry succeeds against the failed payment row.
    assert!(settles(PaymentStatus::Failed));
    assert_eq!(
        PaymentArrival::for_status(OrderStatus::Pending),
        PaymentArrival::Pay
    );
    assert!(UnitStatus::Available.claimable_by_paid_order(false));
    assert!(UnitStatus::Available.can_transition_to(UnitStatus::Sponsored));
}

#[test]
fn unit_taken_in_between_is_refunded() {
    assert!(!UnitStatus::Reserved.claimable_by_paid_order(false));
    assert!(!UnitStatus::Sponsored.claimable_by_paid_order(false));
    assert!(!UnitStatus::Inactive.claimable_by_paid_order(true));
    assert!(UnitStatus::Reserved.claimable_by_paid_order(true));

    let fulfilment = Fulfilment {
        trees: Vec::new(),
        unclaimed_units: vec![
            UnclaimedUnit {
                code: "CEI-001".to_string(),
                amount: Decimal::from_str("45.00").unwrap(),
            },
            UnclaimedUnit {
                code: "CEI-002".to_string(),
                amount: Decimal::from_str("30.50").unwrap(),
            },
        ],
    };
    assert_eq!(fulfilment.refund_due(), Decimal::from_str("75.50").unwrap());
    assert_eq!(Fulfilment::default().refund_due(), Decimal::ZERO);
}
