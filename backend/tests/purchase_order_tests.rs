//! Purchase order lifecycle tests
//!
//! - Goods receipt note ordering: bill, then delivered shipments
//! - Receipt gate ordering and payment tolerance
//! - Project auto-completion is monotonic

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::state_machine::targets_from;
use shared::{
    check_grn_allowed, next_project_status, plan_purchase_order_transition, project_supply,
    DomainError, GateFailure, GrnSnapshot, ProjectStatus, PurchaseOrderSnapshot,
    PurchaseOrderStatus, QuantityUnit, ShipmentStatus, Status, SupplyLine, Tolerances,
    PURCHASE_ORDER_TRANSITIONS,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn gate_of(result: Result<impl std::fmt::Debug, DomainError>) -> GateFailure {
    match result {
        Err(DomainError::PreconditionNotMet(gate)) => gate,
        other => panic!("expected a gate failure, got {:?}", other),
    }
}

/// A 10 MT / 100,000 order that is ready to be received
fn ready_to_receive() -> PurchaseOrderSnapshot {
    PurchaseOrderSnapshot {
        status: PurchaseOrderStatus::InTransit,
        quantity: dec("10"),
        quantity_unit: QuantityUnit::MetricTon,
        total_amount: dec("100000"),
        project_status: ProjectStatus::Sourcing,
        project_demand: dec("10"),
        other_supply: Decimal::ZERO,
        grn_accepted_quantity: Some(dec("10")),
        shipment_statuses: vec![ShipmentStatus::Delivered],
        bill_count: 1,
        total_paid: dec("100000"),
    }
}

fn receive(snapshot: &PurchaseOrderSnapshot) -> Result<shared::PurchaseOrderTransitionPlan, DomainError> {
    plan_purchase_order_transition(snapshot, PurchaseOrderStatus::Received, &Tolerances::default())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_grn_requires_bill_before_shipments() {
        let snapshot = GrnSnapshot {
            has_grn: false,
            bill_count: 0,
            shipment_statuses: vec![ShipmentStatus::InTransit],
        };
        assert_eq!(gate_of(check_grn_allowed(&snapshot)), GateFailure::MissingBill);
    }

    #[test]
    fn test_grn_requires_all_shipments_delivered() {
        let snapshot = GrnSnapshot {
            has_grn: false,
            bill_count: 1,
            shipment_statuses: vec![
                ShipmentStatus::Delivered,
                ShipmentStatus::InTransit,
                ShipmentStatus::Pending,
            ],
        };
        assert_eq!(
            gate_of(check_grn_allowed(&snapshot)),
            GateFailure::ShipmentNotDelivered { undelivered: 2 }
        );
    }

    #[test]
    fn test_second_grn_rejected() {
        let snapshot = GrnSnapshot {
            has_grn: true,
            bill_count: 1,
            shipment_statuses: vec![],
        };
        assert_eq!(gate_of(check_grn_allowed(&snapshot)), GateFailure::GrnAlreadyExists);
    }

    #[test]
    fn test_grn_allowed_with_bill_and_delivered_shipments() {
        let snapshot = GrnSnapshot {
            has_grn: false,
            bill_count: 2,
            shipment_statuses: vec![ShipmentStatus::Delivered],
        };
        assert!(check_grn_allowed(&snapshot).is_ok());
    }

    #[test]
    fn test_receipt_checks_demand_first() {
        let mut snapshot = ready_to_receive();
        snapshot.other_supply = dec("12");
        snapshot.grn_accepted_quantity = None;
        snapshot.bill_count = 0;
        assert_eq!(
            gate_of(receive(&snapshot)),
            GateFailure::DemandAlreadyMet {
                supply: dec("12"),
                demand: dec("10"),
            }
        );
    }

    #[test]
    fn test_receipt_requires_grn_before_bill() {
        let mut snapshot = ready_to_receive();
        snapshot.grn_accepted_quantity = None;
        snapshot.bill_count = 0;
        assert_eq!(gate_of(receive(&snapshot)), GateFailure::MissingGrn);
    }

    #[test]
    fn test_receipt_requires_bill() {
        let mut snapshot = ready_to_receive();
        snapshot.bill_count = 0;
        assert_eq!(gate_of(receive(&snapshot)), GateFailure::MissingBill);
    }

    #[test]
    fn test_receipt_within_tolerance_passes() {
        let mut snapshot = ready_to_receive();
        snapshot.total_paid = dec("99950");
        let plan = receive(&snapshot).unwrap();
        assert_eq!(plan.receipt.unwrap().adjustment, None);
    }

    #[test]
    fn test_receipt_outside_tolerance_fails_with_numbers() {
        let mut snapshot = ready_to_receive();
        snapshot.grn_accepted_quantity = Some(dec("5"));
        snapshot.total_paid = dec("10000");
        assert_eq!(
            gate_of(receive(&snapshot)),
            GateFailure::PaymentMismatch {
                paid: dec("10000"),
                required: dec("50000"),
                accepted_quantity: dec("5"),
                tolerance: dec("50"),
            }
        );
    }

    #[test]
    fn test_leaving_draft_requires_positive_commitment() {
        let mut snapshot = ready_to_receive();
        snapshot.status = PurchaseOrderStatus::Draft;
        snapshot.total_amount = Decimal::ZERO;
        let result =
            plan_purchase_order_transition(&snapshot, PurchaseOrderStatus::Sent, &Tolerances::default());
        assert_eq!(gate_of(result), GateFailure::InvalidAmount);
    }

    #[test]
    fn test_in_transit_requires_shipment() {
        let mut snapshot = ready_to_receive();
        snapshot.status = PurchaseOrderStatus::Confirmed;
        snapshot.shipment_statuses.clear();
        let result = plan_purchase_order_transition(
            &snapshot,
            PurchaseOrderStatus::InTransit,
            &Tolerances::default(),
        );
        assert_eq!(gate_of(result), GateFailure::MissingShipment);
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for status in PurchaseOrderStatus::ALL {
            let exits = targets_from(PURCHASE_ORDER_TRANSITIONS, status);
            assert_eq!(status.is_terminal(), exits.is_empty(), "{}", status);
        }
    }

    #[test]
    fn test_received_order_cannot_be_cancelled() {
        let mut snapshot = ready_to_receive();
        snapshot.status = PurchaseOrderStatus::Received;
        let result = plan_purchase_order_transition(
            &snapshot,
            PurchaseOrderStatus::Cancelled,
            &Tolerances::default(),
        );
        assert!(matches!(
            gate_of(result),
            GateFailure::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_kilogram_orders_count_in_metric_tons() {
        let lines = vec![
            SupplyLine {
                purchase_order_id: Uuid::new_v4(),
                status: PurchaseOrderStatus::Confirmed,
                quantity: dec("2500"),
                unit: QuantityUnit::Kilogram,
            },
            SupplyLine {
                purchase_order_id: Uuid::new_v4(),
                status: PurchaseOrderStatus::Received,
                quantity: dec("1.5"),
                unit: QuantityUnit::MetricTon,
            },
            SupplyLine {
                purchase_order_id: Uuid::new_v4(),
                status: PurchaseOrderStatus::Draft,
                quantity: dec("100"),
                unit: QuantityUnit::MetricTon,
            },
        ];
        assert_eq!(project_supply(&lines, None), dec("4"));
        assert_eq!(project_supply(&lines, Some(lines[0].purchase_order_id)), dec("1.5"));
    }

    #[test]
    fn test_zero_demand_never_completes() {
        assert_eq!(
            next_project_status(ProjectStatus::Sourcing, Decimal::ZERO, dec("10")),
            ProjectStatus::Sourcing
        );
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000i64).prop_map(|milli| Decimal::new(milli, 3))
}

fn project_status_strategy() -> impl Strategy<Value = ProjectStatus> {
    prop_oneof![Just(ProjectStatus::Sourcing), Just(ProjectStatus::Completed)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A completed project never reverts, whatever demand and supply become
    #[test]
    fn test_completion_is_monotonic(
        demand in quantity_strategy(),
        supply in quantity_strategy()
    ) {
        prop_assert_eq!(
            next_project_status(ProjectStatus::Completed, demand, supply),
            ProjectStatus::Completed
        );
    }

    /// A sourcing project completes exactly when positive demand is covered
    #[test]
    fn test_completion_threshold(
        current in project_status_strategy(),
        demand in quantity_strategy(),
        supply in quantity_strategy()
    ) {
        let next = next_project_status(current, demand, supply);
        if current == ProjectStatus::Sourcing {
            let covered = demand > Decimal::ZERO && supply >= demand;
            prop_assert_eq!(next == ProjectStatus::Completed, covered);
        }
    }

    /// Exact proportional payment for any accepted quantity passes the receipt gate
    #[test]
    fn test_proportional_payment_always_reconciles(
        accepted_tenths in 1i64..=100i64
    ) {
        let accepted = Decimal::new(accepted_tenths, 1);
        let mut snapshot = ready_to_receive();
        snapshot.grn_accepted_quantity = Some(accepted);
        snapshot.total_paid = accepted * dec("10000");

        let plan = receive(&snapshot).unwrap();
        let receipt = plan.receipt.unwrap();
        prop_assert_eq!(receipt.required_payment, snapshot.total_paid);
        if accepted < snapshot.quantity {
            prop_assert_eq!(receipt.adjustment, Some((accepted, snapshot.total_paid)));
        } else {
            prop_assert_eq!(receipt.adjustment, None);
        }
    }
}
