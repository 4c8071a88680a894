//! End-to-end engine scenarios
//!
//! Walks the pure engine through the flows a trading desk runs daily:
//! - Quantity conversion from sales to procurement
//! - Partial and full invoice settlement
//! - Shipping gate on a sales order without invoices
//! - Partial receipt of a purchase order
//! - Project completion across two purchase orders

use rust_decimal::Decimal;
use shared::{
    compute_procurement_quantity, plan_purchase_order_transition, plan_sales_order_transition,
    Commodity, DocumentBalance, DomainError, GateFailure, Invoice, InvoiceStatus, ProjectStatus,
    PurchaseOrderSnapshot, PurchaseOrderStatus, QuantityUnit, SalesOrderSnapshot,
    SalesOrderStatus, ShipmentStatus, Tolerances, YieldChain, YieldSource,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn gate(err: DomainError) -> GateFailure {
    match err {
        DomainError::PreconditionNotMet(gate) => gate,
        other => panic!("expected a gate failure, got {:?}", other),
    }
}

fn invoice(total: &str) -> Invoice {
    let now = chrono::Utc::now();
    Invoice {
        id: Uuid::new_v4(),
        sales_order_id: Uuid::new_v4(),
        invoice_number: "INV-0001".to_string(),
        total_amount: dec(total),
        pending_amount: dec(total),
        status: InvoiceStatus::Unpaid,
        due_date: None,
        created_at: now,
        updated_at: now,
    }
}

fn purchase_order(status: PurchaseOrderStatus, quantity: &str, total: &str) -> PurchaseOrderSnapshot {
    PurchaseOrderSnapshot {
        status,
        quantity: dec(quantity),
        quantity_unit: QuantityUnit::MetricTon,
        total_amount: dec(total),
        project_status: ProjectStatus::Sourcing,
        project_demand: Decimal::ZERO,
        other_supply: Decimal::ZERO,
        grn_accepted_quantity: Some(dec(quantity)),
        shipment_statuses: vec![ShipmentStatus::Delivered],
        bill_count: 1,
        total_paid: dec(total),
    }
}

#[test]
fn scenario_commodity_yield_converts_sales_quantity() {
    let commodity = Commodity {
        id: Uuid::new_v4(),
        name: "Moringa".to_string(),
        yield_percentage: dec("80"),
        wastage_percentage: dec("5"),
    };
    let chain = YieldChain::from_commodity(&commodity);

    let result = compute_procurement_quantity(dec("10"), None, &chain).unwrap();

    assert_eq!(result.procurement_quantity, dec("12.5"));
    assert_eq!(result.yield_percentage, Some(dec("80")));
    assert_eq!(result.source, YieldSource::Commodity);
}

#[test]
fn scenario_invoice_settles_in_two_payments() {
    let mut inv = invoice("100000");

    let first = inv.apply_payment(dec("40000")).unwrap();
    assert_eq!(first.new_pending, dec("60000"));
    assert_eq!(first.status, InvoiceStatus::Partial);
    inv.pending_amount = first.new_pending;
    inv.status = first.status;
    inv.check_invariants().unwrap();

    let second = inv.apply_payment(dec("60000")).unwrap();
    assert_eq!(second.new_pending, Decimal::ZERO);
    assert_eq!(second.status, InvoiceStatus::Paid);
    inv.pending_amount = second.new_pending;
    inv.status = second.status;
    inv.check_invariants().unwrap();

    let err = inv.apply_payment(dec("1")).unwrap_err();
    assert_eq!(
        gate(err),
        GateFailure::AmountExceedsPending {
            amount: dec("1"),
            pending: Decimal::ZERO,
        }
    );
}

#[test]
fn scenario_shipping_without_invoice_is_rejected() {
    let snapshot = SalesOrderSnapshot {
        status: SalesOrderStatus::InProgress,
        total_amount: Some(dec("100000")),
        ordered_quantity: dec("10"),
        invoices: vec![],
        shipment_quantities: vec![dec("10")],
        direct_receipts: Decimal::ZERO,
        has_fulfillment_project: true,
    };

    let err = plan_sales_order_transition(
        &snapshot,
        SalesOrderStatus::Shipped,
        None,
        &Tolerances::default(),
    )
    .unwrap_err();

    assert_eq!(gate(err), GateFailure::MissingInvoice);
    // The plan never mutates; the caller keeps the prior status
    assert_eq!(snapshot.status, SalesOrderStatus::InProgress);
}

#[test]
fn scenario_partial_receipt_rewrites_quantity_and_total() {
    let mut snapshot = purchase_order(PurchaseOrderStatus::InTransit, "10", "100000");
    snapshot.grn_accepted_quantity = Some(dec("8"));
    snapshot.total_paid = dec("80000");

    let plan = plan_purchase_order_transition(
        &snapshot,
        PurchaseOrderStatus::Received,
        &Tolerances::default(),
    )
    .unwrap();

    let receipt = plan.receipt.expect("receipt plan");
    assert_eq!(receipt.unit_price, dec("10000"));
    assert_eq!(receipt.required_payment, dec("80000"));
    assert_eq!(receipt.adjustment, Some((dec("8"), dec("80000"))));
    assert_eq!(plan.to, PurchaseOrderStatus::Received);
}

#[test]
fn scenario_project_completes_when_second_order_received() {
    let tolerances = Tolerances::default();

    // PO1 (10 MT) received while PO2 is still a draft
    let mut first = purchase_order(PurchaseOrderStatus::InTransit, "10", "100000");
    first.project_demand = dec("15");
    let plan = plan_purchase_order_transition(&first, PurchaseOrderStatus::Received, &tolerances)
        .unwrap();
    assert_eq!(plan.project_status, ProjectStatus::Sourcing);
    assert!(!plan.completes_project(ProjectStatus::Sourcing));

    // PO2 (5 MT) received with PO1 counted as supply
    let mut second = purchase_order(PurchaseOrderStatus::InTransit, "5", "50000");
    second.project_demand = dec("15");
    second.other_supply = dec("10");
    let plan = plan_purchase_order_transition(&second, PurchaseOrderStatus::Received, &tolerances)
        .unwrap();
    assert_eq!(plan.project_status, ProjectStatus::Completed);
    assert!(plan.completes_project(ProjectStatus::Sourcing));
}

#[test]
fn scenario_shipping_without_invoice_rejected_from_earlier_statuses() {
    for status in [SalesOrderStatus::Pending, SalesOrderStatus::Confirmed] {
        let snapshot = SalesOrderSnapshot {
            status,
            total_amount: Some(dec("100000")),
            ordered_quantity: dec("10"),
            invoices: vec![],
            shipment_quantities: vec![],
            direct_receipts: Decimal::ZERO,
            has_fulfillment_project: false,
        };

        let err = plan_sales_order_transition(
            &snapshot,
            SalesOrderStatus::Shipped,
            None,
            &Tolerances::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "MISSING_INVOICE", "from {:?}", status);
        assert_eq!(snapshot.status, status);
    }
}

#[test]
fn scenario_order_total_collected_across_invoices() {
    let snapshot = SalesOrderSnapshot {
        status: SalesOrderStatus::Shipped,
        total_amount: Some(dec("100000")),
        ordered_quantity: dec("10"),
        invoices: vec![
            DocumentBalance::new(dec("60000"), Decimal::ZERO),
            DocumentBalance::new(dec("40000"), Decimal::ZERO),
        ],
        shipment_quantities: vec![dec("6"), dec("4")],
        direct_receipts: Decimal::ZERO,
        has_fulfillment_project: true,
    };

    let plan = plan_sales_order_transition(
        &snapshot,
        SalesOrderStatus::Completed,
        None,
        &Tolerances::default(),
    )
    .unwrap();

    assert_eq!(snapshot.total_paid(), dec("100000"));
    assert!(plan.override_reason.is_none());
}
