//! Purchase order lifecycle and receipt reconciliation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::procurement::{next_project_status, ProjectStatus};
use super::shipment::{undelivered_count, ShipmentStatus};
use super::state_machine::{find_transition, Status, Transition};
use crate::error::{DomainError, DomainResult, GateFailure};
use crate::types::Tolerances;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub project_id: Uuid,
    pub vendor_id: Uuid,
    /// Approved sample that justified sourcing from this vendor
    pub sample_id: Option<Uuid>,
    pub quantity: Decimal,
    pub quantity_unit: QuantityUnit,
    pub total_amount: Decimal,
    pub status: PurchaseOrderStatus,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuantityUnit {
    #[default]
    MetricTon,
    Kilogram,
}

impl QuantityUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantityUnit::MetricTon => "MT",
            QuantityUnit::Kilogram => "KG",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MT" => Some(QuantityUnit::MetricTon),
            "KG" => Some(QuantityUnit::Kilogram),
            _ => None,
        }
    }

    pub fn to_metric_tons(&self, quantity: Decimal) -> Decimal {
        match self {
            QuantityUnit::MetricTon => quantity,
            QuantityUnit::Kilogram => quantity / Decimal::ONE_THOUSAND,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Confirmed,
    InTransit,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub const ALL: [PurchaseOrderStatus; 6] = [
        PurchaseOrderStatus::Draft,
        PurchaseOrderStatus::Sent,
        PurchaseOrderStatus::Confirmed,
        PurchaseOrderStatus::InTransit,
        PurchaseOrderStatus::Received,
        PurchaseOrderStatus::Cancelled,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(PurchaseOrderStatus::Draft),
            "SENT" => Some(PurchaseOrderStatus::Sent),
            "CONFIRMED" => Some(PurchaseOrderStatus::Confirmed),
            "IN_TRANSIT" => Some(PurchaseOrderStatus::InTransit),
            "RECEIVED" => Some(PurchaseOrderStatus::Received),
            "CANCELLED" => Some(PurchaseOrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Draft and cancelled orders are not committed supply
    pub fn counts_toward_supply(&self) -> bool {
        !matches!(self, PurchaseOrderStatus::Draft | PurchaseOrderStatus::Cancelled)
    }
}

impl Status for PurchaseOrderStatus {
    const ENTITY: &'static str = "Purchase order";

    fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Sent => "SENT",
            PurchaseOrderStatus::Confirmed => "CONFIRMED",
            PurchaseOrderStatus::InTransit => "IN_TRANSIT",
            PurchaseOrderStatus::Received => "RECEIVED",
            PurchaseOrderStatus::Cancelled => "CANCELLED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled)
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOrderGate {
    /// Checkpoint without preconditions
    Open,
    /// Leaving draft commits supply: quantity and amount must be positive
    Commitment,
    /// At least one inbound shipment exists
    InboundShipment,
    /// Full receipt reconciliation
    Receipt,
}

use PurchaseOrderGate as G;
use PurchaseOrderStatus as P;

/// Every allowed purchase order transition
pub const PURCHASE_ORDER_TRANSITIONS: &[Transition<PurchaseOrderStatus, PurchaseOrderGate>] = &[
    Transition::new(P::Draft, P::Sent, G::Commitment),
    Transition::new(P::Draft, P::Confirmed, G::Commitment),
    Transition::new(P::Sent, P::Confirmed, G::Open),
    Transition::new(P::Confirmed, P::InTransit, G::InboundShipment),
    Transition::new(P::Sent, P::InTransit, G::InboundShipment),
    Transition::new(P::InTransit, P::Received, G::Receipt),
    Transition::new(P::Confirmed, P::Received, G::Receipt),
    Transition::new(P::Draft, P::Cancelled, G::Open),
    Transition::new(P::Sent, P::Cancelled, G::Open),
    Transition::new(P::Confirmed, P::Cancelled, G::Open),
    Transition::new(P::InTransit, P::Cancelled, G::Open),
];

/// Everything the purchase order gates read
#[derive(Debug, Clone)]
pub struct PurchaseOrderSnapshot {
    pub status: PurchaseOrderStatus,
    /// Quantity in the order's own unit, as currently stored
    pub quantity: Decimal,
    pub quantity_unit: QuantityUnit,
    pub total_amount: Decimal,
    pub project_status: ProjectStatus,
    /// Project demand in metric tons
    pub project_demand: Decimal,
    /// Committed supply of the project's other purchase orders, in metric tons
    pub other_supply: Decimal,
    pub grn_accepted_quantity: Option<Decimal>,
    pub shipment_statuses: Vec<ShipmentStatus>,
    pub bill_count: usize,
    /// Sum of transactions against this order's bills
    pub total_paid: Decimal,
}

/// Effects of a successful receipt
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptPlan {
    pub accepted_quantity: Decimal,
    pub unit_price: Decimal,
    pub required_payment: Decimal,
    pub total_paid: Decimal,
    /// Rewritten `(quantity, total_amount)` when fewer goods were accepted than ordered
    pub adjustment: Option<(Decimal, Decimal)>,
    /// Shipments still to be force-delivered
    pub shipments_to_close: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrderTransitionPlan {
    pub from: PurchaseOrderStatus,
    pub to: PurchaseOrderStatus,
    pub receipt: Option<ReceiptPlan>,
    /// Project status after this transition
    pub project_status: ProjectStatus,
}

impl PurchaseOrderTransitionPlan {
    pub fn completes_project(&self, before: ProjectStatus) -> bool {
        before == ProjectStatus::Sourcing && self.project_status == ProjectStatus::Completed
    }
}

/// Evaluate a requested transition without mutating anything
pub fn plan_purchase_order_transition(
    snapshot: &PurchaseOrderSnapshot,
    target: PurchaseOrderStatus,
    tolerances: &Tolerances,
) -> DomainResult<PurchaseOrderTransitionPlan> {
    let rule = find_transition(PURCHASE_ORDER_TRANSITIONS, snapshot.status, target)?;

    let receipt = match rule.gate {
        G::Open => None,
        G::Commitment => {
            if snapshot.quantity <= Decimal::ZERO || snapshot.total_amount <= Decimal::ZERO {
                return Err(GateFailure::InvalidAmount.into());
            }
            None
        }
        G::InboundShipment => {
            if snapshot.shipment_statuses.is_empty() {
                return Err(GateFailure::MissingShipment.into());
            }
            None
        }
        G::Receipt => Some(plan_receipt(snapshot, tolerances)?),
    };

    // Supply this order contributes once the transition lands
    let own_supply = if target.counts_toward_supply() {
        snapshot.quantity_unit.to_metric_tons(snapshot.quantity)
    } else {
        Decimal::ZERO
    };
    let project_status = next_project_status(
        snapshot.project_status,
        snapshot.project_demand,
        snapshot.other_supply + own_supply,
    );

    Ok(PurchaseOrderTransitionPlan {
        from: snapshot.status,
        to: target,
        receipt,
        project_status,
    })
}

/// The receipt gate, in order: demand, documents, payment reconciliation
pub fn plan_receipt(
    snapshot: &PurchaseOrderSnapshot,
    tolerances: &Tolerances,
) -> DomainResult<ReceiptPlan> {
    let demand = snapshot.project_demand;
    if demand > Decimal::ZERO && snapshot.other_supply >= demand {
        return Err(GateFailure::DemandAlreadyMet {
            supply: snapshot.other_supply,
            demand,
        }
        .into());
    }

    let accepted_quantity = snapshot
        .grn_accepted_quantity
        .ok_or(GateFailure::MissingGrn)?;

    let undelivered = undelivered_count(&snapshot.shipment_statuses);
    if undelivered > 0 {
        return Err(GateFailure::ShipmentNotDelivered { undelivered }.into());
    }

    if snapshot.bill_count == 0 {
        return Err(GateFailure::MissingBill.into());
    }

    if snapshot.quantity <= Decimal::ZERO {
        return Err(DomainError::validation(
            "quantity",
            "Purchase order quantity must be positive to compute a unit price",
        ));
    }
    let unit_price = snapshot.total_amount / snapshot.quantity;
    let required_payment = accepted_quantity * unit_price;
    let diff = (required_payment - snapshot.total_paid).abs();
    if diff > tolerances.purchase_payment {
        return Err(GateFailure::PaymentMismatch {
            paid: snapshot.total_paid,
            required: required_payment,
            accepted_quantity,
            tolerance: tolerances.purchase_payment,
        }
        .into());
    }

    let adjustment = if accepted_quantity < snapshot.quantity {
        Some((accepted_quantity, snapshot.total_paid))
    } else {
        None
    };

    Ok(ReceiptPlan {
        accepted_quantity,
        unit_price,
        required_payment,
        total_paid: snapshot.total_paid,
        adjustment,
        shipments_to_close: undelivered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::state_machine::targets_from;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ready(status: PurchaseOrderStatus) -> PurchaseOrderSnapshot {
        PurchaseOrderSnapshot {
            status,
            quantity: dec("10"),
            quantity_unit: QuantityUnit::MetricTon,
            total_amount: dec("100000"),
            project_status: ProjectStatus::Sourcing,
            project_demand: dec("20"),
            other_supply: Decimal::ZERO,
            grn_accepted_quantity: Some(dec("10")),
            shipment_statuses: vec![ShipmentStatus::Delivered],
            bill_count: 1,
            total_paid: dec("100000"),
        }
    }

    fn plan(snap: &PurchaseOrderSnapshot, to: PurchaseOrderStatus) -> DomainResult<PurchaseOrderTransitionPlan> {
        plan_purchase_order_transition(snap, to, &Tolerances::default())
    }

    #[test]
    fn test_leaving_draft_requires_amounts() {
        let mut snap = ready(P::Draft);
        snap.total_amount = Decimal::ZERO;
        assert_eq!(plan(&snap, P::Sent).unwrap_err().code(), "INVALID_AMOUNT");
    }

    #[test]
    fn test_in_transit_requires_shipment() {
        let mut snap = ready(P::Confirmed);
        snap.shipment_statuses.clear();
        assert_eq!(plan(&snap, P::InTransit).unwrap_err().code(), "MISSING_SHIPMENT");
    }

    #[test]
    fn test_receipt_rejects_when_demand_met_elsewhere() {
        let mut snap = ready(P::InTransit);
        snap.other_supply = dec("20");
        let err = plan(&snap, P::Received).unwrap_err();
        assert_eq!(
            err,
            DomainError::PreconditionNotMet(GateFailure::DemandAlreadyMet {
                supply: dec("20"),
                demand: dec("20"),
            })
        );
    }

    #[test]
    fn test_receipt_requires_grn() {
        let mut snap = ready(P::InTransit);
        snap.grn_accepted_quantity = None;
        assert_eq!(plan(&snap, P::Received).unwrap_err().code(), "MISSING_GRN");
    }

    #[test]
    fn test_receipt_requires_delivered_shipments() {
        let mut snap = ready(P::InTransit);
        snap.shipment_statuses.push(ShipmentStatus::InTransit);
        assert_eq!(
            plan(&snap, P::Received).unwrap_err().code(),
            "SHIPMENT_NOT_DELIVERED"
        );
    }

    #[test]
    fn test_receipt_requires_bill() {
        let mut snap = ready(P::InTransit);
        snap.bill_count = 0;
        assert_eq!(plan(&snap, P::Received).unwrap_err().code(), "MISSING_BILL");
    }

    #[test]
    fn test_payment_mismatch_beyond_tolerance() {
        let mut snap = ready(P::InTransit);
        snap.total_paid = dec("99949");
        match plan(&snap, P::Received).unwrap_err() {
            DomainError::PreconditionNotMet(GateFailure::PaymentMismatch { paid, required, .. }) => {
                assert_eq!(paid, dec("99949"));
                assert_eq!(required, dec("100000"));
            }
            other => panic!("unexpected {:?}", other),
        }

        snap.total_paid = dec("99950");
        assert!(plan(&snap, P::Received).is_ok());
    }

    #[test]
    fn test_partial_receipt_rewrites_contract() {
        let mut snap = ready(P::InTransit);
        snap.grn_accepted_quantity = Some(dec("8"));
        snap.total_paid = dec("80000");
        let p = plan(&snap, P::Received).unwrap();
        let receipt = p.receipt.unwrap();
        assert_eq!(receipt.required_payment, dec("80000"));
        assert_eq!(receipt.adjustment, Some((dec("8"), dec("80000"))));
    }

    #[test]
    fn test_full_receipt_has_no_adjustment() {
        let p = plan(&ready(P::InTransit), P::Received).unwrap();
        assert_eq!(p.receipt.unwrap().adjustment, None);
    }

    #[test]
    fn test_receipt_completes_project_when_supply_meets_demand() {
        let mut snap = ready(P::InTransit);
        snap.project_demand = dec("15");
        snap.other_supply = dec("5");
        let p = plan(&snap, P::Received).unwrap();
        assert!(p.completes_project(ProjectStatus::Sourcing));
    }

    #[test]
    fn test_cancel_does_not_contribute_supply() {
        let mut snap = ready(P::InTransit);
        snap.project_demand = dec("10");
        let p = plan(&snap, P::Cancelled).unwrap();
        assert_eq!(p.project_status, ProjectStatus::Sourcing);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in P::ALL.iter().filter(|s| s.is_terminal()) {
            assert!(targets_from(PURCHASE_ORDER_TRANSITIONS, *status).is_empty());
        }
    }

    #[test]
    fn test_received_only_via_receipt_gate() {
        for row in PURCHASE_ORDER_TRANSITIONS.iter().filter(|t| t.to == P::Received) {
            assert_eq!(row.gate, G::Receipt);
        }
    }
}
