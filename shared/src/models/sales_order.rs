//! Sales order lifecycle and the fulfillment cascade plan

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::finance::DocumentBalance;
use super::opportunity::{SampleApprovalStatus, SampleSubmission};
use super::state_machine::{find_transition, Status, Transition};
use crate::error::{DomainResult, GateFailure};
use crate::types::Tolerances;

/// Prefix identifying projects created by the fulfillment cascade
pub const FULFILLMENT_PREFIX: &str = "Fulfillment:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub client_id: Uuid,
    pub total_amount: Option<Decimal>,
    pub status: SalesOrderStatus,
    pub fulfillment_notes: Option<String>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesOrderStatus {
    Pending,
    Confirmed,
    InProgress,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl SalesOrderStatus {
    pub const ALL: [SalesOrderStatus; 7] = [
        SalesOrderStatus::Pending,
        SalesOrderStatus::Confirmed,
        SalesOrderStatus::InProgress,
        SalesOrderStatus::Shipped,
        SalesOrderStatus::Delivered,
        SalesOrderStatus::Completed,
        SalesOrderStatus::Cancelled,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SalesOrderStatus::Pending),
            "CONFIRMED" => Some(SalesOrderStatus::Confirmed),
            "IN_PROGRESS" => Some(SalesOrderStatus::InProgress),
            "SHIPPED" => Some(SalesOrderStatus::Shipped),
            "DELIVERED" => Some(SalesOrderStatus::Delivered),
            "COMPLETED" => Some(SalesOrderStatus::Completed),
            "CANCELLED" => Some(SalesOrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl Status for SalesOrderStatus {
    const ENTITY: &'static str = "Sales order";

    fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Pending => "PENDING",
            SalesOrderStatus::Confirmed => "CONFIRMED",
            SalesOrderStatus::InProgress => "IN_PROGRESS",
            SalesOrderStatus::Shipped => "SHIPPED",
            SalesOrderStatus::Delivered => "DELIVERED",
            SalesOrderStatus::Completed => "COMPLETED",
            SalesOrderStatus::Cancelled => "CANCELLED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, SalesOrderStatus::Completed | SalesOrderStatus::Cancelled)
    }
}

impl std::fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Precondition attached to a sales order transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesOrderGate {
    /// Total amount set and positive
    PositiveAmount,
    /// Invoice, shipment and some payment exist
    ShippingDocuments,
    /// Notes required once goods moved or money was collected
    CancellationJustification,
    /// Notes required when shipped quantity or collected amount do not reconcile
    Reconciliation,
}

use SalesOrderGate as G;
use SalesOrderStatus as S;

/// Every allowed sales order transition. Any forward move is allowed and
/// carries the gate of its target; CANCELLED is reachable from every
/// non-terminal status.
pub const SALES_ORDER_TRANSITIONS: &[Transition<SalesOrderStatus, SalesOrderGate>] = &[
    Transition::new(S::Pending, S::Confirmed, G::PositiveAmount),
    Transition::new(S::Pending, S::InProgress, G::PositiveAmount),
    Transition::new(S::Pending, S::Shipped, G::ShippingDocuments),
    Transition::new(S::Pending, S::Delivered, G::Reconciliation),
    Transition::new(S::Pending, S::Completed, G::Reconciliation),
    Transition::new(S::Confirmed, S::InProgress, G::PositiveAmount),
    Transition::new(S::Confirmed, S::Shipped, G::ShippingDocuments),
    Transition::new(S::Confirmed, S::Delivered, G::Reconciliation),
    Transition::new(S::Confirmed, S::Completed, G::Reconciliation),
    Transition::new(S::InProgress, S::Shipped, G::ShippingDocuments),
    Transition::new(S::InProgress, S::Delivered, G::Reconciliation),
    Transition::new(S::InProgress, S::Completed, G::Reconciliation),
    Transition::new(S::Shipped, S::Delivered, G::Reconciliation),
    Transition::new(S::Shipped, S::Completed, G::Reconciliation),
    Transition::new(S::Delivered, S::Completed, G::Reconciliation),
    Transition::new(S::Pending, S::Cancelled, G::CancellationJustification),
    Transition::new(S::Confirmed, S::Cancelled, G::CancellationJustification),
    Transition::new(S::InProgress, S::Cancelled, G::CancellationJustification),
    Transition::new(S::Shipped, S::Cancelled, G::CancellationJustification),
    Transition::new(S::Delivered, S::Cancelled, G::CancellationJustification),
];

/// Everything the sales order gates read
#[derive(Debug, Clone)]
pub struct SalesOrderSnapshot {
    pub status: SalesOrderStatus,
    pub total_amount: Option<Decimal>,
    /// Quantity on the originating opportunity
    pub ordered_quantity: Decimal,
    pub invoices: Vec<DocumentBalance>,
    pub shipment_quantities: Vec<Decimal>,
    /// CREDIT ledger entries linked to the order but not to any invoice
    pub direct_receipts: Decimal,
    /// A "Fulfillment:" project is already linked to the opportunity
    pub has_fulfillment_project: bool,
}

impl SalesOrderSnapshot {
    /// Sum over invoices of `total - pending`
    pub fn total_paid(&self) -> Decimal {
        self.invoices.iter().map(DocumentBalance::paid).sum()
    }

    pub fn total_shipped(&self) -> Decimal {
        self.shipment_quantities.iter().copied().sum()
    }
}

/// Approved plan for a sales order transition
#[derive(Debug, Clone, PartialEq)]
pub struct SalesOrderTransitionPlan {
    pub from: SalesOrderStatus,
    pub to: SalesOrderStatus,
    /// Run the fulfillment cascade in the same unit of work
    pub trigger_fulfillment: bool,
    pub notes: Option<String>,
    /// Why notes were mandatory, if they were
    pub override_reason: Option<String>,
}

fn clean_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Evaluate a requested transition without mutating anything
pub fn plan_sales_order_transition(
    snapshot: &SalesOrderSnapshot,
    target: SalesOrderStatus,
    notes: Option<&str>,
    tolerances: &Tolerances,
) -> DomainResult<SalesOrderTransitionPlan> {
    let rule = find_transition(SALES_ORDER_TRANSITIONS, snapshot.status, target)?;
    let notes = clean_notes(notes);

    let override_reason = match rule.gate {
        G::PositiveAmount => {
            match snapshot.total_amount {
                Some(amount) if amount > Decimal::ZERO => {}
                _ => return Err(GateFailure::InvalidAmount.into()),
            }
            None
        }
        G::ShippingDocuments => {
            if snapshot.invoices.is_empty() {
                return Err(GateFailure::MissingInvoice.into());
            }
            if snapshot.shipment_quantities.is_empty() {
                return Err(GateFailure::MissingShipment.into());
            }
            if snapshot.total_paid() <= Decimal::ZERO {
                return Err(GateFailure::NoPaymentRecorded.into());
            }
            None
        }
        G::CancellationJustification => {
            let goods_moved = snapshot.shipment_quantities.iter().any(|q| !q.is_zero());
            let collected = snapshot.total_paid() + snapshot.direct_receipts;
            if goods_moved || collected > Decimal::ZERO {
                let reason = format!(
                    "cancelling after shipping {} and collecting {}",
                    snapshot.total_shipped(),
                    collected
                );
                if notes.is_none() {
                    return Err(GateFailure::JustificationRequired {
                        detail: reason,
                    }
                    .into());
                }
                Some(reason)
            } else {
                None
            }
        }
        G::Reconciliation => {
            let reason = reconciliation_gap(snapshot, tolerances);
            if let Some(reason) = &reason {
                if notes.is_none() {
                    return Err(GateFailure::JustificationRequired {
                        detail: reason.clone(),
                    }
                    .into());
                }
            }
            reason
        }
    };

    let trigger_fulfillment =
        target == SalesOrderStatus::InProgress && !snapshot.has_fulfillment_project;

    Ok(SalesOrderTransitionPlan {
        from: snapshot.status,
        to: target,
        trigger_fulfillment,
        notes,
        override_reason,
    })
}

/// Describe shipped/paid mismatches beyond tolerance, if any
fn reconciliation_gap(snapshot: &SalesOrderSnapshot, tolerances: &Tolerances) -> Option<String> {
    let mut gaps = Vec::new();

    let shipped = snapshot.total_shipped();
    if (shipped - snapshot.ordered_quantity).abs() > tolerances.quantity {
        gaps.push(format!(
            "shipped {} vs ordered {}",
            shipped, snapshot.ordered_quantity
        ));
    }

    let paid = snapshot.total_paid();
    let total = snapshot.total_amount.unwrap_or(Decimal::ZERO);
    if (paid - total).abs() > tolerances.sales_payment {
        if snapshot.direct_receipts.is_zero() {
            gaps.push(format!("paid {} vs order total {}", paid, total));
        } else {
            gaps.push(format!(
                "paid {} vs order total {} ({} more received outside invoices)",
                paid, total, snapshot.direct_receipts
            ));
        }
    }

    if gaps.is_empty() {
        None
    } else {
        Some(gaps.join("; "))
    }
}

/// Name of the project created by the fulfillment cascade
pub fn fulfillment_project_name(product_name: &str, client_name: &str) -> String {
    format!("{} {} - {}", FULFILLMENT_PREFIX, product_name, client_name)
}

pub fn is_fulfillment_project(name: &str) -> bool {
    name.starts_with(FULFILLMENT_PREFIX)
}

/// Vendors whose samples the client approved, deduplicated and minus those already linked
pub fn vendors_to_link(samples: &[SampleSubmission], already_linked: &[Uuid]) -> Vec<Uuid> {
    let mut vendors: Vec<Uuid> = Vec::new();
    for sample in samples {
        if sample.approval_status != SampleApprovalStatus::ClientApproved {
            continue;
        }
        if already_linked.contains(&sample.vendor_id) || vendors.contains(&sample.vendor_id) {
            continue;
        }
        vendors.push(sample.vendor_id);
    }
    vendors
}
