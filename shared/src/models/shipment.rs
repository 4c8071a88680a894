//! Shipments and goods receipt notes

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult, GateFailure};

/// Which document a shipment moves goods for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum ShipmentParty {
    /// Vendor to us, against a purchase order
    Inbound { purchase_order_id: Uuid },
    /// Us to client, against a sales order
    Outbound { sales_order_id: Uuid },
}

impl ShipmentParty {
    /// Decode the stored foreign-key pair; exactly one must be set
    pub fn from_columns(
        purchase_order_id: Option<Uuid>,
        sales_order_id: Option<Uuid>,
    ) -> DomainResult<Self> {
        match (purchase_order_id, sales_order_id) {
            (Some(purchase_order_id), None) => Ok(ShipmentParty::Inbound { purchase_order_id }),
            (None, Some(sales_order_id)) => Ok(ShipmentParty::Outbound { sales_order_id }),
            (Some(_), Some(_)) => Err(DomainError::InvariantViolation(
                "shipment references both a purchase order and a sales order".to_string(),
            )),
            (None, None) => Err(DomainError::InvariantViolation(
                "shipment references neither a purchase order nor a sales order".to_string(),
            )),
        }
    }

    /// Encode as `(purchase_order_id, sales_order_id)`
    pub fn columns(&self) -> (Option<Uuid>, Option<Uuid>) {
        match *self {
            ShipmentParty::Inbound { purchase_order_id } => (Some(purchase_order_id), None),
            ShipmentParty::Outbound { sales_order_id } => (None, Some(sales_order_id)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "PENDING",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::Delivered => "DELIVERED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ShipmentStatus::Pending),
            "IN_TRANSIT" => Some(ShipmentStatus::InTransit),
            "DELIVERED" => Some(ShipmentStatus::Delivered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub party: ShipmentParty,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub quantity: Decimal,
    pub eta: Option<NaiveDate>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub status: ShipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Count shipments not yet delivered
pub fn undelivered_count(statuses: &[ShipmentStatus]) -> usize {
    statuses
        .iter()
        .filter(|s| **s != ShipmentStatus::Delivered)
        .count()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityCheckStatus {
    #[default]
    Pending,
    Passed,
    Failed,
}

impl QualityCheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityCheckStatus::Pending => "PENDING",
            QualityCheckStatus::Passed => "PASSED",
            QualityCheckStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(QualityCheckStatus::Pending),
            "PASSED" => Some(QualityCheckStatus::Passed),
            "FAILED" => Some(QualityCheckStatus::Failed),
            _ => None,
        }
    }
}

/// Goods Receipt Note: inspection of goods received against a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grn {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub total_received_quantity: Decimal,
    pub rejected_quantity: Decimal,
    pub accepted_quantity: Decimal,
    pub quality_check_status: QualityCheckStatus,
    pub notes: Option<String>,
    pub received_by: Uuid,
    pub received_at: DateTime<Utc>,
}

/// State needed to decide whether a GRN may be recorded
#[derive(Debug, Clone, Default)]
pub struct GrnSnapshot {
    pub has_grn: bool,
    pub bill_count: usize,
    pub shipment_statuses: Vec<ShipmentStatus>,
}

/// Gate for recording goods: bill first, then every shipment delivered
pub fn check_grn_allowed(snapshot: &GrnSnapshot) -> DomainResult<()> {
    if snapshot.has_grn {
        return Err(GateFailure::GrnAlreadyExists.into());
    }
    if snapshot.bill_count == 0 {
        return Err(GateFailure::MissingBill.into());
    }
    let undelivered = undelivered_count(&snapshot.shipment_statuses);
    if undelivered > 0 {
        return Err(GateFailure::ShipmentNotDelivered { undelivered }.into());
    }
    Ok(())
}
