//! Common types used across the engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user on whose behalf a transition runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
}

impl Actor {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Reconciliation tolerances applied by the transition gates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Tolerances {
    /// Allowed gap between paid and required value when receiving a purchase order
    pub purchase_payment: Decimal,
    /// Allowed gap between collected and order total when delivering or completing
    pub sales_payment: Decimal,
    /// Allowed gap between shipped and ordered quantity
    pub quantity: Decimal,
}

impl Tolerances {
    pub const DEFAULT_PURCHASE_PAYMENT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
    pub const DEFAULT_SALES_PAYMENT: Decimal = Decimal::from_parts(100, 0, 0, false, 2);
    pub const DEFAULT_QUANTITY: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            purchase_payment: Self::DEFAULT_PURCHASE_PAYMENT,
            sales_payment: Self::DEFAULT_SALES_PAYMENT,
            quantity: Self::DEFAULT_QUANTITY,
        }
    }
}

/// Entity kinds referenced by audit records and errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    SalesOpportunity,
    SampleSubmission,
    SalesOrder,
    ProcurementProject,
    PurchaseOrder,
    Shipment,
    Grn,
    Invoice,
    Bill,
    Transaction,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::SalesOpportunity => "sales_opportunity",
            EntityType::SampleSubmission => "sample_submission",
            EntityType::SalesOrder => "sales_order",
            EntityType::ProcurementProject => "procurement_project",
            EntityType::PurchaseOrder => "purchase_order",
            EntityType::Shipment => "shipment",
            EntityType::Grn => "grn",
            EntityType::Invoice => "invoice",
            EntityType::Bill => "bill",
            EntityType::Transaction => "transaction",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sales_opportunity" => Some(EntityType::SalesOpportunity),
            "sample_submission" => Some(EntityType::SampleSubmission),
            "sales_order" => Some(EntityType::SalesOrder),
            "procurement_project" => Some(EntityType::ProcurementProject),
            "purchase_order" => Some(EntityType::PurchaseOrder),
            "shipment" => Some(EntityType::Shipment),
            "grn" => Some(EntityType::Grn),
            "invoice" => Some(EntityType::Invoice),
            "bill" => Some(EntityType::Bill),
            "transaction" => Some(EntityType::Transaction),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EntityType::SalesOpportunity => "Sales opportunity",
            EntityType::SampleSubmission => "Sample submission",
            EntityType::SalesOrder => "Sales order",
            EntityType::ProcurementProject => "Procurement project",
            EntityType::PurchaseOrder => "Purchase order",
            EntityType::Shipment => "Shipment",
            EntityType::Grn => "Goods receipt note",
            EntityType::Invoice => "Invoice",
            EntityType::Bill => "Bill",
            EntityType::Transaction => "Transaction",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_tolerances() {
        let tolerances = Tolerances::default();
        assert_eq!(tolerances.purchase_payment, Decimal::from(50));
        assert_eq!(tolerances.sales_payment, Decimal::from_str("1.00").unwrap());
        assert_eq!(tolerances.quantity, Decimal::from_str("0.01").unwrap());
    }

    #[test]
    fn test_entity_type_round_trip() {
        for entity in [EntityType::SalesOrder, EntityType::Grn, EntityType::Bill] {
            assert_eq!(EntityType::from_str(entity.as_str()), Some(entity));
        }
        assert_eq!(EntityType::from_str("lot"), None);
    }
}
