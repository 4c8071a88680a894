//! Sales opportunity and sample submission models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sales opportunity raised by the sales team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOpportunity {
    pub id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub product_name: String,
    pub target_price: Option<Decimal>,
    pub price_type: PriceType,
    /// Quantity in metric tons
    pub quantity: Decimal,
    pub commodity_id: Option<Uuid>,
    pub variety_id: Option<Uuid>,
    pub form_id: Option<Uuid>,
    pub manual_procurement_quantity: Option<Decimal>,
    pub procurement_quantity: Option<Decimal>,
    pub status: OpportunityStatus,
    pub procurement_project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalesOpportunity {
    /// Raw material this opportunity needs
    pub fn demand_quantity(&self) -> Decimal {
        self.procurement_quantity.unwrap_or(self.quantity)
    }
}

/// How the target price is quoted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    #[default]
    PerKg,
    PerMetricTon,
    Total,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::PerKg => "PER_KG",
            PriceType::PerMetricTon => "PER_METRIC_TON",
            PriceType::Total => "TOTAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PER_KG" => Some(PriceType::PerKg),
            "PER_METRIC_TON" => Some(PriceType::PerMetricTon),
            "TOTAL" => Some(PriceType::Total),
            _ => None,
        }
    }

    /// Total contract value implied by the target price for a quantity in metric tons
    pub fn contract_value(&self, price: Decimal, quantity_mt: Decimal) -> Decimal {
        match self {
            PriceType::PerKg => price * quantity_mt * Decimal::ONE_THOUSAND,
            PriceType::PerMetricTon => price * quantity_mt,
            PriceType::Total => price,
        }
    }
}

/// Opportunity pipeline status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityStatus {
    Open,
    Qualified,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::Open => "OPEN",
            OpportunityStatus::Qualified => "QUALIFIED",
            OpportunityStatus::Negotiation => "NEGOTIATION",
            OpportunityStatus::ClosedWon => "CLOSED_WON",
            OpportunityStatus::ClosedLost => "CLOSED_LOST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(OpportunityStatus::Open),
            "QUALIFIED" => Some(OpportunityStatus::Qualified),
            "NEGOTIATION" => Some(OpportunityStatus::Negotiation),
            "CLOSED_WON" => Some(OpportunityStatus::ClosedWon),
            "CLOSED_LOST" => Some(OpportunityStatus::ClosedLost),
            _ => None,
        }
    }

    /// Only open and won opportunities contribute to project demand
    pub fn counts_toward_demand(&self) -> bool {
        matches!(self, OpportunityStatus::Open | OpportunityStatus::ClosedWon)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, OpportunityStatus::ClosedWon | OpportunityStatus::ClosedLost)
    }
}

/// A vendor sample submitted against an opportunity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSubmission {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub vendor_id: Uuid,
    pub approval_status: SampleApprovalStatus,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleApprovalStatus {
    Pending,
    ClientApproved,
    ClientRejected,
}

impl SampleApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleApprovalStatus::Pending => "PENDING",
            SampleApprovalStatus::ClientApproved => "CLIENT_APPROVED",
            SampleApprovalStatus::ClientRejected => "CLIENT_REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SampleApprovalStatus::Pending),
            "CLIENT_APPROVED" => Some(SampleApprovalStatus::ClientApproved),
            "CLIENT_REJECTED" => Some(SampleApprovalStatus::ClientRejected),
            _ => None,
        }
    }
}
