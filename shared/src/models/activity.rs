//! Audit activity records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Actor, EntityType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    StatusChanged,
    PaymentRecorded,
    GoodsReceived,
    VendorLinked,
    Deleted,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::PaymentRecorded => "payment_recorded",
            ActivityAction::GoodsReceived => "goods_received",
            ActivityAction::VendorLinked => "vendor_linked",
            ActivityAction::Deleted => "deleted",
        }
    }
}

/// A fire-and-forget audit entry for one successful operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub detail: String,
    pub actor_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(
        actor: &Actor,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: Uuid,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity_type,
            entity_id,
            detail: detail.into(),
            actor_id: actor.user_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn status_change(
        actor: &Actor,
        entity_type: EntityType,
        entity_id: Uuid,
        from: &str,
        to: &str,
        notes: Option<&str>,
    ) -> Self {
        let detail = match notes {
            Some(notes) => format!("{} moved from {} to {} ({})", entity_type, from, to, notes),
            None => format!("{} moved from {} to {}", entity_type, from, to),
        };
        Self::new(actor, ActivityAction::StatusChanged, entity_type, entity_id, detail)
    }
}
