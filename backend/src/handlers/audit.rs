//! HTTP handlers for the audit trail

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::audit::{Activity, AuditService};
use crate::AppState;
use shared::EntityType;

/// Activity history of one entity
pub async fn list_activities(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, Uuid)>,
) -> AppResult<Json<Vec<Activity>>> {
    let entity_type = EntityType::from_str(&entity_type)
        .ok_or_else(|| AppError::validation("entity_type", "Unknown entity type"))?;

    let service = AuditService::new(state.db);
    let activities = service.list_for_entity(entity_type, entity_id).await?;
    Ok(Json(activities))
}
