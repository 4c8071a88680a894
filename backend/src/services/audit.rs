//! Audit trail service
//!
//! Activity records are written after the business transaction commits.
//! A failed write is logged and dropped; it never fails the operation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use shared::{ActivityRecord, EntityType};

/// Audit service for activity records
#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

/// Stored activity entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub detail: String,
    pub actor_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Persist one activity record, swallowing failures
    pub async fn record(&self, record: ActivityRecord) {
        if let Err(e) = self.insert(&record).await {
            tracing::warn!(
                entity_type = record.entity_type.as_str(),
                entity_id = %record.entity_id,
                "Failed to record activity: {}",
                e
            );
        }
    }

    /// Persist several activity records in order
    pub async fn record_all(&self, records: Vec<ActivityRecord>) {
        for record in records {
            self.record(record).await;
        }
    }

    async fn insert(&self, record: &ActivityRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO activities (action, entity_type, entity_id, detail, actor_id, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.action.as_str())
        .bind(record.entity_type.as_str())
        .bind(record.entity_id)
        .bind(&record.detail)
        .bind(record.actor_id)
        .bind(record.occurred_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Activity history of one entity, newest first
    pub async fn list_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> AppResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, action, entity_type, entity_id, detail, actor_id, occurred_at
            FROM activities
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&self.db)
        .await?;

        Ok(activities)
    }
}
