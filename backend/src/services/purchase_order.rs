//! Purchase order service
//!
//! Transitions load a snapshot under row locks, evaluate the transition
//! table, then apply the receipt adjustment, shipment closure and project
//! completion in the same transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{decode, non_negative_decimal, positive_decimal};
use crate::services::audit::AuditService;
use crate::services::procurement::{
    load_demand_lines, load_project, load_supply_lines, mark_completed, recompute_project,
};
use crate::services::shipment::load_party_statuses;
use shared::{
    plan_purchase_order_transition, project_demand, project_supply, ActivityAction,
    ActivityRecord, Actor, DomainError, EntityType, GateFailure, PurchaseOrder,
    PurchaseOrderSnapshot, PurchaseOrderStatus, PurchaseOrderTransitionPlan, QuantityUnit,
    SampleApprovalStatus, ShipmentParty, Status, Tolerances,
};

/// Purchase order service
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
    tolerances: Tolerances,
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderRow {
    id: Uuid,
    project_id: Uuid,
    vendor_id: Uuid,
    sample_id: Option<Uuid>,
    quantity: Decimal,
    quantity_unit: String,
    total_amount: Decimal,
    status: String,
    notes: Option<String>,
    created_by: Uuid,
    updated_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseOrderRow> for PurchaseOrder {
    type Error = AppError;

    fn try_from(row: PurchaseOrderRow) -> Result<Self, Self::Error> {
        Ok(PurchaseOrder {
            id: row.id,
            project_id: row.project_id,
            vendor_id: row.vendor_id,
            sample_id: row.sample_id,
            quantity: row.quantity,
            quantity_unit: decode(&row.quantity_unit, "quantity_unit", QuantityUnit::from_str)?,
            total_amount: row.total_amount,
            status: decode(&row.status, "status", PurchaseOrderStatus::from_str)?,
            notes: row.notes,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PURCHASE_ORDER_COLUMNS: &str = r#"
    id, project_id, vendor_id, sample_id, quantity, quantity_unit, total_amount,
    status, notes, created_by, updated_by, created_at, updated_at
"#;

/// Input for raising a purchase order against a project
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub project_id: Uuid,
    pub vendor_id: Uuid,
    pub sample_id: Option<Uuid>,
    #[validate(custom = "positive_decimal")]
    pub quantity: Decimal,
    #[serde(default)]
    pub quantity_unit: QuantityUnit,
    #[validate(custom = "non_negative_decimal")]
    pub total_amount: Decimal,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Input for revising quantity or amount
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePurchaseOrderInput {
    #[validate(custom = "positive_decimal")]
    pub quantity: Option<Decimal>,
    pub quantity_unit: Option<QuantityUnit>,
    #[validate(custom = "non_negative_decimal")]
    pub total_amount: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransitionPurchaseOrderInput {
    pub status: PurchaseOrderStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl PurchaseOrderService {
    pub fn new(db: PgPool, tolerances: Tolerances) -> Self {
        Self { db, tolerances }
    }

    /// Raise a draft purchase order
    pub async fn create(
        &self,
        actor: Actor,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        load_project(&mut *tx, input.project_id, true).await?;

        if let Some(sample_id) = input.sample_id {
            let (vendor_id, approval) = sqlx::query_as::<_, (Uuid, String)>(
                "SELECT vendor_id, approval_status FROM sample_submissions WHERE id = $1",
            )
            .bind(sample_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Sample submission"))?;

            if vendor_id != input.vendor_id {
                return Err(AppError::validation(
                    "sample_id",
                    "Sample was submitted by a different vendor",
                ));
            }
            if decode(&approval, "approval_status", SampleApprovalStatus::from_str)?
                != SampleApprovalStatus::ClientApproved
            {
                return Err(AppError::validation(
                    "sample_id",
                    "Only client-approved samples can justify a purchase order",
                ));
            }
        }

        let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            r#"
            INSERT INTO purchase_orders (
                project_id, vendor_id, sample_id, quantity, quantity_unit, total_amount,
                notes, created_by, updated_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {}
            "#,
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(input.project_id)
        .bind(input.vendor_id)
        .bind(input.sample_id)
        .bind(input.quantity)
        .bind(input.quantity_unit.as_str())
        .bind(input.total_amount)
        .bind(&input.notes)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let order = PurchaseOrder::try_from(row)?;

        let recompute = recompute_project(&mut *tx, order.project_id).await?;

        tx.commit().await?;

        tracing::info!(purchase_order_id = %order.id, project_id = %order.project_id, "Created purchase order");

        let mut records = vec![ActivityRecord::new(
            &actor,
            ActivityAction::Created,
            EntityType::PurchaseOrder,
            order.id,
            format!(
                "Purchase order for {} {} at {}",
                order.quantity,
                order.quantity_unit.as_str(),
                order.total_amount
            ),
        )];
        records.extend(recompute.activity(&actor));
        AuditService::new(self.db.clone()).record_all(records).await;

        Ok(order)
    }

    /// Revise quantity, unit or amount on an open purchase order
    pub async fn update(
        &self,
        actor: Actor,
        purchase_order_id: Uuid,
        input: UpdatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = load_purchase_order(&mut *tx, purchase_order_id, true).await?;

        if current.status.is_terminal() {
            return Err(AppError::validation(
                "status",
                format!("A {} purchase order can no longer be changed", current.status),
            ));
        }

        let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            r#"
            UPDATE purchase_orders SET
                quantity = $2,
                quantity_unit = $3,
                total_amount = $4,
                notes = COALESCE($5, notes),
                updated_by = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(purchase_order_id)
        .bind(input.quantity.unwrap_or(current.quantity))
        .bind(input.quantity_unit.unwrap_or(current.quantity_unit).as_str())
        .bind(input.total_amount.unwrap_or(current.total_amount))
        .bind(&input.notes)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let order = PurchaseOrder::try_from(row)?;

        let recompute = recompute_project(&mut *tx, order.project_id).await?;

        tx.commit().await?;

        let mut records = vec![ActivityRecord::new(
            &actor,
            ActivityAction::Updated,
            EntityType::PurchaseOrder,
            order.id,
            format!(
                "Quantity {} {} -> {} {}, amount {} -> {}",
                current.quantity,
                current.quantity_unit.as_str(),
                order.quantity,
                order.quantity_unit.as_str(),
                current.total_amount,
                order.total_amount
            ),
        )];
        records.extend(recompute.activity(&actor));
        AuditService::new(self.db.clone()).record_all(records).await;

        Ok(order)
    }

    /// Move a purchase order to a new status
    pub async fn transition(
        &self,
        actor: Actor,
        purchase_order_id: Uuid,
        input: TransitionPurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let order = load_purchase_order(&mut *tx, purchase_order_id, true).await?;
        let project = load_project(&mut *tx, order.project_id, true).await?;
        let snapshot = load_snapshot(&mut *tx, &order, project.status).await?;

        let plan = plan_purchase_order_transition(&snapshot, input.status, &self.tolerances)
            .map_err(|e| {
                tracing::debug!(
                    %purchase_order_id,
                    from = order.status.as_str(),
                    to = input.status.as_str(),
                    "Purchase order transition rejected: {}",
                    e
                );
                e
            })?;

        let updated = apply_plan(&mut *tx, actor, &order, &plan, input.notes.as_deref()).await?;
        let completed = plan.completes_project(project.status);
        if completed {
            mark_completed(&mut *tx, project.id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            %purchase_order_id,
            from = plan.from.as_str(),
            to = plan.to.as_str(),
            "Purchase order transitioned"
        );

        let detail = plan.receipt.as_ref().map(|receipt| {
            format!(
                "accepted {}, paid {} vs required {}",
                receipt.accepted_quantity, receipt.total_paid, receipt.required_payment
            )
        });
        let mut records = vec![ActivityRecord::status_change(
            &actor,
            EntityType::PurchaseOrder,
            purchase_order_id,
            plan.from.as_str(),
            plan.to.as_str(),
            detail.as_deref().or(input.notes.as_deref()),
        )];
        if completed {
            records.push(ActivityRecord::status_change(
                &actor,
                EntityType::ProcurementProject,
                project.id,
                project.status.as_str(),
                plan.project_status.as_str(),
                Some(
                    format!(
                        "supply meets demand {} MT on receipt of {}",
                        snapshot.project_demand, purchase_order_id
                    )
                    .as_str(),
                ),
            ));
        }
        AuditService::new(self.db.clone()).record_all(records).await;

        Ok(updated)
    }

    /// Delete a purchase order that has no money attached
    pub async fn delete(&self, actor: Actor, purchase_order_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let order = load_purchase_order(&mut *tx, purchase_order_id, true).await?;

        let (count,) = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT COUNT(*)
            FROM transactions t
            JOIN bills b ON b.id = t.bill_id
            WHERE b.purchase_order_id = $1
            "#,
        )
        .bind(purchase_order_id)
        .fetch_one(&mut *tx)
        .await?;

        if count > 0 {
            return Err(DomainError::from(GateFailure::HasFinancialTransactions { count }).into());
        }

        sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
            .bind(purchase_order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Deleted,
                EntityType::PurchaseOrder,
                purchase_order_id,
                format!("Purchase order deleted while {}", order.status),
            ))
            .await;

        Ok(())
    }

    pub async fn get(&self, purchase_order_id: Uuid) -> AppResult<PurchaseOrder> {
        let mut conn = self.db.acquire().await?;
        load_purchase_order(&mut *conn, purchase_order_id, false).await
    }
}

pub async fn load_purchase_order(
    conn: &mut PgConnection,
    purchase_order_id: Uuid,
    for_update: bool,
) -> AppResult<PurchaseOrder> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "SELECT {} FROM purchase_orders WHERE id = $1 {}",
        PURCHASE_ORDER_COLUMNS, lock
    ))
    .bind(purchase_order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Purchase order"))?;

    PurchaseOrder::try_from(row)
}

pub async fn list_for_project(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Vec<PurchaseOrder>> {
    let rows = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "SELECT {} FROM purchase_orders WHERE project_id = $1 ORDER BY created_at",
        PURCHASE_ORDER_COLUMNS
    ))
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(PurchaseOrder::try_from).collect()
}

/// Number of bills and the sum of payments against them
pub async fn bill_position(conn: &mut PgConnection, purchase_order_id: Uuid) -> AppResult<(i64, Decimal)> {
    let (bill_count,) = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM bills WHERE purchase_order_id = $1",
    )
    .bind(purchase_order_id)
    .fetch_one(&mut *conn)
    .await?;

    let (total_paid,) = sqlx::query_as::<_, (Decimal,)>(
        r#"
        SELECT COALESCE(SUM(t.amount), 0)
        FROM transactions t
        JOIN bills b ON b.id = t.bill_id
        WHERE b.purchase_order_id = $1
        "#,
    )
    .bind(purchase_order_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok((bill_count, total_paid))
}

async fn load_snapshot(
    conn: &mut PgConnection,
    order: &PurchaseOrder,
    project_status: shared::ProjectStatus,
) -> AppResult<PurchaseOrderSnapshot> {
    let demand = project_demand(&load_demand_lines(&mut *conn, order.project_id).await?);
    let other_supply = project_supply(
        &load_supply_lines(&mut *conn, order.project_id).await?,
        Some(order.id),
    );

    let grn_accepted_quantity = sqlx::query_as::<_, (Decimal,)>(
        "SELECT accepted_quantity FROM grns WHERE purchase_order_id = $1",
    )
    .bind(order.id)
    .fetch_optional(&mut *conn)
    .await?
    .map(|(q,)| q);

    let shipment_statuses = load_party_statuses(
        &mut *conn,
        ShipmentParty::Inbound {
            purchase_order_id: order.id,
        },
        true,
    )
    .await?;
    let (bill_count, total_paid) = bill_position(&mut *conn, order.id).await?;

    Ok(PurchaseOrderSnapshot {
        status: order.status,
        quantity: order.quantity,
        quantity_unit: order.quantity_unit,
        total_amount: order.total_amount,
        project_status,
        project_demand: demand,
        other_supply,
        grn_accepted_quantity,
        shipment_statuses,
        bill_count: usize::try_from(bill_count).unwrap_or(0),
        total_paid,
    })
}

async fn apply_plan(
    conn: &mut PgConnection,
    actor: Actor,
    order: &PurchaseOrder,
    plan: &PurchaseOrderTransitionPlan,
    notes: Option<&str>,
) -> AppResult<PurchaseOrder> {
    let (quantity, total_amount) = plan
        .receipt
        .as_ref()
        .and_then(|r| r.adjustment)
        .unwrap_or((order.quantity, order.total_amount));

    let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        r#"
        UPDATE purchase_orders SET
            status = $2,
            quantity = $3,
            total_amount = $4,
            notes = COALESCE($5, notes),
            updated_by = $6,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        PURCHASE_ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(plan.to.as_str())
    .bind(quantity)
    .bind(total_amount)
    .bind(notes)
    .bind(actor.user_id)
    .fetch_one(&mut *conn)
    .await?;

    if plan.receipt.is_some() {
        sqlx::query(
            r#"
            UPDATE shipments
            SET status = 'DELIVERED',
                actual_delivery_date = COALESCE(actual_delivery_date, NOW()),
                updated_at = NOW()
            WHERE purchase_order_id = $1 AND status <> 'DELIVERED'
            "#,
        )
        .bind(order.id)
        .execute(&mut *conn)
        .await?;
    }

    PurchaseOrder::try_from(row)
}
