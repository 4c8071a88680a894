//! Sales order service
//!
//! Order creation closes the opportunity and emits the order confirmed
//! event. Transitions are gated by the shared transition table and may run
//! the fulfillment cascade inside the same transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::{Config, NotificationConfig};
use crate::error::{AppError, AppResult};
use crate::models::{decode, positive_decimal};
use crate::services::audit::AuditService;
use crate::services::notification::{NotificationService, OrderEvent};
use crate::services::opportunity::load_opportunity;
use crate::services::procurement::{recompute_project, run_fulfillment_cascade};
use shared::{
    is_fulfillment_project, plan_sales_order_transition, ActivityAction, ActivityRecord, Actor,
    DocumentBalance, DomainError, EntityType, GateFailure, OpportunityStatus, SalesOrder,
    SalesOrderSnapshot, SalesOrderStatus, Status, Tolerances,
};

/// Sales order service
#[derive(Clone)]
pub struct SalesOrderService {
    db: PgPool,
    tolerances: Tolerances,
    notifications: NotificationConfig,
}

#[derive(Debug, sqlx::FromRow)]
struct SalesOrderRow {
    id: Uuid,
    opportunity_id: Uuid,
    client_id: Uuid,
    total_amount: Option<Decimal>,
    status: String,
    fulfillment_notes: Option<String>,
    created_by: Uuid,
    updated_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SalesOrderRow> for SalesOrder {
    type Error = AppError;

    fn try_from(row: SalesOrderRow) -> Result<Self, Self::Error> {
        Ok(SalesOrder {
            id: row.id,
            opportunity_id: row.opportunity_id,
            client_id: row.client_id,
            total_amount: row.total_amount,
            status: decode(&row.status, "status", SalesOrderStatus::from_str)?,
            fulfillment_notes: row.fulfillment_notes,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SALES_ORDER_COLUMNS: &str = r#"
    id, opportunity_id, client_id, total_amount, status, fulfillment_notes,
    created_by, updated_by, created_at, updated_at
"#;

/// Input for converting an opportunity into an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSalesOrderInput {
    pub opportunity_id: Uuid,
    /// Defaults to the contract value implied by the opportunity's target price
    #[validate(custom = "positive_decimal")]
    pub total_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransitionSalesOrderInput {
    pub status: SalesOrderStatus,
    /// Justification, mandatory when goods or money do not reconcile
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

impl SalesOrderService {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            tolerances: config.reconciliation.tolerances(),
            notifications: config.notifications.clone(),
        }
    }

    /// Create the order for an opportunity and close the opportunity as won
    pub async fn create_from_opportunity(
        &self,
        actor: Actor,
        input: CreateSalesOrderInput,
    ) -> AppResult<SalesOrder> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let opportunity = load_opportunity(&mut *tx, input.opportunity_id, true).await?;
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(SELECT 1 FROM sales_orders WHERE opportunity_id = $1)",
        )
        .bind(opportunity.id)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Err(DomainError::from(GateFailure::OrderAlreadyExists).into());
        }
        if opportunity.status == OpportunityStatus::ClosedLost {
            return Err(AppError::validation(
                "opportunity_id",
                "A lost opportunity cannot be converted into an order",
            ));
        }

        let total_amount = input.total_amount.or_else(|| {
            opportunity
                .target_price
                .map(|price| opportunity.price_type.contract_value(price, opportunity.quantity))
        });

        let row = sqlx::query_as::<_, SalesOrderRow>(&format!(
            r#"
            INSERT INTO sales_orders (opportunity_id, client_id, total_amount, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {}
            "#,
            SALES_ORDER_COLUMNS
        ))
        .bind(opportunity.id)
        .bind(opportunity.client_id)
        .bind(total_amount)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let order = SalesOrder::try_from(row)?;

        sqlx::query(
            r#"
            UPDATE sales_opportunities
            SET status = 'CLOSED_WON', updated_by = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(opportunity.id)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await?;

        let recompute = match opportunity.procurement_project_id {
            Some(project_id) => Some(recompute_project(&mut *tx, project_id).await?),
            None => None,
        };

        tx.commit().await?;

        tracing::info!(
            sales_order_id = %order.id,
            opportunity_id = %opportunity.id,
            "Created sales order"
        );

        let mut records = vec![
            ActivityRecord::new(
                &actor,
                ActivityAction::Created,
                EntityType::SalesOrder,
                order.id,
                format!(
                    "Order for {} {} MT of {}",
                    opportunity.client_name, opportunity.quantity, opportunity.product_name
                ),
            ),
            ActivityRecord::status_change(
                &actor,
                EntityType::SalesOpportunity,
                opportunity.id,
                opportunity.status.as_str(),
                OpportunityStatus::ClosedWon.as_str(),
                None,
            ),
        ];
        records.extend(recompute.and_then(|r| r.activity(&actor)));
        AuditService::new(self.db.clone()).record_all(records).await;

        NotificationService::new(self.db.clone(), &self.notifications)
            .notify(OrderEvent::OrderConfirmed {
                sales_order_id: order.id,
                opportunity_id: opportunity.id,
                client_id: opportunity.client_id,
                client_name: opportunity.client_name.clone(),
                product_name: opportunity.product_name.clone(),
                total_amount: order.total_amount,
                confirmed_by: actor.user_id,
                confirmed_at: order.created_at,
            })
            .await;

        Ok(order)
    }

    /// Move an order to a new status, running the fulfillment cascade when it first enters production
    pub async fn transition(
        &self,
        actor: Actor,
        sales_order_id: Uuid,
        input: TransitionSalesOrderInput,
    ) -> AppResult<SalesOrder> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let order = load_sales_order(&mut *tx, sales_order_id, true).await?;
        let opportunity = load_opportunity(&mut *tx, order.opportunity_id, true).await?;
        let snapshot = load_snapshot(&mut *tx, &order, &opportunity).await?;

        let plan = plan_sales_order_transition(
            &snapshot,
            input.status,
            input.notes.as_deref(),
            &self.tolerances,
        )
        .map_err(|e| {
            tracing::debug!(
                %sales_order_id,
                from = order.status.as_str(),
                to = input.status.as_str(),
                "Sales order transition rejected: {}",
                e
            );
            e
        })?;

        let row = sqlx::query_as::<_, SalesOrderRow>(&format!(
            r#"
            UPDATE sales_orders SET
                status = $2,
                fulfillment_notes = COALESCE($3, fulfillment_notes),
                updated_by = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SALES_ORDER_COLUMNS
        ))
        .bind(sales_order_id)
        .bind(plan.to.as_str())
        .bind(&plan.notes)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let updated = SalesOrder::try_from(row)?;

        let cascade = if plan.trigger_fulfillment {
            Some(run_fulfillment_cascade(&mut *tx, actor, &opportunity).await?)
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!(
            %sales_order_id,
            from = plan.from.as_str(),
            to = plan.to.as_str(),
            overridden = plan.override_reason.is_some(),
            "Sales order transitioned"
        );

        let detail = match (&plan.override_reason, &plan.notes) {
            (Some(reason), Some(notes)) => Some(format!("{}; justified: {}", reason, notes)),
            (None, Some(notes)) => Some(notes.clone()),
            _ => None,
        };
        let mut records = vec![ActivityRecord::status_change(
            &actor,
            EntityType::SalesOrder,
            sales_order_id,
            plan.from.as_str(),
            plan.to.as_str(),
            detail.as_deref(),
        )];
        if let Some(cascade) = &cascade {
            let name =
                shared::fulfillment_project_name(&opportunity.product_name, &opportunity.client_name);
            records.extend(cascade.activities(&actor, &name));
        }
        AuditService::new(self.db.clone()).record_all(records).await;

        Ok(updated)
    }

    pub async fn get(&self, sales_order_id: Uuid) -> AppResult<SalesOrder> {
        let mut conn = self.db.acquire().await?;
        load_sales_order(&mut *conn, sales_order_id, false).await
    }

    pub async fn list(&self, status: Option<SalesOrderStatus>) -> AppResult<Vec<SalesOrder>> {
        let rows = sqlx::query_as::<_, SalesOrderRow>(&format!(
            r#"
            SELECT {}
            FROM sales_orders
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            SALES_ORDER_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(SalesOrder::try_from).collect()
    }
}

pub async fn load_sales_order(
    conn: &mut PgConnection,
    sales_order_id: Uuid,
    for_update: bool,
) -> AppResult<SalesOrder> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, SalesOrderRow>(&format!(
        "SELECT {} FROM sales_orders WHERE id = $1 {}",
        SALES_ORDER_COLUMNS, lock
    ))
    .bind(sales_order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Sales order"))?;

    SalesOrder::try_from(row)
}

/// Balances of an order's invoices, locked against concurrent payments
pub async fn load_invoice_balances(
    conn: &mut PgConnection,
    sales_order_id: Uuid,
    for_update: bool,
) -> AppResult<Vec<DocumentBalance>> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let rows = sqlx::query_as::<_, (Decimal, Decimal)>(&format!(
        "SELECT total_amount, pending_amount FROM invoices WHERE sales_order_id = $1 {}",
        lock
    ))
    .bind(sales_order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(total, pending)| DocumentBalance::new(total, pending))
        .collect())
}

async fn load_snapshot(
    conn: &mut PgConnection,
    order: &SalesOrder,
    opportunity: &shared::SalesOpportunity,
) -> AppResult<SalesOrderSnapshot> {
    let invoices = load_invoice_balances(&mut *conn, order.id, true).await?;

    let shipment_quantities: Vec<Decimal> = sqlx::query_as::<_, (Decimal,)>(
        "SELECT quantity FROM shipments WHERE sales_order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(q,)| q)
    .collect();

    let (direct_receipts,) = sqlx::query_as::<_, (Decimal,)>(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM transactions
        WHERE sales_order_id = $1 AND invoice_id IS NULL AND transaction_type = 'CREDIT'
        "#,
    )
    .bind(order.id)
    .fetch_one(&mut *conn)
    .await?;

    let has_fulfillment_project = match opportunity.procurement_project_id {
        Some(project_id) => sqlx::query_as::<_, (String,)>(
            "SELECT name FROM procurement_projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|(name,)| is_fulfillment_project(&name))
        .unwrap_or(false),
        None => false,
    };

    Ok(SalesOrderSnapshot {
        status: order.status,
        total_amount: order.total_amount,
        ordered_quantity: opportunity.quantity,
        invoices,
        shipment_quantities,
        direct_receipts,
        has_fulfillment_project,
    })
}
