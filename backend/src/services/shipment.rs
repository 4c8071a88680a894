//! Shipment and goods receipt service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{decode, non_negative_decimal};
use crate::services::audit::AuditService;
use crate::services::purchase_order::{bill_position, load_purchase_order};
use crate::services::sales_order::load_sales_order;
use shared::{
    check_grn_allowed, validate_grn_quantities, validate_tracking_number, ActivityAction,
    ActivityRecord, Actor, EntityType, Grn, GrnSnapshot, QualityCheckStatus, Shipment,
    ShipmentParty, ShipmentStatus, Status,
};

/// Shipment service
#[derive(Clone)]
pub struct ShipmentService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    purchase_order_id: Option<Uuid>,
    sales_order_id: Option<Uuid>,
    carrier: Option<String>,
    tracking_number: Option<String>,
    quantity: Decimal,
    eta: Option<NaiveDate>,
    actual_delivery_date: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = AppError;

    fn try_from(row: ShipmentRow) -> Result<Self, Self::Error> {
        Ok(Shipment {
            id: row.id,
            party: ShipmentParty::from_columns(row.purchase_order_id, row.sales_order_id)?,
            carrier: row.carrier,
            tracking_number: row.tracking_number,
            quantity: row.quantity,
            eta: row.eta,
            actual_delivery_date: row.actual_delivery_date,
            status: decode(&row.status, "status", ShipmentStatus::from_str)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GrnRow {
    id: Uuid,
    purchase_order_id: Uuid,
    total_received_quantity: Decimal,
    rejected_quantity: Decimal,
    accepted_quantity: Decimal,
    quality_check_status: String,
    notes: Option<String>,
    received_by: Uuid,
    received_at: DateTime<Utc>,
}

impl TryFrom<GrnRow> for Grn {
    type Error = AppError;

    fn try_from(row: GrnRow) -> Result<Self, Self::Error> {
        Ok(Grn {
            id: row.id,
            purchase_order_id: row.purchase_order_id,
            total_received_quantity: row.total_received_quantity,
            rejected_quantity: row.rejected_quantity,
            accepted_quantity: row.accepted_quantity,
            quality_check_status: decode(
                &row.quality_check_status,
                "quality_check_status",
                QualityCheckStatus::from_str,
            )?,
            notes: row.notes,
            received_by: row.received_by,
            received_at: row.received_at,
        })
    }
}

const SHIPMENT_COLUMNS: &str = r#"
    id, purchase_order_id, sales_order_id, carrier, tracking_number, quantity, eta,
    actual_delivery_date, status, created_at, updated_at
"#;

const GRN_COLUMNS: &str = r#"
    id, purchase_order_id, total_received_quantity, rejected_quantity, accepted_quantity,
    quality_check_status, notes, received_by, received_at
"#;

/// Input for creating a shipment
#[derive(Debug, Deserialize, Validate)]
pub struct CreateShipmentInput {
    #[serde(flatten)]
    pub party: ShipmentParty,
    #[validate(length(max = 200))]
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    #[validate(custom = "non_negative_decimal")]
    pub quantity: Decimal,
    pub eta: Option<NaiveDate>,
    /// Defaults to IN_TRANSIT
    pub status: Option<ShipmentStatus>,
}

/// Input for recording goods received against a purchase order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGrnInput {
    pub total_received_quantity: Decimal,
    #[serde(default)]
    pub rejected_quantity: Decimal,
    pub accepted_quantity: Decimal,
    #[serde(default)]
    pub quality_check_status: QualityCheckStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl ShipmentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an inbound or outbound shipment
    pub async fn create(&self, actor: Actor, input: CreateShipmentInput) -> AppResult<Shipment> {
        input.validate()?;
        validate_tracking_number(input.tracking_number.as_deref())
            .map_err(|msg| AppError::validation("tracking_number", msg))?;

        let mut tx = self.db.begin().await?;

        // Shipments are only raised against live documents
        let (owner_terminal, owner_label) = match input.party {
            ShipmentParty::Inbound { purchase_order_id } => {
                let order = load_purchase_order(&mut *tx, purchase_order_id, false).await?;
                (order.status.is_terminal(), order.status.as_str())
            }
            ShipmentParty::Outbound { sales_order_id } => {
                let order = load_sales_order(&mut *tx, sales_order_id, false).await?;
                (order.status.is_terminal(), order.status.as_str())
            }
        };
        if owner_terminal {
            return Err(AppError::validation(
                "party",
                format!("Cannot ship against an order that is {}", owner_label),
            ));
        }

        let (purchase_order_id, sales_order_id) = input.party.columns();
        let status = input.status.unwrap_or(ShipmentStatus::InTransit);

        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            INSERT INTO shipments (
                purchase_order_id, sales_order_id, carrier, tracking_number, quantity, eta,
                status, actual_delivery_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7 = 'DELIVERED' THEN NOW() END)
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(purchase_order_id)
        .bind(sales_order_id)
        .bind(&input.carrier)
        .bind(&input.tracking_number)
        .bind(input.quantity)
        .bind(input.eta)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let shipment = Shipment::try_from(row)?;

        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Created,
                EntityType::Shipment,
                shipment.id,
                format!("Shipment of {} created ({})", shipment.quantity, status.as_str()),
            ))
            .await;

        Ok(shipment)
    }

    /// Mark a shipment delivered, stamping the delivery date once
    pub async fn mark_delivered(&self, actor: Actor, shipment_id: Uuid) -> AppResult<Shipment> {
        let mut tx = self.db.begin().await?;

        let current = load_shipment(&mut *tx, shipment_id, true).await?;
        if current.status == ShipmentStatus::Delivered {
            return Ok(current);
        }

        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            UPDATE shipments
            SET status = 'DELIVERED', actual_delivery_date = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .fetch_one(&mut *tx)
        .await?;
        let shipment = Shipment::try_from(row)?;

        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::status_change(
                &actor,
                EntityType::Shipment,
                shipment_id,
                current.status.as_str(),
                shipment.status.as_str(),
                None,
            ))
            .await;

        Ok(shipment)
    }

    /// Record the goods receipt note for a purchase order.
    ///
    /// Requires a bill and every inbound shipment delivered; at most one per order.
    pub async fn create_grn(
        &self,
        actor: Actor,
        purchase_order_id: Uuid,
        input: CreateGrnInput,
    ) -> AppResult<Grn> {
        input.validate()?;
        validate_grn_quantities(
            input.total_received_quantity,
            input.accepted_quantity,
            input.rejected_quantity,
        )
        .map_err(|msg| AppError::validation("accepted_quantity", msg))?;

        let mut tx = self.db.begin().await?;

        load_purchase_order(&mut *tx, purchase_order_id, true).await?;

        let (has_grn,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(SELECT 1 FROM grns WHERE purchase_order_id = $1)",
        )
        .bind(purchase_order_id)
        .fetch_one(&mut *tx)
        .await?;
        let (bill_count, _) = bill_position(&mut *tx, purchase_order_id).await?;
        let shipment_statuses = load_party_statuses(
            &mut *tx,
            ShipmentParty::Inbound { purchase_order_id },
            true,
        )
        .await?;

        check_grn_allowed(&GrnSnapshot {
            has_grn,
            bill_count: usize::try_from(bill_count).unwrap_or(0),
            shipment_statuses,
        })?;

        let row = sqlx::query_as::<_, GrnRow>(&format!(
            r#"
            INSERT INTO grns (
                purchase_order_id, total_received_quantity, rejected_quantity,
                accepted_quantity, quality_check_status, notes, received_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            GRN_COLUMNS
        ))
        .bind(purchase_order_id)
        .bind(input.total_received_quantity)
        .bind(input.rejected_quantity)
        .bind(input.accepted_quantity)
        .bind(input.quality_check_status.as_str())
        .bind(&input.notes)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let grn = Grn::try_from(row)?;

        tx.commit().await?;

        tracing::info!(
            %purchase_order_id,
            accepted = %grn.accepted_quantity,
            rejected = %grn.rejected_quantity,
            "Goods received"
        );

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::GoodsReceived,
                EntityType::PurchaseOrder,
                purchase_order_id,
                format!(
                    "Received {}, accepted {}, rejected {} ({})",
                    grn.total_received_quantity,
                    grn.accepted_quantity,
                    grn.rejected_quantity,
                    grn.quality_check_status.as_str()
                ),
            ))
            .await;

        Ok(grn)
    }

    pub async fn get_grn(&self, purchase_order_id: Uuid) -> AppResult<Grn> {
        let row = sqlx::query_as::<_, GrnRow>(&format!(
            "SELECT {} FROM grns WHERE purchase_order_id = $1",
            GRN_COLUMNS
        ))
        .bind(purchase_order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Goods receipt note"))?;

        Grn::try_from(row)
    }

    /// Shipments of one purchase order or sales order
    pub async fn list(&self, party: ShipmentParty) -> AppResult<Vec<Shipment>> {
        let mut conn = self.db.acquire().await?;
        list_for_party(&mut *conn, party).await
    }
}

async fn load_shipment(
    conn: &mut PgConnection,
    shipment_id: Uuid,
    for_update: bool,
) -> AppResult<Shipment> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, ShipmentRow>(&format!(
        "SELECT {} FROM shipments WHERE id = $1 {}",
        SHIPMENT_COLUMNS, lock
    ))
    .bind(shipment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Shipment"))?;

    Shipment::try_from(row)
}

pub async fn list_for_party(conn: &mut PgConnection, party: ShipmentParty) -> AppResult<Vec<Shipment>> {
    let (purchase_order_id, sales_order_id) = party.columns();
    let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
        r#"
        SELECT {}
        FROM shipments
        WHERE ($1::UUID IS NOT NULL AND purchase_order_id = $1)
           OR ($2::UUID IS NOT NULL AND sales_order_id = $2)
        ORDER BY created_at
        "#,
        SHIPMENT_COLUMNS
    ))
    .bind(purchase_order_id)
    .bind(sales_order_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Shipment::try_from).collect()
}

/// Statuses of a document's shipments, optionally locked
pub async fn load_party_statuses(
    conn: &mut PgConnection,
    party: ShipmentParty,
    for_update: bool,
) -> AppResult<Vec<ShipmentStatus>> {
    let (purchase_order_id, sales_order_id) = party.columns();
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let rows = sqlx::query_as::<_, (String,)>(&format!(
        r#"
        SELECT status
        FROM shipments
        WHERE ($1::UUID IS NOT NULL AND purchase_order_id = $1)
           OR ($2::UUID IS NOT NULL AND sales_order_id = $2)
        {}
        "#,
        lock
    ))
    .bind(purchase_order_id)
    .bind(sales_order_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(status,)| decode(&status, "status", ShipmentStatus::from_str))
        .collect()
}
