//! Procurement project service
//!
//! Owns the fulfillment cascade and the demand/supply recompute that
//! auto-completes projects. Both run inside the caller's transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::decode;
use crate::services::audit::AuditService;
use crate::services::opportunity::load_samples;
use crate::services::purchase_order::list_for_project;
use shared::{
    fulfillment_project_name, next_project_status, project_demand, project_supply,
    vendors_to_link, ActivityAction, ActivityRecord, Actor, DemandLine, EntityType,
    OpportunityStatus, ProcurementProject, ProjectStatus, ProjectType, ProjectVendor,
    PurchaseOrder, PurchaseOrderStatus, QuantityUnit, SalesOpportunity, SupplyLine,
};

/// Procurement project service
#[derive(Clone)]
pub struct ProcurementService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    project_type: String,
    status: String,
    commodity_id: Option<Uuid>,
    variety_id: Option<Uuid>,
    created_by: Uuid,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for ProcurementProject {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(ProcurementProject {
            id: row.id,
            name: row.name,
            project_type: decode(&row.project_type, "project_type", ProjectType::from_str)?,
            status: decode(&row.status, "status", ProjectStatus::from_str)?,
            commodity_id: row.commodity_id,
            variety_id: row.variety_id,
            created_by: row.created_by,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectVendorRow {
    project_id: Uuid,
    vendor_id: Uuid,
    linked_by: Uuid,
    linked_at: DateTime<Utc>,
}

impl From<ProjectVendorRow> for ProjectVendor {
    fn from(row: ProjectVendorRow) -> Self {
        ProjectVendor {
            project_id: row.project_id,
            vendor_id: row.vendor_id,
            linked_by: row.linked_by,
            linked_at: row.linked_at,
        }
    }
}

const PROJECT_COLUMNS: &str = r#"
    id, name, project_type, status, commodity_id, variety_id, created_by,
    completed_at, created_at, updated_at
"#;

/// Input for creating a project by hand
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub project_type: ProjectType,
    pub commodity_id: Option<Uuid>,
    pub variety_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct LinkVendorInput {
    pub vendor_id: Uuid,
}

/// Project with its vendors, orders and demand/supply position
#[derive(Debug, Serialize)]
pub struct ProjectOverview {
    pub project: ProcurementProject,
    pub vendors: Vec<ProjectVendor>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub demand: Decimal,
    pub supply: Decimal,
}

/// Result of recomputing a project's status
#[derive(Debug, Clone, Copy)]
pub struct ProjectRecompute {
    pub project_id: Uuid,
    pub before: ProjectStatus,
    pub after: ProjectStatus,
    pub demand: Decimal,
    pub supply: Decimal,
}

impl ProjectRecompute {
    pub fn completed_now(&self) -> bool {
        self.before == ProjectStatus::Sourcing && self.after == ProjectStatus::Completed
    }

    /// Audit entry for an automatic completion
    pub fn activity(&self, actor: &Actor) -> Option<ActivityRecord> {
        self.completed_now().then(|| {
            ActivityRecord::status_change(
                actor,
                EntityType::ProcurementProject,
                self.project_id,
                self.before.as_str(),
                self.after.as_str(),
                Some(format!("supply {} MT meets demand {} MT", self.supply, self.demand).as_str()),
            )
        })
    }
}

/// What the fulfillment cascade created
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub project_id: Uuid,
    pub linked_vendors: Vec<Uuid>,
    pub recompute: ProjectRecompute,
}

impl CascadeOutcome {
    pub fn activities(&self, actor: &Actor, project_name: &str) -> Vec<ActivityRecord> {
        let mut records = vec![ActivityRecord::new(
            actor,
            ActivityAction::Created,
            EntityType::ProcurementProject,
            self.project_id,
            format!("Fulfillment project '{}' created", project_name),
        )];
        records.extend(self.linked_vendors.iter().map(|vendor_id| {
            ActivityRecord::new(
                actor,
                ActivityAction::VendorLinked,
                EntityType::ProcurementProject,
                self.project_id,
                format!("Vendor {} linked from approved sample", vendor_id),
            )
        }));
        records.extend(self.recompute.activity(actor));
        records
    }
}

impl ProcurementService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a project manually
    pub async fn create_project(
        &self,
        actor: Actor,
        input: CreateProjectInput,
    ) -> AppResult<ProcurementProject> {
        input.validate()?;

        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            INSERT INTO procurement_projects (name, project_type, commodity_id, variety_id, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(input.project_type.as_str())
        .bind(input.commodity_id)
        .bind(input.variety_id)
        .bind(actor.user_id)
        .fetch_one(&self.db)
        .await?;
        let project = ProcurementProject::try_from(row)?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Created,
                EntityType::ProcurementProject,
                project.id,
                format!("Project '{}' created", project.name),
            ))
            .await;

        Ok(project)
    }

    /// Link a vendor to a project; linking twice is a no-op
    pub async fn link_vendor(
        &self,
        actor: Actor,
        project_id: Uuid,
        input: LinkVendorInput,
    ) -> AppResult<Vec<ProjectVendor>> {
        let mut tx = self.db.begin().await?;
        load_project(&mut *tx, project_id, false).await?;

        let inserted = insert_vendor_links(&mut *tx, actor, project_id, &[input.vendor_id]).await?;
        let vendors = load_vendors(&mut *tx, project_id).await?;

        tx.commit().await?;

        if !inserted.is_empty() {
            AuditService::new(self.db.clone())
                .record(ActivityRecord::new(
                    &actor,
                    ActivityAction::VendorLinked,
                    EntityType::ProcurementProject,
                    project_id,
                    format!("Vendor {} linked", input.vendor_id),
                ))
                .await;
        }

        Ok(vendors)
    }

    /// Project with vendors, purchase orders and the demand/supply position
    pub async fn get_project(&self, project_id: Uuid) -> AppResult<ProjectOverview> {
        let mut conn = self.db.acquire().await?;
        let project = load_project(&mut *conn, project_id, false).await?;
        let vendors = load_vendors(&mut *conn, project_id).await?;
        let purchase_orders = list_for_project(&mut *conn, project_id).await?;
        let demand = project_demand(&load_demand_lines(&mut *conn, project_id).await?);
        let supply = project_supply(&load_supply_lines(&mut *conn, project_id).await?, None);

        Ok(ProjectOverview {
            project,
            vendors,
            purchase_orders,
            demand,
            supply,
        })
    }

    pub async fn list_projects(&self, status: Option<ProjectStatus>) -> AppResult<Vec<ProcurementProject>> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT {}
            FROM procurement_projects
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            PROJECT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProcurementProject::try_from).collect()
    }

    /// Re-evaluate completion on demand
    pub async fn recompute(&self, actor: Actor, project_id: Uuid) -> AppResult<ProcurementProject> {
        let mut tx = self.db.begin().await?;
        let outcome = recompute_project(&mut *tx, project_id).await?;
        let project = load_project(&mut *tx, project_id, false).await?;
        tx.commit().await?;

        if let Some(record) = outcome.activity(&actor) {
            AuditService::new(self.db.clone()).record(record).await;
        }

        Ok(project)
    }
}

pub async fn load_project(
    conn: &mut PgConnection,
    project_id: Uuid,
    for_update: bool,
) -> AppResult<ProcurementProject> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {} FROM procurement_projects WHERE id = $1 {}",
        PROJECT_COLUMNS, lock
    ))
    .bind(project_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Procurement project"))?;

    ProcurementProject::try_from(row)
}

async fn load_vendors(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Vec<ProjectVendor>> {
    let rows = sqlx::query_as::<_, ProjectVendorRow>(
        r#"
        SELECT project_id, vendor_id, linked_by, linked_at
        FROM project_vendors
        WHERE project_id = $1
        ORDER BY linked_at
        "#,
    )
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(ProjectVendor::from).collect())
}

/// Insert vendor links, returning the vendors that were not linked before
async fn insert_vendor_links(
    conn: &mut PgConnection,
    actor: Actor,
    project_id: Uuid,
    vendor_ids: &[Uuid],
) -> AppResult<Vec<Uuid>> {
    let mut inserted = Vec::new();
    for vendor_id in vendor_ids {
        let result = sqlx::query(
            r#"
            INSERT INTO project_vendors (project_id, vendor_id, linked_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, vendor_id) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(vendor_id)
        .bind(actor.user_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            inserted.push(*vendor_id);
        }
    }
    Ok(inserted)
}

/// Demand contributions of the project's opportunities
pub async fn load_demand_lines(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Vec<DemandLine>> {
    let rows = sqlx::query_as::<_, (String, Decimal, Option<Decimal>)>(
        r#"
        SELECT status, quantity, procurement_quantity
        FROM sales_opportunities
        WHERE procurement_project_id = $1
        "#,
    )
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(status, quantity, procurement_quantity)| {
            Ok(DemandLine {
                status: decode(&status, "status", OpportunityStatus::from_str)?,
                quantity,
                procurement_quantity,
            })
        })
        .collect()
}

/// Supply contributions of the project's purchase orders
pub async fn load_supply_lines(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Vec<SupplyLine>> {
    let rows = sqlx::query_as::<_, (Uuid, String, Decimal, String)>(
        "SELECT id, status, quantity, quantity_unit FROM purchase_orders WHERE project_id = $1",
    )
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(purchase_order_id, status, quantity, unit)| {
            Ok(SupplyLine {
                purchase_order_id,
                status: decode(&status, "status", PurchaseOrderStatus::from_str)?,
                quantity,
                unit: decode(&unit, "quantity_unit", QuantityUnit::from_str)?,
            })
        })
        .collect()
}

/// Recompute demand and supply and complete the project when supply covers demand.
///
/// Locks the project row. Completion is never undone here.
pub async fn recompute_project(conn: &mut PgConnection, project_id: Uuid) -> AppResult<ProjectRecompute> {
    let project = load_project(&mut *conn, project_id, true).await?;
    let demand = project_demand(&load_demand_lines(&mut *conn, project_id).await?);
    let supply = project_supply(&load_supply_lines(&mut *conn, project_id).await?, None);

    let after = next_project_status(project.status, demand, supply);
    let outcome = ProjectRecompute {
        project_id,
        before: project.status,
        after,
        demand,
        supply,
    };

    if outcome.completed_now() {
        mark_completed(&mut *conn, project_id).await?;
        tracing::info!(
            %project_id,
            demand = %demand,
            supply = %supply,
            "Procurement project completed"
        );
    }

    Ok(outcome)
}

pub async fn mark_completed(conn: &mut PgConnection, project_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE procurement_projects
        SET status = 'COMPLETED', completed_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status = 'SOURCING'
        "#,
    )
    .bind(project_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Create the fulfillment project for an opportunity and link approved sample vendors
pub async fn run_fulfillment_cascade(
    conn: &mut PgConnection,
    actor: Actor,
    opportunity: &SalesOpportunity,
) -> AppResult<CascadeOutcome> {
    let name = fulfillment_project_name(&opportunity.product_name, &opportunity.client_name);

    let (project_id,) = sqlx::query_as::<_, (Uuid,)>(
        r#"
        INSERT INTO procurement_projects (name, project_type, status, commodity_id, variety_id, created_by)
        VALUES ($1, 'PROJECT', 'SOURCING', $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(&name)
    .bind(opportunity.commodity_id)
    .bind(opportunity.variety_id)
    .bind(actor.user_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE sales_opportunities
        SET procurement_project_id = $2, updated_by = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(opportunity.id)
    .bind(project_id)
    .bind(actor.user_id)
    .execute(&mut *conn)
    .await?;

    let samples = load_samples(&mut *conn, opportunity.id).await?;
    let already_linked: Vec<Uuid> = load_vendors(&mut *conn, project_id)
        .await?
        .into_iter()
        .map(|v| v.vendor_id)
        .collect();
    let to_link = vendors_to_link(&samples, &already_linked);
    let linked_vendors = insert_vendor_links(&mut *conn, actor, project_id, &to_link).await?;

    let recompute = recompute_project(&mut *conn, project_id).await?;

    tracing::info!(
        %project_id,
        opportunity_id = %opportunity.id,
        vendors = linked_vendors.len(),
        "Fulfillment cascade created project '{}'",
        name
    );

    Ok(CascadeOutcome {
        project_id,
        linked_vendors,
        recompute,
    })
}
