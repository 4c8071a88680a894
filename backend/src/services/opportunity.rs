//! Sales opportunity and sample submission service
//!
//! Keeps the derived procurement quantity current and recomputes the linked
//! procurement project whenever the opportunity's demand changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{decode, non_negative_decimal};
use crate::services::audit::AuditService;
use crate::services::conversion::{convert_quantity, CommoditySelection};
use crate::services::procurement::recompute_project;
use shared::{
    ActivityAction, ActivityRecord, Actor, EntityType, GateFailure, OpportunityStatus, PriceType,
    SalesOpportunity, SampleApprovalStatus, SampleSubmission,
};

/// Opportunity service
#[derive(Clone)]
pub struct OpportunityService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct OpportunityRow {
    id: Uuid,
    client_id: Uuid,
    client_name: String,
    product_name: String,
    target_price: Option<Decimal>,
    price_type: String,
    quantity: Decimal,
    commodity_id: Option<Uuid>,
    variety_id: Option<Uuid>,
    form_id: Option<Uuid>,
    manual_procurement_quantity: Option<Decimal>,
    procurement_quantity: Option<Decimal>,
    status: String,
    procurement_project_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OpportunityRow> for SalesOpportunity {
    type Error = AppError;

    fn try_from(row: OpportunityRow) -> Result<Self, Self::Error> {
        Ok(SalesOpportunity {
            id: row.id,
            client_id: row.client_id,
            client_name: row.client_name,
            product_name: row.product_name,
            target_price: row.target_price,
            price_type: decode(&row.price_type, "price_type", PriceType::from_str)?,
            quantity: row.quantity,
            commodity_id: row.commodity_id,
            variety_id: row.variety_id,
            form_id: row.form_id,
            manual_procurement_quantity: row.manual_procurement_quantity,
            procurement_quantity: row.procurement_quantity,
            status: decode(&row.status, "status", OpportunityStatus::from_str)?,
            procurement_project_id: row.procurement_project_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SampleRow {
    id: Uuid,
    opportunity_id: Uuid,
    vendor_id: Uuid,
    approval_status: String,
    notes: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl TryFrom<SampleRow> for SampleSubmission {
    type Error = AppError;

    fn try_from(row: SampleRow) -> Result<Self, Self::Error> {
        Ok(SampleSubmission {
            id: row.id,
            opportunity_id: row.opportunity_id,
            vendor_id: row.vendor_id,
            approval_status: decode(
                &row.approval_status,
                "approval_status",
                SampleApprovalStatus::from_str,
            )?,
            notes: row.notes,
            submitted_at: row.submitted_at,
        })
    }
}

const OPPORTUNITY_COLUMNS: &str = r#"
    id, client_id, client_name, product_name, target_price, price_type, quantity,
    commodity_id, variety_id, form_id, manual_procurement_quantity, procurement_quantity,
    status, procurement_project_id, created_at, updated_at
"#;

/// Input for creating an opportunity
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOpportunityInput {
    pub client_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub client_name: String,
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    #[validate(custom = "non_negative_decimal")]
    pub target_price: Option<Decimal>,
    #[serde(default)]
    pub price_type: PriceType,
    /// Quantity in metric tons
    #[validate(custom = "non_negative_decimal")]
    pub quantity: Decimal,
    pub commodity_id: Option<Uuid>,
    pub variety_id: Option<Uuid>,
    pub form_id: Option<Uuid>,
    #[validate(custom = "non_negative_decimal")]
    pub manual_procurement_quantity: Option<Decimal>,
    pub procurement_project_id: Option<Uuid>,
}

/// Input for updating an opportunity; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOpportunityInput {
    #[validate(custom = "non_negative_decimal")]
    pub target_price: Option<Decimal>,
    pub price_type: Option<PriceType>,
    #[validate(custom = "non_negative_decimal")]
    pub quantity: Option<Decimal>,
    pub commodity_id: Option<Uuid>,
    pub variety_id: Option<Uuid>,
    pub form_id: Option<Uuid>,
    #[validate(custom = "non_negative_decimal")]
    pub manual_procurement_quantity: Option<Decimal>,
    /// Drop the manual override and go back to the yield chain
    #[serde(default)]
    pub clear_manual_procurement_quantity: bool,
    /// Drop the variety (and its form) and fall back to the commodity default
    #[serde(default)]
    pub clear_variety: bool,
    /// Drop the form and fall back to the variety or commodity
    #[serde(default)]
    pub clear_form: bool,
}

impl UpdateOpportunityInput {
    /// Merge the requested commodity selection over the current one
    fn selection(&self, current: &SalesOpportunity) -> CommoditySelection {
        let commodity_changed =
            self.commodity_id.is_some() && self.commodity_id != current.commodity_id;
        // A new commodity invalidates the old variety and form unless they were resent
        let keep_variety = !commodity_changed && !self.clear_variety;
        let keep_form = keep_variety && !self.clear_form;

        let variety_id = if self.clear_variety {
            None
        } else {
            self.variety_id
                .or(if keep_variety { current.variety_id } else { None })
        };
        let form_id = if self.clear_variety || self.clear_form {
            None
        } else {
            self.form_id.or(if keep_form { current.form_id } else { None })
        };

        CommoditySelection {
            commodity_id: self.commodity_id.or(current.commodity_id),
            variety_id,
            form_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetOpportunityStatusInput {
    pub status: OpportunityStatus,
}

#[derive(Debug, Deserialize)]
pub struct LinkProjectInput {
    pub project_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddSampleInput {
    pub vendor_id: Uuid,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetSampleStatusInput {
    pub approval_status: SampleApprovalStatus,
}

impl OpportunityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an opportunity and compute its procurement quantity
    pub async fn create(
        &self,
        actor: Actor,
        input: CreateOpportunityInput,
    ) -> AppResult<SalesOpportunity> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let selection = CommoditySelection {
            commodity_id: input.commodity_id,
            variety_id: input.variety_id,
            form_id: input.form_id,
        };
        let conversion = convert_quantity(
            &mut *tx,
            input.quantity,
            selection,
            input.manual_procurement_quantity,
        )
        .await?;

        let row = sqlx::query_as::<_, OpportunityRow>(&format!(
            r#"
            INSERT INTO sales_opportunities (
                client_id, client_name, product_name, target_price, price_type, quantity,
                commodity_id, variety_id, form_id, manual_procurement_quantity,
                procurement_quantity, procurement_project_id, created_by, updated_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {}
            "#,
            OPPORTUNITY_COLUMNS
        ))
        .bind(input.client_id)
        .bind(input.client_name.trim())
        .bind(input.product_name.trim())
        .bind(input.target_price)
        .bind(input.price_type.as_str())
        .bind(input.quantity)
        .bind(input.commodity_id)
        .bind(input.variety_id)
        .bind(input.form_id)
        .bind(input.manual_procurement_quantity)
        .bind(conversion.map(|c| c.procurement_quantity))
        .bind(input.procurement_project_id)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let opportunity = SalesOpportunity::try_from(row)?;

        let mut records = vec![ActivityRecord::new(
            &actor,
            ActivityAction::Created,
            EntityType::SalesOpportunity,
            opportunity.id,
            format!(
                "Opportunity for {} {} MT of {}",
                opportunity.client_name, opportunity.quantity, opportunity.product_name
            ),
        )];
        if let Some(project_id) = opportunity.procurement_project_id {
            let outcome = recompute_project(&mut *tx, project_id).await?;
            records.extend(outcome.activity(&actor));
        }

        tx.commit().await?;

        tracing::info!(opportunity_id = %opportunity.id, "Created sales opportunity");
        AuditService::new(self.db.clone()).record_all(records).await;

        Ok(opportunity)
    }

    /// Update quantity, pricing or commodity selection and recompute derived demand
    pub async fn update(
        &self,
        actor: Actor,
        opportunity_id: Uuid,
        input: UpdateOpportunityInput,
    ) -> AppResult<SalesOpportunity> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let current = load_opportunity(&mut *tx, opportunity_id, true).await?;
        ensure_no_order(&mut *tx, opportunity_id).await?;

        let quantity = input.quantity.unwrap_or(current.quantity);
        let selection = input.selection(&current);
        let manual_override = if input.clear_manual_procurement_quantity {
            None
        } else {
            input
                .manual_procurement_quantity
                .or(current.manual_procurement_quantity)
        };

        let conversion = convert_quantity(&mut *tx, quantity, selection, manual_override).await?;

        let row = sqlx::query_as::<_, OpportunityRow>(&format!(
            r#"
            UPDATE sales_opportunities SET
                target_price = $2,
                price_type = $3,
                quantity = $4,
                commodity_id = $5,
                variety_id = $6,
                form_id = $7,
                manual_procurement_quantity = $8,
                procurement_quantity = $9,
                updated_by = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            OPPORTUNITY_COLUMNS
        ))
        .bind(opportunity_id)
        .bind(input.target_price.or(current.target_price))
        .bind(input.price_type.unwrap_or(current.price_type).as_str())
        .bind(quantity)
        .bind(selection.commodity_id)
        .bind(selection.variety_id)
        .bind(selection.form_id)
        .bind(manual_override)
        .bind(conversion.map(|c| c.procurement_quantity))
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let opportunity = SalesOpportunity::try_from(row)?;

        let mut records = vec![ActivityRecord::new(
            &actor,
            ActivityAction::Updated,
            EntityType::SalesOpportunity,
            opportunity_id,
            format!(
                "Procurement quantity {} MT for {} MT sold",
                opportunity.demand_quantity(),
                opportunity.quantity
            ),
        )];
        if let Some(project_id) = opportunity.procurement_project_id {
            let outcome = recompute_project(&mut *tx, project_id).await?;
            records.extend(outcome.activity(&actor));
        }

        tx.commit().await?;

        AuditService::new(self.db.clone()).record_all(records).await;

        Ok(opportunity)
    }

    /// Move the opportunity through its pipeline
    pub async fn set_status(
        &self,
        actor: Actor,
        opportunity_id: Uuid,
        input: SetOpportunityStatusInput,
    ) -> AppResult<SalesOpportunity> {
        let mut tx = self.db.begin().await?;

        let current = load_opportunity(&mut *tx, opportunity_id, true).await?;
        ensure_no_order(&mut *tx, opportunity_id).await?;

        let row = sqlx::query_as::<_, OpportunityRow>(&format!(
            r#"
            UPDATE sales_opportunities SET status = $2, updated_by = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            OPPORTUNITY_COLUMNS
        ))
        .bind(opportunity_id)
        .bind(input.status.as_str())
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let opportunity = SalesOpportunity::try_from(row)?;

        let mut records = vec![ActivityRecord::status_change(
            &actor,
            EntityType::SalesOpportunity,
            opportunity_id,
            current.status.as_str(),
            opportunity.status.as_str(),
            None,
        )];
        if let Some(project_id) = opportunity.procurement_project_id {
            let outcome = recompute_project(&mut *tx, project_id).await?;
            records.extend(outcome.activity(&actor));
        }

        tx.commit().await?;

        AuditService::new(self.db.clone()).record_all(records).await;

        Ok(opportunity)
    }

    /// Attach the opportunity's demand to a procurement project
    pub async fn link_to_project(
        &self,
        actor: Actor,
        opportunity_id: Uuid,
        input: LinkProjectInput,
    ) -> AppResult<SalesOpportunity> {
        let mut tx = self.db.begin().await?;

        let current = load_opportunity(&mut *tx, opportunity_id, true).await?;
        ensure_no_order(&mut *tx, opportunity_id).await?;

        let row = sqlx::query_as::<_, OpportunityRow>(&format!(
            r#"
            UPDATE sales_opportunities
            SET procurement_project_id = $2, updated_by = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            OPPORTUNITY_COLUMNS
        ))
        .bind(opportunity_id)
        .bind(input.project_id)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let opportunity = SalesOpportunity::try_from(row)?;

        let mut records = vec![ActivityRecord::new(
            &actor,
            ActivityAction::Updated,
            EntityType::SalesOpportunity,
            opportunity_id,
            format!("Linked to procurement project {}", input.project_id),
        )];

        // Both the old and the new project saw their opportunity set change
        let mut projects = vec![input.project_id];
        if let Some(previous) = current.procurement_project_id {
            if previous != input.project_id {
                projects.push(previous);
            }
        }
        for project_id in projects {
            let outcome = recompute_project(&mut *tx, project_id).await?;
            records.extend(outcome.activity(&actor));
        }

        tx.commit().await?;

        AuditService::new(self.db.clone()).record_all(records).await;

        Ok(opportunity)
    }

    pub async fn get(&self, opportunity_id: Uuid) -> AppResult<SalesOpportunity> {
        let mut conn = self.db.acquire().await?;
        load_opportunity(&mut *conn, opportunity_id, false).await
    }

    pub async fn list(&self, status: Option<OpportunityStatus>) -> AppResult<Vec<SalesOpportunity>> {
        let rows = sqlx::query_as::<_, OpportunityRow>(&format!(
            r#"
            SELECT {}
            FROM sales_opportunities
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            OPPORTUNITY_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(SalesOpportunity::try_from).collect()
    }

    /// Record a vendor sample against an opportunity
    pub async fn add_sample(
        &self,
        actor: Actor,
        opportunity_id: Uuid,
        input: AddSampleInput,
    ) -> AppResult<SampleSubmission> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        load_opportunity(&mut *tx, opportunity_id, false).await?;

        let row = sqlx::query_as::<_, SampleRow>(
            r#"
            INSERT INTO sample_submissions (opportunity_id, vendor_id, notes)
            VALUES ($1, $2, $3)
            RETURNING id, opportunity_id, vendor_id, approval_status, notes, submitted_at
            "#,
        )
        .bind(opportunity_id)
        .bind(input.vendor_id)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;
        let sample = SampleSubmission::try_from(row)?;

        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Created,
                EntityType::SampleSubmission,
                sample.id,
                format!("Sample from vendor {} submitted", sample.vendor_id),
            ))
            .await;

        Ok(sample)
    }

    /// Record the client's verdict on a sample
    pub async fn set_sample_status(
        &self,
        actor: Actor,
        sample_id: Uuid,
        input: SetSampleStatusInput,
    ) -> AppResult<SampleSubmission> {
        let previous = sqlx::query_as::<_, (String,)>(
            "SELECT approval_status FROM sample_submissions WHERE id = $1",
        )
        .bind(sample_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Sample submission"))?;

        let row = sqlx::query_as::<_, SampleRow>(
            r#"
            UPDATE sample_submissions SET approval_status = $2
            WHERE id = $1
            RETURNING id, opportunity_id, vendor_id, approval_status, notes, submitted_at
            "#,
        )
        .bind(sample_id)
        .bind(input.approval_status.as_str())
        .fetch_one(&self.db)
        .await?;
        let sample = SampleSubmission::try_from(row)?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::status_change(
                &actor,
                EntityType::SampleSubmission,
                sample_id,
                &previous.0,
                sample.approval_status.as_str(),
                None,
            ))
            .await;

        Ok(sample)
    }

    pub async fn list_samples(&self, opportunity_id: Uuid) -> AppResult<Vec<SampleSubmission>> {
        let mut conn = self.db.acquire().await?;
        load_samples(&mut *conn, opportunity_id).await
    }
}

/// Load an opportunity, optionally locking it for the rest of the transaction
pub async fn load_opportunity(
    conn: &mut PgConnection,
    opportunity_id: Uuid,
    for_update: bool,
) -> AppResult<SalesOpportunity> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, OpportunityRow>(&format!(
        "SELECT {} FROM sales_opportunities WHERE id = $1 {}",
        OPPORTUNITY_COLUMNS, lock
    ))
    .bind(opportunity_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Sales opportunity"))?;

    SalesOpportunity::try_from(row)
}

pub async fn load_samples(
    conn: &mut PgConnection,
    opportunity_id: Uuid,
) -> AppResult<Vec<SampleSubmission>> {
    let rows = sqlx::query_as::<_, SampleRow>(
        r#"
        SELECT id, opportunity_id, vendor_id, approval_status, notes, submitted_at
        FROM sample_submissions
        WHERE opportunity_id = $1
        ORDER BY submitted_at
        "#,
    )
    .bind(opportunity_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(SampleSubmission::try_from).collect()
}

/// Opportunities are frozen once an order exists
async fn ensure_no_order(conn: &mut PgConnection, opportunity_id: Uuid) -> AppResult<()> {
    let (exists,) = sqlx::query_as::<_, (bool,)>(
        "SELECT EXISTS(SELECT 1 FROM sales_orders WHERE opportunity_id = $1)",
    )
    .bind(opportunity_id)
    .fetch_one(&mut *conn)
    .await?;

    if exists {
        return Err(shared::DomainError::from(GateFailure::OrderAlreadyExists).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity() -> SalesOpportunity {
        SalesOpportunity {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            client_name: "Acme Foods".to_string(),
            product_name: "Garlic flakes".to_string(),
            target_price: None,
            price_type: PriceType::default(),
            quantity: Decimal::from(10),
            commodity_id: Some(Uuid::new_v4()),
            variety_id: Some(Uuid::new_v4()),
            form_id: Some(Uuid::new_v4()),
            manual_procurement_quantity: None,
            procurement_quantity: None,
            status: OpportunityStatus::Open,
            procurement_project_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_selection_keeps_current_chain() {
        let current = opportunity();
        let selection = UpdateOpportunityInput::default().selection(&current);
        assert_eq!(selection.commodity_id, current.commodity_id);
        assert_eq!(selection.variety_id, current.variety_id);
        assert_eq!(selection.form_id, current.form_id);
    }

    #[test]
    fn test_clear_variety_falls_back_to_commodity() {
        let current = opportunity();
        let input = UpdateOpportunityInput {
            clear_variety: true,
            ..Default::default()
        };
        let selection = input.selection(&current);
        assert_eq!(selection.commodity_id, current.commodity_id);
        assert_eq!(selection.variety_id, None);
        assert_eq!(selection.form_id, None);
    }

    #[test]
    fn test_clear_form_keeps_variety() {
        let current = opportunity();
        let input = UpdateOpportunityInput {
            clear_form: true,
            ..Default::default()
        };
        let selection = input.selection(&current);
        assert_eq!(selection.variety_id, current.variety_id);
        assert_eq!(selection.form_id, None);
    }

    #[test]
    fn test_new_commodity_drops_old_variety() {
        let current = opportunity();
        let input = UpdateOpportunityInput {
            commodity_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let selection = input.selection(&current);
        assert_eq!(selection.variety_id, None);
        assert_eq!(selection.form_id, None);
    }
}
