//! Quantity conversion service
//!
//! Loads the commodity -> variety -> form yield chain and converts a sales
//! quantity into the raw material that has to be procured.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::non_negative_decimal;
use shared::{
    compute_procurement_quantity, override_from_legacy, Commodity, CommodityVariety,
    ConversionResult, VarietyForm, YieldChain,
};

/// Quantity conversion service
#[derive(Clone)]
pub struct ConversionService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct CommodityRow {
    id: Uuid,
    name: String,
    yield_percentage: Decimal,
    wastage_percentage: Decimal,
}

impl From<CommodityRow> for Commodity {
    fn from(row: CommodityRow) -> Self {
        Commodity {
            id: row.id,
            name: row.name,
            yield_percentage: row.yield_percentage,
            wastage_percentage: row.wastage_percentage,
        }
    }
}

/// Shared row shape of varieties and forms
#[derive(Debug, sqlx::FromRow)]
struct OverrideRow {
    id: Uuid,
    parent_id: Uuid,
    name: String,
    yield_percentage: Option<Decimal>,
    wastage_percentage: Option<Decimal>,
}

impl From<OverrideRow> for CommodityVariety {
    fn from(row: OverrideRow) -> Self {
        CommodityVariety {
            id: row.id,
            commodity_id: row.parent_id,
            name: row.name,
            yield_percentage: override_from_legacy(row.yield_percentage),
            wastage_percentage: override_from_legacy(row.wastage_percentage),
        }
    }
}

impl From<OverrideRow> for VarietyForm {
    fn from(row: OverrideRow) -> Self {
        VarietyForm {
            id: row.id,
            variety_id: row.parent_id,
            name: row.name,
            yield_percentage: override_from_legacy(row.yield_percentage),
            wastage_percentage: override_from_legacy(row.wastage_percentage),
        }
    }
}

/// Input for a standalone conversion
#[derive(Debug, Deserialize, Validate)]
pub struct ConvertQuantityInput {
    #[validate(custom = "non_negative_decimal")]
    pub quantity: Decimal,
    pub commodity_id: Option<Uuid>,
    pub variety_id: Option<Uuid>,
    pub form_id: Option<Uuid>,
    pub manual_procurement_quantity: Option<Decimal>,
}

/// Commodity selection of an opportunity
#[derive(Debug, Clone, Copy, Default)]
pub struct CommoditySelection {
    pub commodity_id: Option<Uuid>,
    pub variety_id: Option<Uuid>,
    pub form_id: Option<Uuid>,
}

impl ConversionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Convert a sales quantity for the given selection
    pub async fn convert(&self, input: ConvertQuantityInput) -> AppResult<ConversionResult> {
        input.validate()?;

        let selection = CommoditySelection {
            commodity_id: input.commodity_id,
            variety_id: input.variety_id,
            form_id: input.form_id,
        };
        let mut conn = self.db.acquire().await?;
        let result = convert_quantity(
            &mut *conn,
            input.quantity,
            selection,
            input.manual_procurement_quantity,
        )
        .await?;

        result.ok_or_else(|| {
            AppError::validation(
                "commodity_id",
                "A commodity or a manual procurement quantity is required",
            )
        })
    }
}

/// Convert within an open connection or transaction.
///
/// Returns `None` when there is neither an override nor a commodity to
/// convert through; the raw quantity then stands in for demand.
pub async fn convert_quantity(
    conn: &mut PgConnection,
    quantity: Decimal,
    selection: CommoditySelection,
    manual_override: Option<Decimal>,
) -> AppResult<Option<ConversionResult>> {
    if manual_override.is_some() {
        let result = compute_procurement_quantity(quantity, manual_override, &YieldChain::default())?;
        return Ok(Some(result));
    }

    let Some(commodity_id) = selection.commodity_id else {
        return Ok(None);
    };

    let chain = load_chain(conn, commodity_id, selection.variety_id, selection.form_id).await?;
    let result = compute_procurement_quantity(quantity, None, &chain)?;

    tracing::debug!(
        %commodity_id,
        sales_quantity = %quantity,
        procurement_quantity = %result.procurement_quantity,
        source = ?result.source,
        "Converted sales quantity"
    );

    Ok(Some(result))
}

/// Load the yield chain, checking that the variety and form belong to their parents
pub async fn load_chain(
    conn: &mut PgConnection,
    commodity_id: Uuid,
    variety_id: Option<Uuid>,
    form_id: Option<Uuid>,
) -> AppResult<YieldChain> {
    let commodity: Commodity = sqlx::query_as::<_, CommodityRow>(
        "SELECT id, name, yield_percentage, wastage_percentage FROM commodities WHERE id = $1",
    )
    .bind(commodity_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Commodity"))?
    .into();

    let mut chain = YieldChain::from_commodity(&commodity);

    let Some(variety_id) = variety_id else {
        if form_id.is_some() {
            return Err(AppError::validation("form_id", "A form requires a variety"));
        }
        return Ok(chain);
    };

    let variety: CommodityVariety = sqlx::query_as::<_, OverrideRow>(
        r#"
        SELECT id, commodity_id AS parent_id, name, yield_percentage, wastage_percentage
        FROM commodity_varieties
        WHERE id = $1 AND commodity_id = $2
        "#,
    )
    .bind(variety_id)
    .bind(commodity_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::validation("variety_id", "Variety does not belong to the commodity"))?
    .into();
    chain = chain.with_variety(&variety);

    if let Some(form_id) = form_id {
        let form: VarietyForm = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT id, variety_id AS parent_id, name, yield_percentage, wastage_percentage
            FROM variety_forms
            WHERE id = $1 AND variety_id = $2
            "#,
        )
        .bind(form_id)
        .bind(variety_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::validation("form_id", "Form does not belong to the variety"))?
        .into();
        chain = chain.with_form(&form);
    }

    Ok(chain)
}
