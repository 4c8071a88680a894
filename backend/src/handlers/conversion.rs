//! HTTP handlers for the quantity conversion and quote calculator

use axum::{extract::State, Json};
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};
use crate::services::conversion::{ConversionService, ConvertQuantityInput};
use crate::AppState;
use shared::{calculate_quote, validate_non_negative, validate_percentage, ConversionResult, QuoteBreakdown, QuoteInput};

/// Convert a sales quantity into the procurement quantity
pub async fn convert_quantity(
    State(state): State<AppState>,
    Json(input): Json<ConvertQuantityInput>,
) -> AppResult<Json<ConversionResult>> {
    let service = ConversionService::new(state.db);
    let result = service.convert(input).await?;
    Ok(Json(result))
}

/// Price a 100 kg reference batch
pub async fn calculate_quote_handler(Json(input): Json<QuoteInput>) -> AppResult<Json<QuoteBreakdown>> {
    validate_quote(&input)?;
    Ok(Json(calculate_quote(&input)?))
}

fn validate_quote(input: &QuoteInput) -> AppResult<()> {
    let percentages = [
        ("yield_percentage", input.yield_percentage),
        ("gst_rate", input.gst_rate),
    ];
    for (field, value) in percentages {
        validate_percentage(value).map_err(|msg| AppError::validation(field, msg))?;
    }

    let amounts = [
        ("price_per_kg", input.price_per_kg),
        ("batch_hours", input.batch_hours),
        ("electricity_rate", input.electricity_rate),
        ("power_units_per_hour", input.power_units_per_hour.unwrap_or(Decimal::ZERO)),
        ("cost_per_laborer", input.cost_per_laborer),
        ("packaging_cost", input.packaging_cost),
        ("transport_cost", input.transport_cost),
        ("margin_percentage", input.margin_percentage),
    ];
    for (field, value) in amounts {
        validate_non_negative(value).map_err(|msg| AppError::validation(field, msg))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn input() -> QuoteInput {
        QuoteInput {
            price_per_kg: dec("20"),
            batch_hours: dec("8"),
            electricity_rate: dec("10"),
            power_units_per_hour: None,
            laborers: 2,
            cost_per_laborer: dec("500"),
            packaging_cost: dec("100"),
            transport_cost: Decimal::ZERO,
            yield_percentage: dec("50"),
            margin_percentage: dec("20"),
            gst_rate: dec("5"),
        }
    }

    #[test]
    fn test_validate_quote_accepts_reference_input() {
        assert!(validate_quote(&input()).is_ok());
    }

    #[test]
    fn test_validate_quote_rejects_yield_above_hundred() {
        let mut i = input();
        i.yield_percentage = dec("120");
        assert!(validate_quote(&i).is_err());
    }

    #[test]
    fn test_validate_quote_allows_margin_above_hundred() {
        let mut i = input();
        i.margin_percentage = dec("150");
        assert!(validate_quote(&i).is_ok());
    }

    #[test]
    fn test_validate_quote_rejects_negative_cost() {
        let mut i = input();
        i.transport_cost = dec("-1");
        assert!(validate_quote(&i).is_err());
    }
}
