//! Quote and margin calculator for a 100 kg reference batch

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Reference batch size the quote is costed on
pub const REFERENCE_BATCH_KG: Decimal = Decimal::ONE_HUNDRED;

/// Dryer power draw in units per hour
pub const DEFAULT_POWER_UNITS_PER_HOUR: Decimal = Decimal::from_parts(125, 0, 0, false, 1);

/// Cost inputs for one reference batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteInput {
    pub price_per_kg: Decimal,
    pub batch_hours: Decimal,
    pub electricity_rate: Decimal,
    #[serde(default)]
    pub power_units_per_hour: Option<Decimal>,
    pub laborers: u32,
    pub cost_per_laborer: Decimal,
    #[serde(default)]
    pub packaging_cost: Decimal,
    #[serde(default)]
    pub transport_cost: Decimal,
    pub yield_percentage: Decimal,
    pub margin_percentage: Decimal,
    pub gst_rate: Decimal,
}

/// Derived costs and selling prices
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteBreakdown {
    pub raw_material_cost: Decimal,
    pub power_cost: Decimal,
    pub labor_cost: Decimal,
    pub packaging_cost: Decimal,
    pub transport_cost: Decimal,
    pub production_cost: Decimal,
    pub output_weight_kg: Decimal,
    pub cost_per_kg: Decimal,
    pub price_ex_gst_per_kg: Decimal,
    pub gst_per_kg: Decimal,
    pub landing_price_per_kg: Decimal,
}

fn percent(value: Decimal) -> Option<Decimal> {
    value.checked_div(Decimal::ONE_HUNDRED)
}

/// Overflowed intermediate values are reported against the cost line they belong to
fn in_range(value: Option<Decimal>, field: &str) -> DomainResult<Decimal> {
    value.ok_or_else(|| DomainError::validation(field, "Value is too large to price"))
}

/// Price a reference batch. Zero output weight yields zero per-kg prices.
pub fn calculate_quote(input: &QuoteInput) -> DomainResult<QuoteBreakdown> {
    let raw_material_cost = in_range(
        input.price_per_kg.checked_mul(REFERENCE_BATCH_KG),
        "price_per_kg",
    )?;
    let units_per_hour = input
        .power_units_per_hour
        .unwrap_or(DEFAULT_POWER_UNITS_PER_HOUR);
    let power_cost = in_range(
        input
            .batch_hours
            .checked_mul(units_per_hour)
            .and_then(|v| v.checked_mul(input.electricity_rate)),
        "electricity_rate",
    )?;
    let labor_cost = in_range(
        Decimal::from(input.laborers).checked_mul(input.cost_per_laborer),
        "cost_per_laborer",
    )?;
    let production_cost = in_range(
        raw_material_cost
            .checked_add(power_cost)
            .and_then(|v| v.checked_add(labor_cost))
            .and_then(|v| v.checked_add(input.packaging_cost))
            .and_then(|v| v.checked_add(input.transport_cost)),
        "production_cost",
    )?;

    let output_weight_kg = in_range(
        percent(input.yield_percentage).and_then(|y| REFERENCE_BATCH_KG.checked_mul(y)),
        "yield_percentage",
    )?;

    let (cost_per_kg, price_ex_gst_per_kg) = if output_weight_kg.is_zero() {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        let cost_per_kg = in_range(production_cost.checked_div(output_weight_kg), "production_cost")?;
        let with_margin = percent(input.margin_percentage)
            .and_then(|m| (Decimal::ONE).checked_add(m))
            .and_then(|factor| production_cost.checked_mul(factor))
            .and_then(|v| v.checked_div(output_weight_kg));
        (cost_per_kg, in_range(with_margin, "margin_percentage")?)
    };
    let landing_price_per_kg = in_range(
        percent(input.gst_rate)
            .and_then(|g| Decimal::ONE.checked_add(g))
            .and_then(|factor| price_ex_gst_per_kg.checked_mul(factor)),
        "gst_rate",
    )?;

    Ok(QuoteBreakdown {
        raw_material_cost,
        power_cost,
        labor_cost,
        packaging_cost: input.packaging_cost,
        transport_cost: input.transport_cost,
        production_cost,
        output_weight_kg,
        cost_per_kg,
        price_ex_gst_per_kg,
        gst_per_kg: landing_price_per_kg - price_ex_gst_per_kg,
        landing_price_per_kg,
    })
}
