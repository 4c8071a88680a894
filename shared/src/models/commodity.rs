//! Commodity yield hierarchy and the sales-to-procurement quantity conversion

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult, GateFailure};

/// A traded commodity with its default yield and wastage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commodity {
    pub id: Uuid,
    pub name: String,
    pub yield_percentage: Decimal,
    pub wastage_percentage: Decimal,
}

/// A variety of a commodity; `None` inherits from the commodity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommodityVariety {
    pub id: Uuid,
    pub commodity_id: Uuid,
    pub name: String,
    pub yield_percentage: Option<Decimal>,
    pub wastage_percentage: Option<Decimal>,
}

/// A product form of a variety (e.g. powder, flakes); `None` inherits from the variety
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarietyForm {
    pub id: Uuid,
    pub variety_id: Uuid,
    pub name: String,
    pub yield_percentage: Option<Decimal>,
    pub wastage_percentage: Option<Decimal>,
}

/// Map a stored override to its explicit form.
///
/// Legacy rows use 0 to mean "inherit from the parent level".
pub fn override_from_legacy(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| !v.is_zero())
}

/// Which level of the hierarchy supplied a resolved percentage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum YieldSource {
    Form,
    Variety,
    Commodity,
    ManualOverride,
}

/// The yield/wastage chain for one commodity, variety and form selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YieldChain {
    pub commodity_yield: Decimal,
    pub commodity_wastage: Decimal,
    pub variety_yield: Option<Decimal>,
    pub variety_wastage: Option<Decimal>,
    pub form_yield: Option<Decimal>,
    pub form_wastage: Option<Decimal>,
}

impl YieldChain {
    pub fn from_commodity(commodity: &Commodity) -> Self {
        Self {
            commodity_yield: commodity.yield_percentage,
            commodity_wastage: commodity.wastage_percentage,
            ..Default::default()
        }
    }

    pub fn with_variety(mut self, variety: &CommodityVariety) -> Self {
        self.variety_yield = variety.yield_percentage;
        self.variety_wastage = variety.wastage_percentage;
        self
    }

    pub fn with_form(mut self, form: &VarietyForm) -> Self {
        self.form_yield = form.yield_percentage;
        self.form_wastage = form.wastage_percentage;
        self
    }

    /// Resolve yield%: form, then variety, then commodity
    pub fn resolve_yield(&self) -> (Decimal, YieldSource) {
        resolve(self.form_yield, self.variety_yield, self.commodity_yield)
    }

    /// Resolve wastage% with the same precedence. Advisory only.
    pub fn resolve_wastage(&self) -> (Decimal, YieldSource) {
        resolve(self.form_wastage, self.variety_wastage, self.commodity_wastage)
    }
}

fn resolve(
    form: Option<Decimal>,
    variety: Option<Decimal>,
    commodity: Decimal,
) -> (Decimal, YieldSource) {
    match (form, variety) {
        (Some(value), _) => (value, YieldSource::Form),
        (None, Some(value)) => (value, YieldSource::Variety),
        (None, None) => (commodity, YieldSource::Commodity),
    }
}

/// Result of a quantity conversion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionResult {
    pub sales_quantity: Decimal,
    pub procurement_quantity: Decimal,
    pub yield_percentage: Option<Decimal>,
    pub wastage_percentage: Option<Decimal>,
    pub source: YieldSource,
}

/// Convert a sales quantity into the raw material that must be procured.
///
/// `procurement = sales * (100 / yield%)`. A manual override is returned
/// verbatim without consulting the chain.
pub fn compute_procurement_quantity(
    sales_quantity: Decimal,
    manual_override: Option<Decimal>,
    chain: &YieldChain,
) -> DomainResult<ConversionResult> {
    if sales_quantity < Decimal::ZERO {
        return Err(DomainError::validation(
            "quantity",
            "Sales quantity cannot be negative",
        ));
    }

    if let Some(quantity) = manual_override {
        if quantity < Decimal::ZERO {
            return Err(DomainError::validation(
                "manual_procurement_quantity",
                "Override quantity cannot be negative",
            ));
        }
        return Ok(ConversionResult {
            sales_quantity,
            procurement_quantity: quantity,
            yield_percentage: None,
            wastage_percentage: None,
            source: YieldSource::ManualOverride,
        });
    }

    let (yield_percentage, source) = chain.resolve_yield();
    if yield_percentage <= Decimal::ZERO {
        return Err(GateFailure::InvalidYield { yield_percentage }.into());
    }
    let (wastage_percentage, _) = chain.resolve_wastage();

    let procurement_quantity = sales_quantity * (Decimal::ONE_HUNDRED / yield_percentage);

    Ok(ConversionResult {
        sales_quantity,
        procurement_quantity: procurement_quantity.normalize(),
        yield_percentage: Some(yield_percentage),
        wastage_percentage: Some(wastage_percentage),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn chain(commodity: &str) -> YieldChain {
        YieldChain {
            commodity_yield: dec(commodity),
            commodity_wastage: dec("5"),
            ..Default::default()
        }
    }

    #[test]
    fn test_commodity_default_yield() {
        let result = compute_procurement_quantity(dec("10"), None, &chain("80")).unwrap();
        assert_eq!(result.procurement_quantity, dec("12.5"));
        assert_eq!(result.source, YieldSource::Commodity);
    }

    #[test]
    fn test_form_overrides_variety_and_commodity() {
        let mut c = chain("80");
        c.variety_yield = Some(dec("50"));
        c.form_yield = Some(dec("25"));
        let result = compute_procurement_quantity(dec("10"), None, &c).unwrap();
        assert_eq!(result.procurement_quantity, dec("40"));
        assert_eq!(result.source, YieldSource::Form);
    }

    #[test]
    fn test_variety_overrides_commodity() {
        let mut c = chain("80");
        c.variety_yield = Some(dec("50"));
        let result = compute_procurement_quantity(dec("10"), None, &c).unwrap();
        assert_eq!(result.procurement_quantity, dec("20"));
        assert_eq!(result.source, YieldSource::Variety);
    }

    #[test]
    fn test_manual_override_is_verbatim() {
        let result =
            compute_procurement_quantity(dec("10"), Some(dec("17.3")), &chain("0")).unwrap();
        assert_eq!(result.procurement_quantity, dec("17.3"));
        assert_eq!(result.source, YieldSource::ManualOverride);
    }

    #[test]
    fn test_zero_yield_rejected() {
        let err = compute_procurement_quantity(dec("10"), None, &chain("0")).unwrap_err();
        assert_eq!(err.code(), "INVALID_YIELD");
    }

    #[test]
    fn test_explicit_zero_variety_is_not_inherit() {
        let mut c = chain("80");
        c.variety_yield = Some(Decimal::ZERO);
        assert!(compute_procurement_quantity(dec("10"), None, &c).is_err());
    }

    #[test]
    fn test_legacy_zero_means_inherit() {
        assert_eq!(override_from_legacy(Some(Decimal::ZERO)), None);
        assert_eq!(override_from_legacy(Some(dec("70"))), Some(dec("70")));
        assert_eq!(override_from_legacy(None), None);
    }

    #[test]
    fn test_wastage_is_advisory() {
        let mut c = chain("80");
        let first = compute_procurement_quantity(dec("10"), None, &c).unwrap();
        c.commodity_wastage = dec("30");
        c.form_wastage = Some(dec("12"));
        let second = compute_procurement_quantity(dec("10"), None, &c).unwrap();
        assert_eq!(first.procurement_quantity, second.procurement_quantity);
        assert_eq!(second.wastage_percentage, Some(dec("12")));
    }
}
