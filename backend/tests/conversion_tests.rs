//! Quantity conversion and quote calculator tests
//!
//! - Yield precedence form > variety > commodity
//! - Manual override bypasses the chain
//! - Conversion is deterministic and independent of wastage

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    calculate_quote, compute_procurement_quantity, override_from_legacy, project_demand,
    Commodity, CommodityVariety, DemandLine, DomainError, GateFailure, OpportunityStatus,
    QuoteInput, VarietyForm, YieldChain, YieldSource,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn commodity(yield_pct: &str) -> Commodity {
    Commodity {
        id: Uuid::new_v4(),
        name: "Turmeric".to_string(),
        yield_percentage: dec(yield_pct),
        wastage_percentage: dec("3"),
    }
}

fn variety(parent: &Commodity, yield_pct: Option<&str>) -> CommodityVariety {
    CommodityVariety {
        id: Uuid::new_v4(),
        commodity_id: parent.id,
        name: "Salem".to_string(),
        yield_percentage: yield_pct.map(dec),
        wastage_percentage: None,
    }
}

fn form(parent: &CommodityVariety, yield_pct: Option<&str>) -> VarietyForm {
    VarietyForm {
        id: Uuid::new_v4(),
        variety_id: parent.id,
        name: "Powder".to_string(),
        yield_percentage: yield_pct.map(dec),
        wastage_percentage: Some(dec("7")),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_form_yield_wins() {
        let c = commodity("80");
        let v = variety(&c, Some("50"));
        let f = form(&v, Some("25"));
        let chain = YieldChain::from_commodity(&c).with_variety(&v).with_form(&f);

        let result = compute_procurement_quantity(dec("10"), None, &chain).unwrap();
        assert_eq!(result.procurement_quantity, dec("40"));
        assert_eq!(result.source, YieldSource::Form);
        assert_eq!(result.wastage_percentage, Some(dec("7")));
    }

    #[test]
    fn test_form_without_override_inherits_variety() {
        let c = commodity("80");
        let v = variety(&c, Some("50"));
        let f = form(&v, None);
        let chain = YieldChain::from_commodity(&c).with_variety(&v).with_form(&f);

        let result = compute_procurement_quantity(dec("10"), None, &chain).unwrap();
        assert_eq!(result.procurement_quantity, dec("20"));
        assert_eq!(result.source, YieldSource::Variety);
    }

    #[test]
    fn test_legacy_zero_override_inherits() {
        assert_eq!(override_from_legacy(Some(Decimal::ZERO)), None);
        assert_eq!(override_from_legacy(Some(dec("60"))), Some(dec("60")));
        assert_eq!(override_from_legacy(None), None);
    }

    #[test]
    fn test_manual_override_is_verbatim() {
        let chain = YieldChain::from_commodity(&commodity("0"));
        let result = compute_procurement_quantity(dec("10"), Some(dec("13.7")), &chain).unwrap();
        assert_eq!(result.procurement_quantity, dec("13.7"));
        assert_eq!(result.source, YieldSource::ManualOverride);
        assert!(result.yield_percentage.is_none());
    }

    #[test]
    fn test_zero_yield_rejected() {
        let chain = YieldChain::from_commodity(&commodity("0"));
        let err = compute_procurement_quantity(dec("10"), None, &chain).unwrap_err();
        assert_eq!(
            err,
            DomainError::PreconditionNotMet(GateFailure::InvalidYield {
                yield_percentage: Decimal::ZERO,
            })
        );
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let chain = YieldChain::from_commodity(&commodity("80"));
        assert!(matches!(
            compute_procurement_quantity(dec("-1"), None, &chain),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_demand_uses_procurement_quantity_of_open_and_won() {
        let lines = [
            DemandLine {
                status: OpportunityStatus::Open,
                quantity: dec("10"),
                procurement_quantity: Some(dec("12.5")),
            },
            DemandLine {
                status: OpportunityStatus::ClosedWon,
                quantity: dec("2"),
                procurement_quantity: None,
            },
            DemandLine {
                status: OpportunityStatus::ClosedLost,
                quantity: dec("50"),
                procurement_quantity: Some(dec("60")),
            },
        ];
        assert_eq!(project_demand(&lines), dec("14.5"));
    }

    #[test]
    fn test_quote_landing_price() {
        let quote = calculate_quote(&QuoteInput {
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
        })
        .unwrap();
        assert_eq!(quote.production_cost, dec("4100"));
        assert_eq!(quote.landing_price_per_kg, dec("103.32"));
    }

    #[test]
    fn test_quote_with_huge_inputs_is_a_validation_error() {
        let quote = calculate_quote(&QuoteInput {
            price_per_kg: Decimal::MAX,
            batch_hours: Decimal::MAX,
            electricity_rate: Decimal::MAX,
            power_units_per_hour: None,
            laborers: u32::MAX,
            cost_per_laborer: Decimal::MAX,
            packaging_cost: Decimal::MAX,
            transport_cost: Decimal::MAX,
            yield_percentage: dec("100"),
            margin_percentage: Decimal::MAX,
            gst_rate: dec("100"),
        });
        assert!(matches!(quote, Err(DomainError::Validation { .. })));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn yield_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000i64).prop_map(|bp| Decimal::new(bp, 2))
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000i64).prop_map(|milli| Decimal::new(milli, 3))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Converting twice with the same inputs gives the same answer
    #[test]
    fn test_conversion_is_deterministic(
        quantity in quantity_strategy(),
        yield_pct in yield_strategy()
    ) {
        let mut c = commodity("1");
        c.yield_percentage = yield_pct;
        let chain = YieldChain::from_commodity(&c);
        let first = compute_procurement_quantity(quantity, None, &chain).unwrap();
        let second = compute_procurement_quantity(quantity, None, &chain).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Wastage is reported but never changes the procurement quantity
    #[test]
    fn test_wastage_does_not_affect_quantity(
        quantity in quantity_strategy(),
        yield_pct in yield_strategy(),
        wastage_a in 0i64..=100i64,
        wastage_b in 0i64..=100i64
    ) {
        let mut a = commodity("1");
        a.yield_percentage = yield_pct;
        a.wastage_percentage = Decimal::from(wastage_a);
        let mut b = a.clone();
        b.wastage_percentage = Decimal::from(wastage_b);

        let qa = compute_procurement_quantity(quantity, None, &YieldChain::from_commodity(&a)).unwrap();
        let qb = compute_procurement_quantity(quantity, None, &YieldChain::from_commodity(&b)).unwrap();
        prop_assert_eq!(qa.procurement_quantity, qb.procurement_quantity);
    }

    /// Procurement never falls below the sales quantity when yield is at most 100%
    #[test]
    fn test_procurement_covers_sales(
        quantity in quantity_strategy(),
        yield_pct in yield_strategy()
    ) {
        let mut c = commodity("1");
        c.yield_percentage = yield_pct;
        let result = compute_procurement_quantity(quantity, None, &YieldChain::from_commodity(&c)).unwrap();
        prop_assert!(result.procurement_quantity >= quantity);
    }
}
