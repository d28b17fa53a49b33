use std::sync::Arc;

use proptest::prelude::{prop_assert, prop_assert_eq, proptest};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tax_core::calculations::{CurrentRegime, LegacyRegime, TaxRegime, apply_slabs, merge_slabs};
use tax_core::{ComputationCache, Slab, SlabOverride, SlabTables, TaxCalculationInput, TaxEngine};

fn slabs_2025() -> Vec<Slab> {
    vec![
        Slab::bounded(dec!(0), dec!(400000), dec!(0)),
        Slab::bounded(dec!(400000), dec!(800000), dec!(0.05)),
        Slab::bounded(dec!(800000), dec!(1200000), dec!(0.10)),
        Slab::bounded(dec!(1200000), dec!(1600000), dec!(0.15)),
        Slab::bounded(dec!(1600000), dec!(2000000), dec!(0.20)),
        Slab::bounded(dec!(2000000), dec!(2400000), dec!(0.25)),
        Slab::unbounded(dec!(2400000), dec!(0.30)),
    ]
}

fn engine(regime: Arc<dyn TaxRegime>) -> TaxEngine {
    let mut tables = SlabTables::new();
    tables.insert(2025, slabs_2025()).unwrap();
    TaxEngine::new(Arc::new(tables), regime)
}

fn rupees(amount: u32) -> Decimal {
    Decimal::from(amount)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    #[test]
    fn prop_breakdown_covers_income_with_unbounded_top(income in 0u32..10_000_000) {
        let income = rupees(income);

        let application = apply_slabs(income, &slabs_2025()).unwrap();

        let covered: Decimal = application.breakdown.iter().map(|row| row.taxable).sum();
        let taxed: Decimal = application.breakdown.iter().map(|row| row.tax).sum();
        prop_assert_eq!(covered, income);
        prop_assert_eq!(taxed, application.tax);
    }

    #[test]
    fn prop_breakdown_never_exceeds_income_with_bounded_top(income in 0u32..10_000_000) {
        let income = rupees(income);
        let slabs = vec![
            Slab::bounded(dec!(100000), dec!(500000), dec!(0.05)),
            Slab::bounded(dec!(500000), dec!(900000), dec!(0.2)),
        ];

        let application = apply_slabs(income, &slabs).unwrap();

        let covered: Decimal = application.breakdown.iter().map(|row| row.taxable).sum();
        prop_assert!(covered <= income);
    }

    #[test]
    fn prop_current_tax_is_monotonic_in_ctc(low in 0u32..8_000_000, step in 0u32..500_000) {
        let engine = engine(Arc::new(CurrentRegime::default()));
        let lower = TaxCalculationInput::new(2025, rupees(low));
        let higher = TaxCalculationInput::new(2025, rupees(low) + rupees(step));

        let lower = engine.calculate(&lower).unwrap();
        let higher = engine.calculate(&higher).unwrap();

        prop_assert!(
            higher.total_tax_payable >= lower.total_tax_payable,
            "tax fell from {} to {}",
            lower.total_tax_payable,
            higher.total_tax_payable
        );
    }

    #[test]
    fn prop_legacy_tax_is_monotonic_in_ctc(low in 0u32..8_000_000, step in 0u32..500_000) {
        let engine = engine(Arc::new(LegacyRegime::default()));
        let lower = TaxCalculationInput::new(2025, rupees(low));
        let higher = TaxCalculationInput::new(2025, rupees(low) + rupees(step));

        let lower = engine.calculate(&lower).unwrap();
        let higher = engine.calculate(&higher).unwrap();

        prop_assert!(higher.total_tax_payable >= lower.total_tax_payable);
    }

    #[test]
    fn prop_current_post_tax_identity(ctc in 0u32..10_000_000, hike in -100i32..200) {
        let engine = engine(Arc::new(CurrentRegime::default()));
        let input = TaxCalculationInput::new(2025, rupees(ctc)).with_hike(Decimal::from(hike));

        let result = engine.calculate(&input).unwrap();

        prop_assert!(result.total_tax_payable >= Decimal::ZERO);
        prop_assert_eq!(result.annual_post_tax, result.taxable_income - result.total_tax_payable);
        prop_assert_eq!(result.total_tax_payable, result.tax_after_relief() + result.cess);
    }

    #[test]
    fn prop_legacy_post_tax_identity(ctc in 0u32..10_000_000) {
        let engine = engine(Arc::new(LegacyRegime::default()));
        let input = TaxCalculationInput::new(2025, rupees(ctc));

        let result = engine.calculate(&input).unwrap();

        prop_assert!(result.total_tax_payable >= Decimal::ZERO);
        prop_assert_eq!(result.annual_post_tax, result.fixed_pay - result.total_tax_payable);
    }

    #[test]
    fn prop_repeated_call_is_a_cache_hit(ctc in 0u32..10_000_000, hike in 0u32..50) {
        let engine = engine(Arc::new(CurrentRegime::default()));
        let cache = ComputationCache::new();
        let input = TaxCalculationInput::new(2025, rupees(ctc)).with_hike(rupees(hike));

        let first = cache.get_or_compute(&engine, &input).unwrap();
        let second = cache.get_or_compute(&engine, &input).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(cache.computations(), 1);
    }

    #[test]
    fn prop_rate_only_override_changes_only_first_rate(rate_bp in 0u32..=10_000) {
        let defaults = slabs_2025();
        let rate = Decimal::new(i64::from(rate_bp), 4);

        let merged = merge_slabs(
            &defaults,
            Some(&[SlabOverride::rate_only(&rate.to_string())]),
        )
        .unwrap();

        prop_assert_eq!(merged.len(), defaults.len());
        prop_assert_eq!(merged[0].start, defaults[0].start);
        prop_assert_eq!(merged[0].end, defaults[0].end);
        prop_assert_eq!(merged[0].rate, rate);
        prop_assert_eq!(&merged[1..], &defaults[1..]);
    }
}
