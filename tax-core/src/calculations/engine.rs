//! Slab resolution plus regime dispatch for one computation.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::calculations::merge::resolve_slabs;
use crate::calculations::regime::TaxRegime;
use crate::models::{Slab, SlabError, SlabTables, TaxCalculationInput, TaxCalculationResult};

/// Errors raised while validating input, resolving slabs or summing tax.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalculationError {
    #[error(transparent)]
    Slab(#[from] SlabError),

    #[error("CTC must be non-negative, got {0}")]
    NegativeCtc(Decimal),

    #[error("hike percent must be at least -100, got {0}")]
    InvalidHike(Decimal),

    #[error("adjusted CTC overflows for CTC {base_ctc} with hike {hike_percent}%")]
    Overflow {
        base_ctc: Decimal,
        hike_percent: Decimal,
    },

    #[error("tax on taxable income {taxable_income} overflows")]
    TaxOverflow { taxable_income: Decimal },
}

/// Applies a percentage hike: `base × (1 + hike / 100)`.
///
/// # Errors
///
/// Returns [`CalculationError::Overflow`] when the product does not fit in a
/// `Decimal`.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::adjusted_ctc;
///
/// assert_eq!(adjusted_ctc(dec!(1000000), dec!(10)).unwrap(), dec!(1100000));
/// assert_eq!(adjusted_ctc(dec!(1000000), dec!(-25)).unwrap(), dec!(750000));
/// ```
pub fn adjusted_ctc(
    base_ctc: Decimal,
    hike_percent: Decimal,
) -> Result<Decimal, CalculationError> {
    let overflow = || CalculationError::Overflow {
        base_ctc,
        hike_percent,
    };

    let multiplier = (hike_percent / Decimal::ONE_HUNDRED)
        .checked_add(Decimal::ONE)
        .ok_or_else(overflow)?;
    base_ctc.checked_mul(multiplier).ok_or_else(overflow)
}

/// Computes tax for one regime against a fixed set of default tables.
#[derive(Debug, Clone)]
pub struct TaxEngine {
    tables: Arc<SlabTables>,
    regime: Arc<dyn TaxRegime>,
}

impl TaxEngine {
    pub fn new(
        tables: Arc<SlabTables>,
        regime: Arc<dyn TaxRegime>,
    ) -> Self {
        Self { tables, regime }
    }

    pub fn regime(&self) -> &dyn TaxRegime {
        self.regime.as_ref()
    }

    pub fn tables(&self) -> &SlabTables {
        &self.tables
    }

    /// The effective table for `input`: its overrides merged over the year's
    /// defaults, or its overrides alone when the year has none.
    pub fn resolve_slabs(
        &self,
        input: &TaxCalculationInput,
    ) -> Result<Vec<Slab>, CalculationError> {
        let slabs = resolve_slabs(
            self.tables.get(input.year),
            input.custom_slabs.as_deref(),
        )?;
        Ok(slabs)
    }

    /// Runs a full computation for `input`.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError`] for a negative CTC, a hike below -100%,
    /// malformed slab overrides, or amounts too large for a `Decimal`.
    pub fn calculate(
        &self,
        input: &TaxCalculationInput,
    ) -> Result<TaxCalculationResult, CalculationError> {
        let slabs = self.resolve_slabs(input)?;
        self.calculate_with_slabs(input, &slabs)
    }

    /// Runs a computation against an already resolved table, ignoring
    /// `input.custom_slabs`.
    #[instrument(skip_all, fields(year = input.year, regime = %self.regime.kind()))]
    pub fn calculate_with_slabs(
        &self,
        input: &TaxCalculationInput,
        slabs: &[Slab],
    ) -> Result<TaxCalculationResult, CalculationError> {
        if input.base_ctc < Decimal::ZERO {
            return Err(CalculationError::NegativeCtc(input.base_ctc));
        }
        if input.hike_percent < -Decimal::ONE_HUNDRED {
            return Err(CalculationError::InvalidHike(input.hike_percent));
        }

        let new_ctc = adjusted_ctc(input.base_ctc, input.hike_percent)?;
        debug!(
            base_ctc = %input.base_ctc,
            hike_percent = %input.hike_percent,
            new_ctc = %new_ctc,
            slabs = slabs.len(),
            "computing tax"
        );

        self.regime.compute(input.year, new_ctc, slabs)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::regime::{CurrentRegime, LegacyRegime};
    use crate::models::{Regime, SlabField, SlabOverride};

    fn tables() -> Arc<SlabTables> {
        let mut tables = SlabTables::new();
        tables
            .insert(
                2025,
                vec![
                    Slab::bounded(dec!(0), dec!(400000), dec!(0)),
                    Slab::bounded(dec!(400000), dec!(800000), dec!(0.05)),
                    Slab::bounded(dec!(800000), dec!(1200000), dec!(0.10)),
                    Slab::bounded(dec!(1200000), dec!(1600000), dec!(0.15)),
                    Slab::bounded(dec!(1600000), dec!(2000000), dec!(0.20)),
                    Slab::bounded(dec!(2000000), dec!(2400000), dec!(0.25)),
                    Slab::unbounded(dec!(2400000), dec!(0.30)),
                ],
            )
            .unwrap();
        Arc::new(tables)
    }

    fn current_engine() -> TaxEngine {
        TaxEngine::new(tables(), Arc::new(CurrentRegime::default()))
    }

    fn legacy_engine() -> TaxEngine {
        TaxEngine::new(tables(), Arc::new(LegacyRegime::default()))
    }

    // =========================================================================
    // adjusted_ctc tests
    // =========================================================================

    #[test]
    fn adjusted_ctc_without_hike_is_unchanged() {
        assert_eq!(adjusted_ctc(dec!(1275000), Decimal::ZERO).unwrap(), dec!(1275000));
    }

    #[test]
    fn adjusted_ctc_full_cut_is_zero() {
        assert_eq!(adjusted_ctc(dec!(1275000), dec!(-100)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn adjusted_ctc_reports_overflow() {
        let result = adjusted_ctc(Decimal::MAX, dec!(50));

        assert_eq!(
            result,
            Err(CalculationError::Overflow {
                base_ctc: Decimal::MAX,
                hike_percent: dec!(50),
            })
        );
    }

    // =========================================================================
    // calculate tests
    // =========================================================================

    #[test]
    fn calculate_applies_hike_before_regime() {
        let input = TaxCalculationInput::new(2025, dec!(1000000)).with_hike(dec!(10));

        let result = legacy_engine().calculate(&input).unwrap();

        assert_eq!(result.new_ctc, dec!(1100000));
        assert_eq!(result.fixed_pay, dec!(968000));
        assert_eq!(result.regime, Regime::Legacy);
    }

    #[test]
    fn calculate_uses_year_defaults() {
        let input = TaxCalculationInput::new(2025, dec!(3150000));

        let result = current_engine().calculate(&input).unwrap();

        assert_eq!(result.total_tax_payable, dec!(522600));
    }

    #[test]
    fn calculate_merges_rate_override() {
        let input = TaxCalculationInput::new(2025, dec!(1000000))
            .with_custom_slabs(vec![
                SlabOverride::default(),
                SlabOverride::rate_only("0.10"),
            ]);

        let result = legacy_engine().calculate(&input).unwrap();

        // Taxable 805,000: 40,000 in the second slab plus 500 in the third.
        assert_eq!(result.total_tax_payable, dec!(40500));
    }

    #[test]
    fn calculate_year_without_defaults_uses_custom_table() {
        let input = TaxCalculationInput::new(2030, dec!(1000000))
            .with_custom_slabs(vec![
                SlabOverride::new(Some("0"), Some("500000"), Some("0")),
                SlabOverride::new(Some("500000"), None, Some("0.1")),
            ]);

        let result = legacy_engine().calculate(&input).unwrap();

        assert_eq!(result.taxable_income, dec!(805000));
        assert_eq!(result.total_tax_payable, dec!(30500));
    }

    #[test]
    fn calculate_year_without_defaults_or_overrides_is_untaxed() {
        let input = TaxCalculationInput::new(2030, dec!(5000000));

        let result = current_engine().calculate(&input).unwrap();

        assert_eq!(result.total_tax_payable, Decimal::ZERO);
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn calculate_rejects_negative_ctc() {
        let input = TaxCalculationInput::new(2025, dec!(-1));

        assert_eq!(
            current_engine().calculate(&input),
            Err(CalculationError::NegativeCtc(dec!(-1)))
        );
    }

    #[test]
    fn calculate_rejects_hike_below_minus_hundred() {
        let input = TaxCalculationInput::new(2025, dec!(1000000)).with_hike(dec!(-100.5));

        assert_eq!(
            current_engine().calculate(&input),
            Err(CalculationError::InvalidHike(dec!(-100.5)))
        );
    }

    #[test]
    fn calculate_surfaces_slab_errors() {
        let input = TaxCalculationInput::new(2030, dec!(1000000))
            .with_custom_slabs(vec![SlabOverride::new(Some("0"), None, None)]);

        assert_eq!(
            current_engine().calculate(&input),
            Err(CalculationError::Slab(SlabError::MissingField {
                slab: 1,
                field: SlabField::Rate,
            }))
        );
    }

    #[test]
    fn calculate_overlapping_table_with_huge_ctc_is_an_overflow() {
        let ctc = Decimal::from_i128_with_scale(70_000_000_000_000_000_000_000_000_000, 0);
        let input = TaxCalculationInput::new(2030, ctc).with_custom_slabs(vec![
            SlabOverride::new(Some("0"), Some("60000000000000000000000000000"), Some("1")),
            SlabOverride::new(Some("0"), None, Some("1")),
        ]);

        let result = legacy_engine().calculate(&input);

        assert!(matches!(result, Err(CalculationError::TaxOverflow { .. })));
    }

    #[test]
    fn calculate_rejects_unordered_custom_table() {
        let input = TaxCalculationInput::new(2030, dec!(1000000)).with_custom_slabs(vec![
            SlabOverride::new(Some("500000"), None, Some("0.1")),
            SlabOverride::new(Some("0"), Some("500000"), Some("0")),
        ]);

        assert_eq!(
            legacy_engine().calculate(&input),
            Err(CalculationError::Slab(SlabError::UnboundedNotLast { slab: 1 }))
        );
    }

    #[test]
    fn calculate_with_slabs_ignores_custom_overrides() {
        let input = TaxCalculationInput::new(2025, dec!(1000000))
            .with_custom_slabs(vec![SlabOverride::rate_only("not a number")]);
        let slabs = vec![Slab::unbounded(dec!(0), dec!(0.1))];

        let result = legacy_engine().calculate_with_slabs(&input, &slabs).unwrap();

        assert_eq!(result.total_tax_payable, dec!(80500));
    }

    #[test]
    fn resolve_slabs_returns_defaults_without_overrides() {
        let engine = current_engine();
        let input = TaxCalculationInput::new(2025, dec!(1));

        let slabs = engine.resolve_slabs(&input).unwrap();

        assert_eq!(Some(slabs.as_slice()), engine.tables().get(2025));
    }
}
