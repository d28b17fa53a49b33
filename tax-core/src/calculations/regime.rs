//! Regime strategies applied after slab resolution.
//!
//! Both regimes share [`apply_slabs`]; they differ in how the taxable
//! income is derived from the adjusted CTC and in the post-processing of the
//! bracket total.
//!
//! | Step | Legacy | Current |
//! |------|--------|---------|
//! | Income base | CTC × fixed-pay factor | CTC |
//! | Taxable income | base − deduction (min 0) | base − deduction (min 0) |
//! | Zero-tax threshold | none | taxable ≤ threshold pays nothing |
//! | Marginal relief | none | tax capped at income above threshold |
//! | Cess | none | percentage of tax after relief |
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tax_core::Slab;
//! use tax_core::calculations::{CurrentRegime, TaxRegime};
//!
//! let slabs = vec![
//!     Slab::bounded(dec!(0), dec!(400000), dec!(0)),
//!     Slab::bounded(dec!(400000), dec!(800000), dec!(0.05)),
//!     Slab::bounded(dec!(800000), dec!(1200000), dec!(0.10)),
//!     Slab::unbounded(dec!(1200000), dec!(0.15)),
//! ];
//!
//! let result = CurrentRegime::default().compute(2025, dec!(1285000), &slabs).unwrap();
//!
//! // Taxable 12,10,000: slab tax 61,500 is capped at the 10,000 above the threshold.
//! assert_eq!(result.marginal_relief, dec!(51500));
//! assert_eq!(result.cess, dec!(400));
//! assert_eq!(result.total_tax_payable, dec!(10400));
//! ```

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::calculations::brackets::apply_slabs;
use crate::calculations::common::max;
use crate::calculations::engine::CalculationError;
use crate::models::{BracketResult, Regime, Slab, TaxCalculationResult};

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Errors raised when a regime is configured with impossible parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegimeConfigError {
    #[error("fixed pay factor must be greater than 0 and at most 1, got {0}")]
    InvalidFixedPayFactor(Decimal),

    #[error("standard deduction must be non-negative, got {0}")]
    NegativeDeduction(Decimal),

    #[error("zero-tax threshold must be non-negative, got {0}")]
    NegativeThreshold(Decimal),

    #[error("relief limit {limit} must not be below the zero-tax threshold {threshold}")]
    ReliefLimitBelowThreshold { limit: Decimal, threshold: Decimal },

    #[error("cess rate must be between 0 and 1, got {0}")]
    InvalidCessRate(Decimal),
}

/// A regime's post-processing step.
///
/// `compute` receives the hike-adjusted CTC and the already resolved slab
/// table. It fails only when the tax does not fit in a `Decimal`.
pub trait TaxRegime: fmt::Debug + Send + Sync {
    fn kind(&self) -> Regime;

    /// Stable description of the regime and its parameters, used as part of
    /// the cache signature.
    fn fingerprint(&self) -> String;

    fn compute(
        &self,
        year: i32,
        new_ctc: Decimal,
        slabs: &[Slab],
    ) -> Result<TaxCalculationResult, CalculationError>;
}

/// Parameters of the legacy flat-deduction regime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyRegimeConfig {
    /// Share of CTC treated as fixed pay.
    pub fixed_pay_factor: Decimal,
    pub standard_deduction: Decimal,
}

impl Default for LegacyRegimeConfig {
    fn default() -> Self {
        Self {
            fixed_pay_factor: dec!(0.88),
            standard_deduction: dec!(75000),
        }
    }
}

impl LegacyRegimeConfig {
    pub fn validate(&self) -> Result<(), RegimeConfigError> {
        if self.fixed_pay_factor <= Decimal::ZERO || self.fixed_pay_factor > Decimal::ONE {
            return Err(RegimeConfigError::InvalidFixedPayFactor(
                self.fixed_pay_factor,
            ));
        }
        if self.standard_deduction < Decimal::ZERO {
            return Err(RegimeConfigError::NegativeDeduction(
                self.standard_deduction,
            ));
        }
        Ok(())
    }
}

/// Parameters of the current regime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentRegimeConfig {
    pub standard_deduction: Decimal,

    /// Taxable income at or below this pays no tax at all.
    pub zero_tax_threshold: Decimal,

    /// Upper end (inclusive) of the band where marginal relief applies.
    pub relief_limit: Decimal,

    /// Health and education cess on tax after relief.
    pub cess_rate: Decimal,
}

impl Default for CurrentRegimeConfig {
    fn default() -> Self {
        Self {
            standard_deduction: dec!(75000),
            zero_tax_threshold: dec!(1200000),
            relief_limit: dec!(1275000),
            cess_rate: dec!(0.04),
        }
    }
}

impl CurrentRegimeConfig {
    pub fn validate(&self) -> Result<(), RegimeConfigError> {
        if self.standard_deduction < Decimal::ZERO {
            return Err(RegimeConfigError::NegativeDeduction(
                self.standard_deduction,
            ));
        }
        if self.zero_tax_threshold < Decimal::ZERO {
            return Err(RegimeConfigError::NegativeThreshold(
                self.zero_tax_threshold,
            ));
        }
        if self.relief_limit < self.zero_tax_threshold {
            return Err(RegimeConfigError::ReliefLimitBelowThreshold {
                limit: self.relief_limit,
                threshold: self.zero_tax_threshold,
            });
        }
        if self.cess_rate < Decimal::ZERO || self.cess_rate > Decimal::ONE {
            return Err(RegimeConfigError::InvalidCessRate(self.cess_rate));
        }
        Ok(())
    }
}

/// Both regime configurations, as loaded from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeSettings {
    pub legacy: LegacyRegimeConfig,
    pub current: CurrentRegimeConfig,
}

impl RegimeSettings {
    /// Builds the strategy for `kind` from these settings.
    pub fn build(
        &self,
        kind: Regime,
    ) -> Result<Arc<dyn TaxRegime>, RegimeConfigError> {
        Ok(match kind {
            Regime::Legacy => Arc::new(LegacyRegime::new(self.legacy.clone())?),
            Regime::Current => Arc::new(CurrentRegime::new(self.current.clone())?),
        })
    }
}

/// Regime-specific amounts that feed the shared result assembly.
struct Settlement {
    new_ctc: Decimal,
    fixed_pay: Decimal,
    taxable_income: Decimal,
    annual_pre_tax: Decimal,
    tax_before_relief: Decimal,
    marginal_relief: Decimal,
    cess: Decimal,
    breakdown: Vec<BracketResult>,
}

impl Settlement {
    fn into_result(
        self,
        year: i32,
        regime: Regime,
    ) -> Result<TaxCalculationResult, CalculationError> {
        let total_tax_payable = (self.tax_before_relief - self.marginal_relief)
            .checked_add(self.cess)
            .ok_or(CalculationError::TaxOverflow {
                taxable_income: self.taxable_income,
            })?;
        let annual_post_tax = self.annual_pre_tax - total_tax_payable;

        Ok(TaxCalculationResult {
            year,
            regime,
            new_ctc: self.new_ctc,
            fixed_pay: self.fixed_pay,
            taxable_income: self.taxable_income,
            tax_before_relief: self.tax_before_relief,
            marginal_relief: self.marginal_relief,
            cess: self.cess,
            total_tax_payable,
            breakdown: self.breakdown,
            annual_pre_tax: self.annual_pre_tax,
            annual_post_tax,
            monthly_pre_tax: self.annual_pre_tax / MONTHS_PER_YEAR,
            monthly_post_tax: annual_post_tax / MONTHS_PER_YEAR,
        })
    }
}

/// Legacy regime: slab tax on fixed pay less the deduction, nothing else.
#[derive(Debug, Clone, Default)]
pub struct LegacyRegime {
    config: LegacyRegimeConfig,
}

impl LegacyRegime {
    /// # Errors
    ///
    /// Returns [`RegimeConfigError`] if the configuration is invalid.
    pub fn new(config: LegacyRegimeConfig) -> Result<Self, RegimeConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LegacyRegimeConfig {
        &self.config
    }
}

impl TaxRegime for LegacyRegime {
    fn kind(&self) -> Regime {
        Regime::Legacy
    }

    fn fingerprint(&self) -> String {
        format!(
            "legacy:{}:{}",
            self.config.fixed_pay_factor.normalize(),
            self.config.standard_deduction.normalize()
        )
    }

    fn compute(
        &self,
        year: i32,
        new_ctc: Decimal,
        slabs: &[Slab],
    ) -> Result<TaxCalculationResult, CalculationError> {
        let fixed_pay = new_ctc * self.config.fixed_pay_factor;
        let taxable_income = max(fixed_pay - self.config.standard_deduction, Decimal::ZERO);
        let application = apply_slabs(taxable_income, slabs)?;

        Settlement {
            new_ctc,
            fixed_pay,
            taxable_income,
            annual_pre_tax: fixed_pay,
            tax_before_relief: application.tax,
            marginal_relief: Decimal::ZERO,
            cess: Decimal::ZERO,
            breakdown: application.breakdown,
        }
        .into_result(year, Regime::Legacy)
    }
}

/// Current regime: zero-tax threshold, marginal relief and cess.
#[derive(Debug, Clone, Default)]
pub struct CurrentRegime {
    config: CurrentRegimeConfig,
}

impl CurrentRegime {
    /// # Errors
    ///
    /// Returns [`RegimeConfigError`] if the configuration is invalid.
    pub fn new(config: CurrentRegimeConfig) -> Result<Self, RegimeConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CurrentRegimeConfig {
        &self.config
    }

    /// Relief owed inside the relief band: the amount by which slab tax
    /// exceeds the income above the threshold. Zero outside the band or when
    /// slab tax is already below that income.
    fn marginal_relief(
        &self,
        taxable_income: Decimal,
        tax_before_relief: Decimal,
    ) -> Decimal {
        if taxable_income <= self.config.zero_tax_threshold
            || taxable_income > self.config.relief_limit
        {
            return Decimal::ZERO;
        }

        let income_above_threshold = taxable_income - self.config.zero_tax_threshold;
        let relief = tax_before_relief - income_above_threshold;
        if relief > Decimal::ZERO {
            debug!(
                taxable_income = %taxable_income,
                tax_before_relief = %tax_before_relief,
                relief = %relief,
                "marginal relief applied"
            );
            relief
        } else {
            Decimal::ZERO
        }
    }
}

impl TaxRegime for CurrentRegime {
    fn kind(&self) -> Regime {
        Regime::Current
    }

    fn fingerprint(&self) -> String {
        format!(
            "current:{}:{}:{}:{}",
            self.config.standard_deduction.normalize(),
            self.config.zero_tax_threshold.normalize(),
            self.config.relief_limit.normalize(),
            self.config.cess_rate.normalize()
        )
    }

    fn compute(
        &self,
        year: i32,
        new_ctc: Decimal,
        slabs: &[Slab],
    ) -> Result<TaxCalculationResult, CalculationError> {
        let taxable_income = max(new_ctc - self.config.standard_deduction, Decimal::ZERO);

        let mut settlement = Settlement {
            new_ctc,
            fixed_pay: new_ctc,
            taxable_income,
            annual_pre_tax: taxable_income,
            tax_before_relief: Decimal::ZERO,
            marginal_relief: Decimal::ZERO,
            cess: Decimal::ZERO,
            breakdown: Vec::new(),
        };

        if taxable_income <= self.config.zero_tax_threshold {
            debug!(
                taxable_income = %taxable_income,
                threshold = %self.config.zero_tax_threshold,
                "taxable income within zero-tax threshold"
            );
            return settlement.into_result(year, Regime::Current);
        }

        let application = apply_slabs(taxable_income, slabs)?;
        let marginal_relief = self.marginal_relief(taxable_income, application.tax);
        let tax_after_relief = application.tax - marginal_relief;

        settlement.tax_before_relief = application.tax;
        settlement.marginal_relief = marginal_relief;
        settlement.cess = tax_after_relief * self.config.cess_rate;
        settlement.breakdown = application.breakdown;
        settlement.into_result(year, Regime::Current)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

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

    fn slabs_2024() -> Vec<Slab> {
        vec![
            Slab::bounded(dec!(0), dec!(300000), dec!(0)),
            Slab::bounded(dec!(300000), dec!(700000), dec!(0.05)),
            Slab::bounded(dec!(700000), dec!(1000000), dec!(0.10)),
            Slab::bounded(dec!(1000000), dec!(1200000), dec!(0.15)),
            Slab::bounded(dec!(1200000), dec!(1500000), dec!(0.20)),
            Slab::unbounded(dec!(1500000), dec!(0.30)),
        ]
    }

    /// Initializes tracing subscriber for tests that exercise debug logging.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    // =========================================================================
    // config validation tests
    // =========================================================================

    #[test]
    fn default_configs_are_valid() {
        assert_eq!(LegacyRegimeConfig::default().validate(), Ok(()));
        assert_eq!(CurrentRegimeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn legacy_rejects_zero_fixed_pay_factor() {
        let config = LegacyRegimeConfig {
            fixed_pay_factor: dec!(0),
            ..Default::default()
        };

        assert_eq!(
            LegacyRegime::new(config).err(),
            Some(RegimeConfigError::InvalidFixedPayFactor(dec!(0)))
        );
    }

    #[test]
    fn legacy_rejects_fixed_pay_factor_above_one() {
        let config = LegacyRegimeConfig {
            fixed_pay_factor: dec!(1.2),
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn legacy_rejects_negative_deduction() {
        let config = LegacyRegimeConfig {
            standard_deduction: dec!(-1),
            ..Default::default()
        };

        assert_eq!(
            config.validate(),
            Err(RegimeConfigError::NegativeDeduction(dec!(-1)))
        );
    }

    #[test]
    fn current_rejects_relief_limit_below_threshold() {
        let config = CurrentRegimeConfig {
            relief_limit: dec!(1000000),
            ..Default::default()
        };

        assert_eq!(
            config.validate(),
            Err(RegimeConfigError::ReliefLimitBelowThreshold {
                limit: dec!(1000000),
                threshold: dec!(1200000),
            })
        );
    }

    #[test]
    fn current_rejects_cess_rate_above_one() {
        let config = CurrentRegimeConfig {
            cess_rate: dec!(4),
            ..Default::default()
        };

        assert_eq!(
            CurrentRegime::new(config).err(),
            Some(RegimeConfigError::InvalidCessRate(dec!(4)))
        );
    }

    #[test]
    fn current_rejects_negative_threshold() {
        let config = CurrentRegimeConfig {
            zero_tax_threshold: dec!(-1),
            relief_limit: dec!(0),
            ..Default::default()
        };

        assert_eq!(
            config.validate(),
            Err(RegimeConfigError::NegativeThreshold(dec!(-1)))
        );
    }

    #[test]
    fn settings_build_the_requested_kind() {
        let settings = RegimeSettings::default();

        assert_eq!(settings.build(Regime::Legacy).unwrap().kind(), Regime::Legacy);
        assert_eq!(settings.build(Regime::Current).unwrap().kind(), Regime::Current);
    }

    #[test]
    fn settings_build_surfaces_invalid_config() {
        let settings = RegimeSettings {
            current: CurrentRegimeConfig {
                cess_rate: dec!(-0.01),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(settings.build(Regime::Current).is_err());
        assert!(settings.build(Regime::Legacy).is_ok());
    }

    #[test]
    fn fingerprints_differ_by_parameters() {
        let standard = CurrentRegime::default();
        let lower_cess = CurrentRegime::new(CurrentRegimeConfig {
            cess_rate: dec!(0.02),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(standard.fingerprint(), "current:75000:1200000:1275000:0.04");
        assert_ne!(standard.fingerprint(), lower_cess.fingerprint());
        assert_eq!(LegacyRegime::default().fingerprint(), "legacy:0.88:75000");
    }

    // =========================================================================
    // legacy regime tests
    // =========================================================================

    #[test]
    fn legacy_taxes_fixed_pay_less_deduction() {
        let result = LegacyRegime::default().compute(2025, dec!(1000000), &slabs_2025()).unwrap();

        assert_eq!(result.fixed_pay, dec!(880000));
        assert_eq!(result.taxable_income, dec!(805000));
        assert_eq!(result.tax_before_relief, dec!(20500));
        assert_eq!(result.marginal_relief, Decimal::ZERO);
        assert_eq!(result.cess, Decimal::ZERO);
        assert_eq!(result.total_tax_payable, dec!(20500));
        assert_eq!(result.annual_pre_tax, dec!(880000));
        assert_eq!(result.annual_post_tax, dec!(859500));
        assert_eq!(result.monthly_pre_tax, dec!(880000) / dec!(12));
        assert_eq!(result.monthly_post_tax, dec!(859500) / dec!(12));
    }

    #[test]
    fn legacy_with_2024_slabs() {
        let result = LegacyRegime::default().compute(2024, dec!(1000000), &slabs_2024()).unwrap();

        assert_eq!(result.total_tax_payable, dec!(30500));
        assert_eq!(result.breakdown.len(), 3);
    }

    #[test]
    fn legacy_high_income_reaches_top_slab() {
        let result = LegacyRegime::default().compute(2024, dec!(3150000), &slabs_2024()).unwrap();

        assert_eq!(result.fixed_pay, dec!(2772000));
        assert_eq!(result.taxable_income, dec!(2697000));
        assert_eq!(result.total_tax_payable, dec!(499100));
    }

    #[test]
    fn legacy_income_below_deduction_is_untaxed() {
        let result = LegacyRegime::default().compute(2025, dec!(50000), &slabs_2025()).unwrap();

        assert_eq!(result.taxable_income, Decimal::ZERO);
        assert_eq!(result.total_tax_payable, Decimal::ZERO);
        assert!(result.breakdown.is_empty());
        assert_eq!(result.annual_post_tax, dec!(44000));
    }

    #[test]
    fn legacy_ignores_zero_tax_threshold() {
        let result = LegacyRegime::default().compute(2025, dec!(1275000), &slabs_2025()).unwrap();

        assert!(result.total_tax_payable > Decimal::ZERO);
    }

    // =========================================================================
    // current regime tests
    // =========================================================================

    #[test]
    fn current_at_threshold_pays_nothing() {
        let result = CurrentRegime::default().compute(2025, dec!(1275000), &slabs_2025()).unwrap();

        assert_eq!(result.taxable_income, dec!(1200000));
        assert_eq!(result.total_tax_payable, Decimal::ZERO);
        assert_eq!(result.marginal_relief, Decimal::ZERO);
        assert_eq!(result.cess, Decimal::ZERO);
        assert!(result.breakdown.is_empty());
        assert_eq!(result.annual_pre_tax, dec!(1200000));
        assert_eq!(result.annual_post_tax, dec!(1200000));
        assert_eq!(result.monthly_pre_tax, dec!(100000));
    }

    #[test]
    fn current_fixed_pay_is_full_ctc() {
        let result = CurrentRegime::default().compute(2025, dec!(1350000), &slabs_2025()).unwrap();

        assert_eq!(result.new_ctc, dec!(1350000));
        assert_eq!(result.fixed_pay, dec!(1350000));
    }

    #[test]
    fn current_at_relief_limit_has_no_relief() {
        let result = CurrentRegime::default().compute(2025, dec!(1350000), &slabs_2025()).unwrap();

        assert_eq!(result.taxable_income, dec!(1275000));
        assert_eq!(result.tax_before_relief, dec!(71250));
        assert_eq!(result.marginal_relief, Decimal::ZERO);
        assert_eq!(result.cess, dec!(2850));
        assert_eq!(result.total_tax_payable, dec!(74100));
        assert_eq!(result.annual_post_tax, dec!(1200900));
        assert_eq!(result.breakdown.len(), 4);
    }

    #[test]
    fn current_just_above_threshold_gets_relief() {
        let _guard = init_test_tracing();

        let result = CurrentRegime::default().compute(2025, dec!(1285000), &slabs_2025()).unwrap();

        assert_eq!(result.taxable_income, dec!(1210000));
        assert_eq!(result.tax_before_relief, dec!(61500));
        assert_eq!(result.marginal_relief, dec!(51500));
        assert_eq!(result.tax_after_relief(), dec!(10000));
        assert_eq!(result.cess, dec!(400));
        assert_eq!(result.total_tax_payable, dec!(10400));
    }

    #[test]
    fn current_relief_caps_tax_at_income_above_threshold() {
        let result = CurrentRegime::default().compute(2025, dec!(1275001), &slabs_2025()).unwrap();

        assert_eq!(result.taxable_income, dec!(1200001));
        assert_eq!(result.tax_after_relief(), dec!(1));
        assert_eq!(result.cess, dec!(0.04));
    }

    #[test]
    fn current_above_relief_band_taxes_slabs_plus_cess() {
        let result = CurrentRegime::default().compute(2025, dec!(3150000), &slabs_2025()).unwrap();

        assert_eq!(result.taxable_income, dec!(3075000));
        assert_eq!(result.tax_before_relief, dec!(502500));
        assert_eq!(result.marginal_relief, Decimal::ZERO);
        assert_eq!(result.cess, dec!(20100));
        assert_eq!(result.total_tax_payable, dec!(522600));
        assert_eq!(result.annual_post_tax, dec!(2552400));
        assert_eq!(result.breakdown.len(), 7);
    }

    #[test]
    fn current_with_empty_table_pays_nothing_above_threshold() {
        let result = CurrentRegime::default().compute(2030, dec!(5000000), &[]).unwrap();

        assert_eq!(result.total_tax_payable, Decimal::ZERO);
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn current_zero_ctc() {
        let result = CurrentRegime::default().compute(2025, Decimal::ZERO, &slabs_2025()).unwrap();

        assert_eq!(result.taxable_income, Decimal::ZERO);
        assert_eq!(result.annual_post_tax, Decimal::ZERO);
    }

    #[test]
    fn current_respects_custom_threshold() {
        let regime = CurrentRegime::new(CurrentRegimeConfig {
            zero_tax_threshold: dec!(700000),
            relief_limit: dec!(700000),
            ..Default::default()
        })
        .unwrap();

        let result = regime.compute(2025, dec!(1000000), &slabs_2025()).unwrap();

        // Taxable 925,000: 20,000 + 12,500; no relief band.
        assert_eq!(result.tax_before_relief, dec!(32500));
        assert_eq!(result.marginal_relief, Decimal::ZERO);
        assert_eq!(result.cess, dec!(1300));
    }
}
