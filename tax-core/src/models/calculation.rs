use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::regime::Regime;
use super::slab::SlabOverride;

/// Everything the engine needs for one computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCalculationInput {
    pub year: i32,

    /// Gross annual cost-to-company before any hike.
    #[serde(rename = "fullCTC")]
    pub base_ctc: Decimal,

    /// Signed salary hike in percent; zero when absent.
    #[serde(default)]
    pub hike_percent: Decimal,

    /// Partial overrides merged over the year's default table, or the full
    /// table for years without defaults.
    #[serde(default)]
    pub custom_slabs: Option<Vec<SlabOverride>>,
}

impl TaxCalculationInput {
    pub fn new(
        year: i32,
        base_ctc: Decimal,
    ) -> Self {
        Self {
            year,
            base_ctc,
            hike_percent: Decimal::ZERO,
            custom_slabs: None,
        }
    }

    pub fn with_hike(
        mut self,
        hike_percent: Decimal,
    ) -> Self {
        self.hike_percent = hike_percent;
        self
    }

    pub fn with_custom_slabs(
        mut self,
        custom_slabs: Vec<SlabOverride>,
    ) -> Self {
        self.custom_slabs = Some(custom_slabs);
        self
    }
}

/// Tax contributed by one slab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketResult {
    /// 1-based position of the slab in the effective table.
    pub slab: usize,
    pub range: String,
    pub taxable: Decimal,
    pub rate: Decimal,
    pub tax: Decimal,
}

/// Full outcome of a computation. Amounts are unrounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCalculationResult {
    pub year: i32,
    pub regime: Regime,

    /// CTC after applying the hike.
    #[serde(rename = "newFullCTC")]
    pub new_ctc: Decimal,

    /// Income base before the deduction. Equal to `new_ctc` under the
    /// current regime.
    pub fixed_pay: Decimal,
    pub taxable_income: Decimal,

    pub tax_before_relief: Decimal,
    pub marginal_relief: Decimal,
    pub cess: Decimal,
    pub total_tax_payable: Decimal,

    pub breakdown: Vec<BracketResult>,

    pub annual_pre_tax: Decimal,
    pub annual_post_tax: Decimal,
    pub monthly_pre_tax: Decimal,
    pub monthly_post_tax: Decimal,
}

impl TaxCalculationResult {
    /// Tax after marginal relief, before cess.
    pub fn tax_after_relief(&self) -> Decimal {
        self.tax_before_relief - self.marginal_relief
    }
}
