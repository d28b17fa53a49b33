//! Field-by-field comparison of two computations, typically the same CTC
//! under two fiscal years.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::TaxCalculationResult;

/// Result fields that take part in a comparison, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonField {
    #[serde(rename = "newFullCTC")]
    NewCtc,
    FixedPay,
    TaxableIncome,
    Tax,
    AnnualPreTax,
    AnnualPostTax,
    MonthlyPreTax,
    MonthlyPostTax,
}

impl ComparisonField {
    pub const ALL: [ComparisonField; 8] = [
        Self::NewCtc,
        Self::FixedPay,
        Self::TaxableIncome,
        Self::Tax,
        Self::AnnualPreTax,
        Self::AnnualPostTax,
        Self::MonthlyPreTax,
        Self::MonthlyPostTax,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::NewCtc => "New Full CTC",
            Self::FixedPay => "Fixed Pay",
            Self::TaxableIncome => "Taxable Income",
            Self::Tax => "Total Tax",
            Self::AnnualPreTax => "Annual Pre-Tax",
            Self::AnnualPostTax => "Annual Post-Tax",
            Self::MonthlyPreTax => "Monthly Pre-Tax",
            Self::MonthlyPostTax => "Monthly Post-Tax",
        }
    }

    /// Whether a difference in this field means the taxpayer is better or
    /// worse off.
    pub fn is_profit_field(&self) -> bool {
        matches!(self, Self::Tax | Self::AnnualPostTax | Self::MonthlyPostTax)
    }

    fn value(
        &self,
        result: &TaxCalculationResult,
    ) -> Decimal {
        match self {
            Self::NewCtc => result.new_ctc,
            Self::FixedPay => result.fixed_pay,
            Self::TaxableIncome => result.taxable_income,
            Self::Tax => result.total_tax_payable,
            Self::AnnualPreTax => result.annual_pre_tax,
            Self::AnnualPostTax => result.annual_post_tax,
            Self::MonthlyPreTax => result.monthly_pre_tax,
            Self::MonthlyPostTax => result.monthly_post_tax,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Gain,
    Loss,
    Neutral,
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRow {
    pub field: ComparisonField,
    pub label: &'static str,
    pub first: Decimal,
    pub second: Decimal,
    /// Signed so that a positive value favours the taxpayer.
    pub diff: Decimal,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxComparison {
    pub first: TaxCalculationResult,
    pub second: TaxCalculationResult,
    pub rows: Vec<ComparisonRow>,
}

impl TaxComparison {
    pub fn row(
        &self,
        field: ComparisonField,
    ) -> Option<&ComparisonRow> {
        self.rows.iter().find(|row| row.field == field)
    }
}

/// Diffs `second` against `first`.
///
/// Tax is diffed as `first - second`, so paying less in the second result is
/// a gain; every other field is diffed as `second - first`.
pub fn compare_results(
    first: TaxCalculationResult,
    second: TaxCalculationResult,
) -> TaxComparison {
    let rows = ComparisonField::ALL
        .iter()
        .map(|field| {
            let a = field.value(&first);
            let b = field.value(&second);
            let diff = match field {
                ComparisonField::Tax => a - b,
                _ => b - a,
            };
            let outcome = if !field.is_profit_field() {
                Outcome::Unclassified
            } else if diff > Decimal::ZERO {
                Outcome::Gain
            } else if diff < Decimal::ZERO {
                Outcome::Loss
            } else {
                Outcome::Neutral
            };

            ComparisonRow {
                field: *field,
                label: field.label(),
                first: a,
                second: b,
                diff,
                outcome,
            }
        })
        .collect();

    TaxComparison {
        first,
        second,
        rows,
    }
}
