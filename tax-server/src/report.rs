//! Presentation of computed results: amounts rounded to paise, plus plain
//! text reports for the command line.

use std::fmt;

use rust_decimal::Decimal;
use tax_core::calculations::common::round_half_up;
use tax_core::calculations::{ComparisonRow, Outcome, TaxComparison};
use tax_core::{BracketResult, TaxCalculationResult};

/// Copy of `result` with every amount rounded half-up to two places.
/// Slab rates are left as they are.
pub fn round_result(result: &TaxCalculationResult) -> TaxCalculationResult {
    TaxCalculationResult {
        year: result.year,
        regime: result.regime,
        new_ctc: round_half_up(result.new_ctc),
        fixed_pay: round_half_up(result.fixed_pay),
        taxable_income: round_half_up(result.taxable_income),
        tax_before_relief: round_half_up(result.tax_before_relief),
        marginal_relief: round_half_up(result.marginal_relief),
        cess: round_half_up(result.cess),
        total_tax_payable: round_half_up(result.total_tax_payable),
        breakdown: result
            .breakdown
            .iter()
            .map(|bracket| BracketResult {
                slab: bracket.slab,
                range: bracket.range.clone(),
                taxable: round_half_up(bracket.taxable),
                rate: bracket.rate,
                tax: round_half_up(bracket.tax),
            })
            .collect(),
        annual_pre_tax: round_half_up(result.annual_pre_tax),
        annual_post_tax: round_half_up(result.annual_post_tax),
        monthly_pre_tax: round_half_up(result.monthly_pre_tax),
        monthly_post_tax: round_half_up(result.monthly_post_tax),
    }
}

/// Rounds both sides of a comparison. Diffs are rounded from the exact
/// values, not recomputed from the rounded ones.
pub fn round_comparison(comparison: &TaxComparison) -> TaxComparison {
    TaxComparison {
        first: round_result(&comparison.first),
        second: round_result(&comparison.second),
        rows: comparison
            .rows
            .iter()
            .map(|row| ComparisonRow {
                first: round_half_up(row.first),
                second: round_half_up(row.second),
                diff: round_half_up(row.diff),
                ..row.clone()
            })
            .collect(),
    }
}

/// Text report for one computation.
pub struct ResultReport<'a>(pub &'a TaxCalculationResult);

impl fmt::Display for ResultReport<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let r = round_result(self.0);

        writeln!(f, "Tax year {} ({} regime)", r.year, r.regime)?;
        writeln!(f, "  {:<20} {:>16}", "New Full CTC", r.new_ctc)?;
        writeln!(f, "  {:<20} {:>16}", "Fixed Pay", r.fixed_pay)?;
        writeln!(f, "  {:<20} {:>16}", "Taxable Income", r.taxable_income)?;

        if !r.breakdown.is_empty() {
            writeln!(f, "  Slabs:")?;
            for bracket in &r.breakdown {
                writeln!(
                    f,
                    "    {:>2}. {:<24} {:>6}% of {:>14} = {:>14}",
                    bracket.slab,
                    bracket.range,
                    (bracket.rate * Decimal::ONE_HUNDRED).normalize(),
                    bracket.taxable,
                    bracket.tax
                )?;
            }
        }

        writeln!(f, "  {:<20} {:>16}", "Slab Tax", r.tax_before_relief)?;
        writeln!(f, "  {:<20} {:>16}", "Marginal Relief", r.marginal_relief)?;
        writeln!(f, "  {:<20} {:>16}", "Cess", r.cess)?;
        writeln!(f, "  {:<20} {:>16}", "Total Tax", r.total_tax_payable)?;
        writeln!(f, "  {:<20} {:>16}", "Annual Post-Tax", r.annual_post_tax)?;
        write!(f, "  {:<20} {:>16}", "Monthly Post-Tax", r.monthly_post_tax)
    }
}

/// Text report for a comparison, one line per field.
pub struct ComparisonReport<'a>(pub &'a TaxComparison);

impl fmt::Display for ComparisonReport<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let c = round_comparison(self.0);

        writeln!(
            f,
            "  {:<18} {:>16} {:>16} {:>16}",
            "",
            c.first.year,
            c.second.year,
            "Difference"
        )?;
        for row in &c.rows {
            let marker = match row.outcome {
                Outcome::Gain => " +",
                Outcome::Loss => " -",
                _ => "",
            };
            writeln!(
                f,
                "  {:<18} {:>16} {:>16} {:>16}{}",
                row.label, row.first, row.second, row.diff, marker
            )?;
        }
        Ok(())
    }
}
