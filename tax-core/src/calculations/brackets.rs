//! Progressive bracket application.
//!
//! Walks an effective slab table in ascending order and taxes the share of
//! income that falls inside each slab. Nothing is rounded here, so the sum of
//! the per-slab taxes equals the returned total exactly.

use rust_decimal::Decimal;

use crate::calculations::engine::CalculationError;
use crate::models::{BracketResult, Slab};

/// Per-slab breakdown plus the total tax before any regime adjustment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BracketApplication {
    pub tax: Decimal,
    pub breakdown: Vec<BracketResult>,
}

/// Applies `slabs` to `income`.
///
/// Slabs whose start is at or above `income` contribute nothing and produce
/// no breakdown row. For the rest, the taxable share is
/// `min(income, end) - start`, or `income - start` for an unbounded slab.
///
/// # Errors
///
/// Returns [`CalculationError::TaxOverflow`] when overlapping slabs push the
/// running total past what a `Decimal` can hold.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::Slab;
/// use tax_core::calculations::apply_slabs;
///
/// let slabs = vec![
///     Slab::bounded(dec!(0), dec!(400000), dec!(0)),
///     Slab::bounded(dec!(400000), dec!(800000), dec!(0.05)),
///     Slab::unbounded(dec!(800000), dec!(0.10)),
/// ];
///
/// let application = apply_slabs(dec!(805000), &slabs).unwrap();
///
/// assert_eq!(application.tax, dec!(20500));
/// assert_eq!(application.breakdown.len(), 3);
/// ```
pub fn apply_slabs(
    income: Decimal,
    slabs: &[Slab],
) -> Result<BracketApplication, CalculationError> {
    let mut application = BracketApplication::default();

    for (index, slab) in slabs.iter().enumerate() {
        if income <= slab.start {
            continue;
        }

        let upper = match slab.end {
            Some(end) => income.min(end),
            None => income,
        };
        let taxable = upper - slab.start;
        let tax = taxable * slab.rate;

        application.breakdown.push(BracketResult {
            slab: index + 1,
            range: slab.range_label(),
            taxable,
            rate: slab.rate,
            tax,
        });
        application.tax = application
            .tax
            .checked_add(tax)
            .ok_or(CalculationError::TaxOverflow {
                taxable_income: income,
            })?;
    }

    Ok(application)
}
