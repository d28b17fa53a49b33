//! Slab-based income tax calculations.
//!
//! A computation flows through four stages:
//!
//! 1. [`merge`] resolves the effective slab table for the year.
//! 2. [`brackets`] applies that table to taxable income.
//! 3. [`regime`] turns the bracket total into the payable amount.
//! 4. [`engine`] ties the stages together behind [`TaxEngine`].
//!
//! [`comparison`] diffs two finished results.

pub mod brackets;
pub mod common;
pub mod comparison;
pub mod engine;
pub mod merge;
pub mod regime;

pub use brackets::{BracketApplication, apply_slabs};
pub use comparison::{ComparisonField, ComparisonRow, Outcome, TaxComparison, compare_results};
pub use engine::{CalculationError, TaxEngine, adjusted_ctc};
pub use merge::{merge_slabs, parse_overrides, resolve_slabs};
pub use regime::{
    CurrentRegime, CurrentRegimeConfig, LegacyRegime, LegacyRegimeConfig, RegimeConfigError,
    RegimeSettings, TaxRegime,
};
