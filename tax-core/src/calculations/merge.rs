//! Resolution of the effective slab table for one computation.
//!
//! Years with a default table accept partial overrides, merged position by
//! position over the defaults. Years without one take the caller's list as
//! the whole table, so every slab there must be fully specified. Either way
//! the resolved table must be ascending with at most one unbounded slab, and
//! that one last.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tax_core::calculations::merge_slabs;
//! use tax_core::{Slab, SlabOverride};
//!
//! let defaults = vec![
//!     Slab::bounded(dec!(0), dec!(400000), dec!(0)),
//!     Slab::unbounded(dec!(400000), dec!(0.05)),
//! ];
//!
//! let merged = merge_slabs(&defaults, Some(&[SlabOverride::rate_only("0.02")])).unwrap();
//!
//! assert_eq!(merged[0], Slab::bounded(dec!(0), dec!(400000), dec!(0.02)));
//! assert_eq!(merged[1], defaults[1]);
//! ```

use rust_decimal::Decimal;
use tracing::debug;

use crate::calculations::common::parse_amount;
use crate::models::{Slab, SlabError, SlabField, SlabOverride, validate_table};

/// Picks between merging and direct parsing depending on whether the year
/// has a default table, then checks the ordering of the result. Overlapping
/// ranges are allowed.
pub fn resolve_slabs(
    defaults: Option<&[Slab]>,
    overrides: Option<&[SlabOverride]>,
) -> Result<Vec<Slab>, SlabError> {
    let slabs = match defaults {
        Some(defaults) => merge_slabs(defaults, overrides)?,
        None => parse_overrides(overrides)?,
    };
    validate_table(&slabs)?;
    Ok(slabs)
}

/// Merges `overrides` over `defaults`.
///
/// The result always has the length of `defaults`. An override replaces the
/// default slab at its position only when it carries a `start` (blank
/// allowed) and a non-blank `rate`; anything less leaves the default slab
/// untouched. When it does apply, a blank `start` or `end` keeps the
/// default's value. Positions past the end of the override list keep their
/// defaults; overrides past the end of the default table are ignored.
///
/// # Errors
///
/// Returns [`SlabError`] if an override field is not a number, or if the
/// merged slab has an out-of-range rate or an empty range.
pub fn merge_slabs(
    defaults: &[Slab],
    overrides: Option<&[SlabOverride]>,
) -> Result<Vec<Slab>, SlabError> {
    let overrides = match overrides {
        Some(overrides) if !overrides.is_empty() => overrides,
        _ => return Ok(defaults.to_vec()),
    };

    if overrides.len() > defaults.len() {
        debug!(
            overrides = overrides.len(),
            defaults = defaults.len(),
            "ignoring overrides past the end of the default table"
        );
    }

    defaults
        .iter()
        .enumerate()
        .map(|(index, default)| match overrides.get(index) {
            Some(slab_override) => merge_one(default, slab_override, index + 1),
            None => Ok(default.clone()),
        })
        .collect()
}

/// Parses a fully user-specified table.
///
/// `start` and `rate` are required on every entry; a blank `end` makes the
/// slab unbounded. An absent or empty list yields an empty table.
pub fn parse_overrides(overrides: Option<&[SlabOverride]>) -> Result<Vec<Slab>, SlabError> {
    overrides
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, slab_override)| parse_override(slab_override, index + 1))
        .collect()
}

fn merge_one(
    default: &Slab,
    slab_override: &SlabOverride,
    slab: usize,
) -> Result<Slab, SlabError> {
    let Some(start) = slab_override.start.as_deref() else {
        return Ok(default.clone());
    };
    let Some(rate) = slab_override.rate.as_deref().filter(|rate| !rate.trim().is_empty()) else {
        return Ok(default.clone());
    };

    let start = parse_field(Some(start), slab, SlabField::Start)?;
    let end = parse_field(slab_override.end.as_deref(), slab, SlabField::End)?;
    let rate = parse_field(Some(rate), slab, SlabField::Rate)?;

    let merged = Slab {
        start: start.unwrap_or(default.start),
        end: end.or(default.end),
        rate: rate.unwrap_or(default.rate),
    };
    merged.validate(slab)?;
    Ok(merged)
}

fn parse_override(
    slab_override: &SlabOverride,
    slab: usize,
) -> Result<Slab, SlabError> {
    let start = parse_field(slab_override.start.as_deref(), slab, SlabField::Start)?
        .ok_or(SlabError::MissingField {
            slab,
            field: SlabField::Start,
        })?;
    let end = parse_field(slab_override.end.as_deref(), slab, SlabField::End)?;
    let rate = parse_field(slab_override.rate.as_deref(), slab, SlabField::Rate)?.ok_or(
        SlabError::MissingField {
            slab,
            field: SlabField::Rate,
        },
    )?;

    let parsed = Slab { start, end, rate };
    parsed.validate(slab)?;
    Ok(parsed)
}

fn parse_field(
    raw: Option<&str>,
    slab: usize,
    field: SlabField,
) -> Result<Option<Decimal>, SlabError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    parse_amount(raw).map_err(|_| SlabError::InvalidNumber {
        slab,
        field,
        value: raw.to_string(),
    })
}
