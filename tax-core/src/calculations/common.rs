//! Small numeric helpers shared by the slab calculations.
//!
//! The engine itself never rounds; [`round_half_up`] exists for callers that
//! present amounts to people.

use rust_decimal::Decimal;

/// Rounds to two decimal places, midpoints away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(73333.333)), dec!(73333.33));
/// assert_eq!(round_half_up(dec!(5937.505)), dec!(5937.51));
/// assert_eq!(round_half_up(dec!(-0.005)), dec!(-0.01));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the larger of two amounts.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::common::max;
///
/// assert_eq!(max(dec!(-75000), dec!(0)), dec!(0));
/// ```
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// Parses user-entered amount text.
///
/// Surrounding whitespace and `,` thousands separators are ignored. Blank
/// input yields `Ok(None)`; anything else that is not a plain decimal is an
/// error.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::common::parse_amount;
///
/// assert_eq!(parse_amount(" 12,00,000 ").unwrap(), Some(dec!(1200000)));
/// assert_eq!(parse_amount("").unwrap(), None);
/// assert!(parse_amount("twelve").is_err());
/// ```
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>, rust_decimal::Error> {
    let normalized = raw.trim().replace(',', "");
    if normalized.is_empty() {
        return Ok(None);
    }
    normalized.parse().map(Some)
}
