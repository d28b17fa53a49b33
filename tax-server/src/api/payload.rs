//! Request body parsing.
//!
//! Bodies are read as loose JSON so that numbers sent as strings, blank
//! fields and nulls can be told apart from garbage before anything reaches
//! the engine.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Number, Value};
use tax_core::calculations::common::parse_amount;
use tax_core::{Regime, SlabOverride, TaxCalculationInput};
use thiserror::Error;

use crate::service::Scenario;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Year and fullCTC must be provided and valid.")]
    InvalidYearOrCtc,

    #[error("fullCTC, first.year and second.year must be provided and valid.")]
    InvalidComparison,

    #[error("hikePercent must be a number no lower than -100.")]
    InvalidHike,

    #[error("regime must be 'legacy' or 'current'.")]
    InvalidRegime,

    #[error("customSlabs must be a list of {{start, end, rate}} objects.")]
    InvalidSlabs,

    #[error("Year must be a positive integer.")]
    InvalidPathYear,
}

/// `POST /api/calculate-tax` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculateRequest {
    pub input: TaxCalculationInput,
    pub regime: Option<Regime>,
}

impl CalculateRequest {
    pub fn from_json(body: &[u8]) -> Result<Self, PayloadError> {
        let fields = object(body).ok_or(PayloadError::InvalidYearOrCtc)?;

        let year = year(fields.get("year")).ok_or(PayloadError::InvalidYearOrCtc)?;
        let base_ctc =
            positive_amount(fields.get("fullCTC")).ok_or(PayloadError::InvalidYearOrCtc)?;
        let hike_percent = hike(fields.get("hikePercent"))?;
        let custom_slabs = custom_slabs(fields.get("customSlabs"))?;
        let regime = regime(fields.get("regime"))?;

        let mut input = TaxCalculationInput::new(year, base_ctc).with_hike(hike_percent);
        input.custom_slabs = custom_slabs;
        Ok(Self { input, regime })
    }
}

/// `POST /api/compare` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRequest {
    pub base_ctc: Decimal,
    pub first: Scenario,
    pub second: Scenario,
    pub regime: Option<Regime>,
}

impl CompareRequest {
    pub fn from_json(body: &[u8]) -> Result<Self, PayloadError> {
        let fields = object(body).ok_or(PayloadError::InvalidComparison)?;

        let base_ctc =
            positive_amount(fields.get("fullCTC")).ok_or(PayloadError::InvalidComparison)?;
        let first = scenario(fields.get("first"))?;
        let second = scenario(fields.get("second"))?;
        let regime = regime(fields.get("regime"))?;

        Ok(Self {
            base_ctc,
            first,
            second,
            regime,
        })
    }
}

/// `PUT /api/slabs/:year` body: either a bare list of slabs or
/// `{"slabs": [...]}`.
pub fn parse_slab_table(body: &[u8]) -> Result<Vec<SlabOverride>, PayloadError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| PayloadError::InvalidSlabs)?;
    let list = match &value {
        Value::Object(fields) => fields.get("slabs"),
        other => Some(other),
    };
    custom_slabs(list)?.ok_or(PayloadError::InvalidSlabs)
}

pub fn parse_path_year(raw: &str) -> Result<i32, PayloadError> {
    match raw.trim().parse::<i32>() {
        Ok(year) if year > 0 => Ok(year),
        _ => Err(PayloadError::InvalidPathYear),
    }
}

fn object(body: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice(body).ok()? {
        Value::Object(fields) => Some(fields),
        _ => None,
    }
}

/// Treats JSON `null` like an absent key.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

fn number(n: &Number) -> Option<Decimal> {
    let text = n.to_string();
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => number(n),
        Value::String(s) => parse_amount(s).ok().flatten(),
        _ => None,
    }
}

fn positive_amount(value: Option<&Value>) -> Option<Decimal> {
    present(value)
        .and_then(amount)
        .filter(|amount| *amount > Decimal::ZERO)
}

fn year(value: Option<&Value>) -> Option<i32> {
    let year = present(value).and_then(amount)?;
    if !year.fract().is_zero() {
        return None;
    }
    year.to_i32().filter(|year| *year > 0)
}

fn hike(value: Option<&Value>) -> Result<Decimal, PayloadError> {
    let hike = match present(value) {
        None => return Ok(Decimal::ZERO),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(Decimal::ZERO),
        Some(value) => amount(value).ok_or(PayloadError::InvalidHike)?,
    };
    if hike < -Decimal::ONE_HUNDRED {
        return Err(PayloadError::InvalidHike);
    }
    Ok(hike)
}

fn regime(value: Option<&Value>) -> Result<Option<Regime>, PayloadError> {
    match present(value) {
        None => Ok(None),
        Some(Value::String(s)) => Regime::parse(s).map(Some).ok_or(PayloadError::InvalidRegime),
        Some(_) => Err(PayloadError::InvalidRegime),
    }
}

fn scenario(value: Option<&Value>) -> Result<Scenario, PayloadError> {
    let Some(Value::Object(fields)) = present(value) else {
        return Err(PayloadError::InvalidComparison);
    };
    let year = year(fields.get("year")).ok_or(PayloadError::InvalidComparison)?;
    Ok(Scenario::new(year).with_hike(hike(fields.get("hikePercent"))?))
}

fn custom_slabs(value: Option<&Value>) -> Result<Option<Vec<SlabOverride>>, PayloadError> {
    let Some(value) = present(value) else {
        return Ok(None);
    };
    let Value::Array(entries) = value else {
        return Err(PayloadError::InvalidSlabs);
    };

    entries
        .iter()
        .map(|entry| {
            let Value::Object(fields) = entry else {
                return Err(PayloadError::InvalidSlabs);
            };
            Ok(SlabOverride {
                start: slab_field(fields.get("start"))?,
                end: slab_field(fields.get("end"))?,
                rate: slab_field(fields.get("rate"))?,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Slab fields stay text so the merger can report unparseable values
/// against the slab they belong to.
fn slab_field(value: Option<&Value>) -> Result<Option<String>, PayloadError> {
    match present(value) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(PayloadError::InvalidSlabs),
    }
}
