use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One progressive tax bracket.
///
/// Income in `[start, end)` is taxed at `rate`. An absent `end` means the
/// bracket is unbounded above, which is only valid for the last slab of a
/// table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slab {
    pub start: Decimal,
    pub end: Option<Decimal>,
    pub rate: Decimal,
}

impl Slab {
    pub fn bounded(
        start: Decimal,
        end: Decimal,
        rate: Decimal,
    ) -> Self {
        Self {
            start,
            end: Some(end),
            rate,
        }
    }

    pub fn unbounded(
        start: Decimal,
        rate: Decimal,
    ) -> Self {
        Self {
            start,
            end: None,
            rate,
        }
    }

    /// Human-readable range, e.g. `"400000 to 800000"` or `"2400000 to ∞"`.
    pub fn range_label(&self) -> String {
        match self.end {
            Some(end) => format!("{} to {}", self.start.normalize(), end.normalize()),
            None => format!("{} to ∞", self.start.normalize()),
        }
    }

    /// Checks the bounds of a single slab. `slab` is the 1-based position
    /// used in error messages.
    pub fn validate(
        &self,
        slab: usize,
    ) -> Result<(), SlabError> {
        if self.start < Decimal::ZERO {
            return Err(SlabError::NegativeStart {
                slab,
                start: self.start,
            });
        }
        if self.rate < Decimal::ZERO || self.rate > Decimal::ONE {
            return Err(SlabError::RateOutOfRange {
                slab,
                rate: self.rate,
            });
        }
        if let Some(end) = self.end {
            if end <= self.start {
                return Err(SlabError::EmptyRange {
                    slab,
                    start: self.start,
                    end,
                });
            }
        }
        Ok(())
    }
}

/// Validates a complete table: every slab individually, ascending starts,
/// and at most one unbounded slab which must come last.
pub fn validate_table(slabs: &[Slab]) -> Result<(), SlabError> {
    for (index, slab) in slabs.iter().enumerate() {
        let position = index + 1;
        slab.validate(position)?;

        if index > 0 && slab.start < slabs[index - 1].start {
            return Err(SlabError::Unordered { slab: position });
        }
        if slab.end.is_none() && position != slabs.len() {
            return Err(SlabError::UnboundedNotLast { slab: position });
        }
    }
    Ok(())
}

/// A partial slab as typed into a form.
///
/// Each field holds raw text. `None` or blank text means "inherit the value
/// of the default slab at the same position" when merged over a default
/// table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlabOverride {
    pub start: Option<String>,
    pub end: Option<String>,
    pub rate: Option<String>,
}

impl SlabOverride {
    pub fn new(
        start: Option<&str>,
        end: Option<&str>,
        rate: Option<&str>,
    ) -> Self {
        Self {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            rate: rate.map(str::to_string),
        }
    }

    /// An override that only changes the rate at its position. The blank
    /// start is still present, so the merge takes the override.
    pub fn rate_only(rate: &str) -> Self {
        Self::new(Some(""), None, Some(rate))
    }
}

impl From<&Slab> for SlabOverride {
    fn from(slab: &Slab) -> Self {
        Self {
            start: Some(slab.start.to_string()),
            end: slab.end.map(|end| end.to_string()),
            rate: Some(slab.rate.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlabField {
    Start,
    End,
    Rate,
}

impl fmt::Display for SlabField {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Rate => "rate",
        };
        f.write_str(name)
    }
}

/// Errors raised while parsing or validating slabs.
///
/// `slab` is always the 1-based position within the table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlabError {
    #[error("slab {slab}: {field} is required")]
    MissingField { slab: usize, field: SlabField },

    #[error("slab {slab}: {field} '{value}' is not a valid number")]
    InvalidNumber {
        slab: usize,
        field: SlabField,
        value: String,
    },

    #[error("slab {slab}: start must be non-negative, got {start}")]
    NegativeStart { slab: usize, start: Decimal },

    #[error("slab {slab}: rate must be between 0 and 1, got {rate}")]
    RateOutOfRange { slab: usize, rate: Decimal },

    #[error("slab {slab}: end {end} must be greater than start {start}")]
    EmptyRange {
        slab: usize,
        start: Decimal,
        end: Decimal,
    },

    #[error("slab {slab}: start is below the previous slab's start")]
    Unordered { slab: usize },

    #[error("slab {slab}: only the last slab may be unbounded")]
    UnboundedNotLast { slab: usize },
}
