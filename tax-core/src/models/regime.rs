use std::fmt;

use serde::{Deserialize, Serialize};

/// Which slab regime a calculation runs under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    /// Fixed pay is a share of CTC; flat deduction; plain slab tax.
    Legacy,
    /// Deduction from CTC, zero-tax threshold, marginal relief and cess.
    #[default]
    Current,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Current => "current",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "old" => Some(Self::Legacy),
            "current" | "new" => Some(Self::Current),
            _ => None,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_names_and_aliases() {
        assert_eq!(Regime::parse("legacy"), Some(Regime::Legacy));
        assert_eq!(Regime::parse(" Current "), Some(Regime::Current));
        assert_eq!(Regime::parse("new"), Some(Regime::Current));
        assert_eq!(Regime::parse("old"), Some(Regime::Legacy));
        assert_eq!(Regime::parse("flat"), None);
    }

    #[test]
    fn as_str_round_trips_through_parse() {
        for regime in [Regime::Legacy, Regime::Current] {
            assert_eq!(Regime::parse(regime.as_str()), Some(regime));
        }
    }
}
