//! Forecast horizons and their trading-day offsets.
//!
//! The label vocabulary is fixed; the horizon→trading-day mapping is a
//! lookup table (21 sessions/month, 252/year), not inferred from calendars.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A forward-looking forecast horizon from the fixed vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Horizon {
    OneMonth,
    SixMonths,
    OneYear,
    TwoYears,
    ThreeYears,
    FourYears,
    FiveYears,
}

/// Unknown horizon label.
#[derive(Debug, Error)]
#[error("unknown horizon label '{0}' (expected one of 1mo, 6mo, 1yr, 2yr, 3yr, 4yr, 5yr)")]
pub struct HorizonParseError(pub String);

impl Horizon {
    /// All horizons in ascending order.
    pub const ALL: [Horizon; 7] = [
        Horizon::OneMonth,
        Horizon::SixMonths,
        Horizon::OneYear,
        Horizon::TwoYears,
        Horizon::ThreeYears,
        Horizon::FourYears,
        Horizon::FiveYears,
    ];

    /// The wire label for this horizon.
    pub fn label(&self) -> &'static str {
        match self {
            Horizon::OneMonth => "1mo",
            Horizon::SixMonths => "6mo",
            Horizon::OneYear => "1yr",
            Horizon::TwoYears => "2yr",
            Horizon::ThreeYears => "3yr",
            Horizon::FourYears => "4yr",
            Horizon::FiveYears => "5yr",
        }
    }

    /// Trading-day offset for this horizon. Fixed lookup table.
    pub fn trading_days(&self) -> usize {
        match self {
            Horizon::OneMonth => 21,
            Horizon::SixMonths => 126,
            Horizon::OneYear => 252,
            Horizon::TwoYears => 504,
            Horizon::ThreeYears => 756,
            Horizon::FourYears => 1008,
            Horizon::FiveYears => 1260,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Horizon {
    type Err = HorizonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1mo" => Ok(Horizon::OneMonth),
            "6mo" => Ok(Horizon::SixMonths),
            "1yr" => Ok(Horizon::OneYear),
            "2yr" => Ok(Horizon::TwoYears),
            "3yr" => Ok(Horizon::ThreeYears),
            "4yr" => Ok(Horizon::FourYears),
            "5yr" => Ok(Horizon::FiveYears),
            other => Err(HorizonParseError(other.to_string())),
        }
    }
}

impl TryFrom<String> for Horizon {
    type Error = HorizonParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Horizon> for String {
    fn from(h: Horizon) -> String {
        h.label().to_string()
    }
}

/// Parse, deduplicate, and sort a set of horizon labels.
///
/// The result is ascending by trading days; an empty input is an error at the
/// orchestration layer, not here.
pub fn parse_horizons(labels: &[String]) -> Result<Vec<Horizon>, HorizonParseError> {
    let mut horizons: Vec<Horizon> = labels
        .iter()
        .map(|l| l.parse())
        .collect::<Result<Vec<_>, _>>()?;
    horizons.sort();
    horizons.dedup();
    Ok(horizons)
}
