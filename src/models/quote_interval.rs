use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Bar interval accepted by the chart endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteInterval {
    /// 1-minute bars
    Minute1,
    /// 5-minute bars
    Minute5,
    /// 15-minute bars
    Minute15,
    /// 30-minute bars
    Minute30,
    /// 60-minute bars
    Minute60,
    /// 90-minute bars
    Minute90,
    /// Daily bars
    Day1,
    /// Weekly bars
    Week1,
    /// Monthly bars
    Month1,
}

impl QuoteInterval {
    /// Query-string representation
    pub fn to_api_format(&self) -> &'static str {
        match self {
            QuoteInterval::Minute1 => "1m",
            QuoteInterval::Minute5 => "5m",
            QuoteInterval::Minute15 => "15m",
            QuoteInterval::Minute30 => "30m",
            QuoteInterval::Minute60 => "60m",
            QuoteInterval::Minute90 => "90m",
            QuoteInterval::Day1 => "1d",
            QuoteInterval::Week1 => "1wk",
            QuoteInterval::Month1 => "1mo",
        }
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self, QuoteInterval::Day1 | QuoteInterval::Week1 | QuoteInterval::Month1)
    }
}

impl FromStr for QuoteInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(QuoteInterval::Minute1),
            "5m" => Ok(QuoteInterval::Minute5),
            "15m" => Ok(QuoteInterval::Minute15),
            "30m" => Ok(QuoteInterval::Minute30),
            "60m" | "1h" => Ok(QuoteInterval::Minute60),
            "90m" => Ok(QuoteInterval::Minute90),
            "1d" => Ok(QuoteInterval::Day1),
            "1wk" => Ok(QuoteInterval::Week1),
            "1mo" => Ok(QuoteInterval::Month1),
            _ => Err(Error::InvalidInput(format!(
                "Invalid interval: {}. Valid options: 1m, 5m, 15m, 30m, 60m, 90m, 1d, 1wk, 1mo",
                s
            ))),
        }
    }
}

impl fmt::Display for QuoteInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_api_format())
    }
}

impl Default for QuoteInterval {
    fn default() -> Self {
        QuoteInterval::Minute60
    }
}

/// Look-back window of a chart request (`100d`, `730d`, `1y`, `ytd`, `max`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRange(String);

impl QuoteRange {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for QuoteRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "ytd" || s == "max" {
            return Ok(QuoteRange(s));
        }

        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);
        let valid_count = count.parse::<u32>().map(|n| n > 0).unwrap_or(false);
        let valid_unit = matches!(unit, "d" | "wk" | "mo" | "y");

        if valid_count && valid_unit {
            Ok(QuoteRange(s))
        } else {
            Err(Error::InvalidInput(format!(
                "Invalid range: {}. Expected <count><d|wk|mo|y>, ytd or max",
                s
            )))
        }
    }
}

impl fmt::Display for QuoteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for QuoteRange {
    fn default() -> Self {
        QuoteRange("730d".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_round_trip_format() {
        assert_eq!("60m".parse::<QuoteInterval>().unwrap(), QuoteInterval::Minute60);
        assert_eq!("1H".parse::<QuoteInterval>().unwrap(), QuoteInterval::Minute60);
        assert_eq!(QuoteInterval::Day1.to_api_format(), "1d");
        assert!("2h".parse::<QuoteInterval>().is_err());
        assert!(QuoteInterval::Minute60.is_intraday());
        assert!(!QuoteInterval::Day1.is_intraday());
    }

    #[test]
    fn test_range_parse() {
        assert_eq!("730d".parse::<QuoteRange>().unwrap().as_str(), "730d");
        assert_eq!("MAX".parse::<QuoteRange>().unwrap().as_str(), "max");
        assert_eq!("6mo".parse::<QuoteRange>().unwrap().as_str(), "6mo");
        assert!("0d".parse::<QuoteRange>().is_err());
        assert!("d".parse::<QuoteRange>().is_err());
        assert!("10h".parse::<QuoteRange>().is_err());
    }
}
