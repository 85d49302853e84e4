//! Unit and format names accepted in configuration files.
//!
//! All of these parse case-insensitively and ignore spaces and underscores, so
//! `"Nautical Miles"`, `"NauticalMiles"` and `"nautical_miles"` are the same value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Format of the `time_of_day` setting.
pub const TIME_OF_DAY_FORMAT: &str = "%Y%m%d %H:%M";

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Time units used for impedance in solver output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeUnits {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Hours => "hours",
            Self::Minutes => "minutes",
            Self::Seconds => "seconds",
        }
    }
}

impl FromStr for TimeUnits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "days" => Ok(Self::Days),
            "hours" => Ok(Self::Hours),
            "minutes" => Ok(Self::Minutes),
            "seconds" => Ok(Self::Seconds),
            _ => Err(ConfigError::ValidationError(format!(
                "Invalid time units: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TimeUnits {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeUnits> for String {
    fn from(value: TimeUnits) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance units used in solver output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistanceUnits {
    Kilometers,
    Meters,
    Miles,
    Yards,
    Feet,
    NauticalMiles,
}

impl DistanceUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kilometers => "kilometers",
            Self::Meters => "meters",
            Self::Miles => "miles",
            Self::Yards => "yards",
            Self::Feet => "feet",
            Self::NauticalMiles => "nautical_miles",
        }
    }
}

impl FromStr for DistanceUnits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "kilometers" => Ok(Self::Kilometers),
            "meters" => Ok(Self::Meters),
            "miles" => Ok(Self::Miles),
            "yards" => Ok(Self::Yards),
            "feet" => Ok(Self::Feet),
            "nauticalmiles" => Ok(Self::NauticalMiles),
            _ => Err(ConfigError::ValidationError(format!(
                "Invalid distance units: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for DistanceUnits {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DistanceUnits> for String {
    fn from(value: DistanceUnits) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DistanceUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding of the merged outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    /// Row-oriented SQLite tables, batched inserts.
    Sqlite,
    /// Delimited text, streaming append.
    Csv,
    /// Column-blocked JSON Lines, flushed every `block_rows` rows.
    Columnar,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Csv => "csv",
            Self::Columnar => "columnar",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "sqlite" | "table" => Ok(Self::Sqlite),
            "csv" | "csvfiles" => Ok(Self::Csv),
            "columnar" | "blocked" => Ok(Self::Columnar),
            _ => Err(ConfigError::ValidationError(format!(
                "Invalid output format: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
