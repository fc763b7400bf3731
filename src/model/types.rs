//! Canonical types shared by every dialect.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Warehouse-agnostic column kind.
///
/// Every native column type of every dialect maps to exactly one of these.
/// Native types a dialect does not recognise map to [`DimensionType::String`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    #[default]
    String,
    Number,
    Date,
    Timestamp,
    Boolean,
}

impl DimensionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionType::String => "string",
            DimensionType::Number => "number",
            DimensionType::Date => "date",
            DimensionType::Timestamp => "timestamp",
            DimensionType::Boolean => "boolean",
        }
    }

    /// Whether values of this kind are temporal.
    pub fn is_temporal(&self) -> bool {
        matches!(self, DimensionType::Date | DimensionType::Timestamp)
    }
}

impl fmt::Display for DimensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation kind of a metric.
///
/// The aggregate kinds render through the dialect's metric expression builder.
/// The non-aggregate kinds (`Number`, `String`, `Date`, `Boolean`) wrap an
/// expression that already aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Percentile,
    Median,
    Average,
    Count,
    CountDistinct,
    Sum,
    Min,
    Max,
    Number,
    String,
    Date,
    Boolean,
}

impl MetricType {
    /// Canonical type of the values this metric produces.
    ///
    /// Used to pick the rule renderer for metric filters.
    pub fn value_type(&self) -> DimensionType {
        match self {
            MetricType::String => DimensionType::String,
            MetricType::Date => DimensionType::Date,
            MetricType::Boolean => DimensionType::Boolean,
            _ => DimensionType::Number,
        }
    }
}

/// First day of the week used when truncating dates to weeks.
///
/// Serialized as an index, Monday = 0 through Sunday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WeekDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekDay {
    pub fn index(&self) -> u8 {
        match self {
            WeekDay::Monday => 0,
            WeekDay::Tuesday => 1,
            WeekDay::Wednesday => 2,
            WeekDay::Thursday => 3,
            WeekDay::Friday => 4,
            WeekDay::Saturday => 5,
            WeekDay::Sunday => 6,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(WeekDay::Monday),
            1 => Some(WeekDay::Tuesday),
            2 => Some(WeekDay::Wednesday),
            3 => Some(WeekDay::Thursday),
            4 => Some(WeekDay::Friday),
            5 => Some(WeekDay::Saturday),
            6 => Some(WeekDay::Sunday),
            _ => None,
        }
    }

    pub fn to_chrono(self) -> chrono::Weekday {
        match self {
            WeekDay::Monday => chrono::Weekday::Mon,
            WeekDay::Tuesday => chrono::Weekday::Tue,
            WeekDay::Wednesday => chrono::Weekday::Wed,
            WeekDay::Thursday => chrono::Weekday::Thu,
            WeekDay::Friday => chrono::Weekday::Fri,
            WeekDay::Saturday => chrono::Weekday::Sat,
            WeekDay::Sunday => chrono::Weekday::Sun,
        }
    }
}

impl TryFrom<u8> for WeekDay {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        WeekDay::from_index(value).ok_or_else(|| format!("invalid week day index: {}", value))
    }
}

impl From<WeekDay> for u8 {
    fn from(day: WeekDay) -> Self {
        day.index()
    }
}
