//! Primitive enums shared by the semantic model types.

use serde::{Deserialize, Serialize};

/// Time granularity of a time dimension, from finest to coarsest.
///
/// The declaration order is the ordering used everywhere: `Day < Week < Month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGranularity {
    /// Every granularity, finest first.
    pub const ALL: [TimeGranularity; 11] = [
        TimeGranularity::Nanosecond,
        TimeGranularity::Microsecond,
        TimeGranularity::Millisecond,
        TimeGranularity::Second,
        TimeGranularity::Minute,
        TimeGranularity::Hour,
        TimeGranularity::Day,
        TimeGranularity::Week,
        TimeGranularity::Month,
        TimeGranularity::Quarter,
        TimeGranularity::Year,
    ];

    /// Size rank used to compare granularities with date parts.
    pub fn to_int(self) -> u32 {
        match self {
            TimeGranularity::Nanosecond => 10,
            TimeGranularity::Microsecond => 20,
            TimeGranularity::Millisecond => 30,
            TimeGranularity::Second => 40,
            TimeGranularity::Minute => 50,
            TimeGranularity::Hour => 60,
            TimeGranularity::Day => 70,
            TimeGranularity::Week => 80,
            TimeGranularity::Month => 90,
            TimeGranularity::Quarter => 100,
            TimeGranularity::Year => 110,
        }
    }

    /// Granularities at this level and coarser.
    pub fn and_coarser(self) -> impl Iterator<Item = TimeGranularity> {
        Self::ALL.into_iter().filter(move |g| g.to_int() >= self.to_int())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeGranularity::Nanosecond => "nanosecond",
            TimeGranularity::Microsecond => "microsecond",
            TimeGranularity::Millisecond => "millisecond",
            TimeGranularity::Second => "second",
            TimeGranularity::Minute => "minute",
            TimeGranularity::Hour => "hour",
            TimeGranularity::Day => "day",
            TimeGranularity::Week => "week",
            TimeGranularity::Month => "month",
            TimeGranularity::Quarter => "quarter",
            TimeGranularity::Year => "year",
        }
    }

    /// Parse a granularity name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL.into_iter().find(|g| g.as_str() == lower)
    }
}

impl std::fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar part that can be extracted from a time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Quarter,
    Month,
    Day,
    Dow,
    Doy,
}

impl DatePart {
    pub const ALL: [DatePart; 6] = [
        DatePart::Year,
        DatePart::Quarter,
        DatePart::Month,
        DatePart::Day,
        DatePart::Dow,
        DatePart::Doy,
    ];

    /// The smallest granularity the part is meaningful for.
    pub fn base_granularity(self) -> TimeGranularity {
        match self {
            DatePart::Year => TimeGranularity::Year,
            DatePart::Quarter => TimeGranularity::Quarter,
            DatePart::Month => TimeGranularity::Month,
            DatePart::Day | DatePart::Dow | DatePart::Doy => TimeGranularity::Day,
        }
    }

    pub fn to_int(self) -> u32 {
        self.base_granularity().to_int()
    }

    /// A part can be extracted at `granularity` only if the part is no finer.
    pub fn is_compatible_with(self, granularity: TimeGranularity) -> bool {
        granularity.to_int() <= self.to_int()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Quarter => "quarter",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::Dow => "dow",
            DatePart::Doy => "doy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == lower)
    }
}

impl std::fmt::Display for DatePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of an entity, which decides the fan-out risk of joining through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Exactly one row per key, never null.
    Primary,
    /// At most one row per key, may be null.
    Unique,
    /// Any number of rows per key.
    Foreign,
    /// Slowly changing key, unique only within a validity window.
    Natural,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Primary,
        EntityType::Unique,
        EntityType::Foreign,
        EntityType::Natural,
    ];

    /// Whether a model's own elements may be addressed through an entity of this type.
    pub fn is_locally_linkable(self) -> bool {
        matches!(
            self,
            EntityType::Primary | EntityType::Unique | EntityType::Natural
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Primary => "primary",
            EntityType::Unique => "unique",
            EntityType::Foreign => "foreign",
            EntityType::Natural => "natural",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimension type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    Categorical,
    Time,
}

/// Aggregation function of a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    Sum,
    Min,
    Max,
    Count,
    CountDistinct,
    SumBoolean,
    Average,
    Percentile,
    Median,
}

impl AggregationType {
    /// Whether partial aggregates can be re-aggregated with the same function.
    pub fn is_additive(self) -> bool {
        matches!(
            self,
            AggregationType::Sum | AggregationType::SumBoolean | AggregationType::Count
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Count => "count",
            AggregationType::CountDistinct => "count_distinct",
            AggregationType::SumBoolean => "sum_boolean",
            AggregationType::Average => "average",
            AggregationType::Percentile => "percentile",
            AggregationType::Median => "median",
        }
    }
}

impl std::fmt::Display for AggregationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
