//! Metric definitions.

use serde::{Deserialize, Serialize};

use super::filter::WhereFilter;
use super::references::{EntityReference, MeasureReference, MetricReference};
use super::types::TimeGranularity;

/// Discriminant of [`MetricKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Simple,
    Ratio,
    Cumulative,
    Derived,
    Conversion,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Simple => "simple",
            MetricType::Ratio => "ratio",
            MetricType::Cumulative => "cumulative",
            MetricType::Derived => "derived",
            MetricType::Conversion => "conversion",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named computed quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: MetricKind,
    /// Filter applied to every measure feeding this metric.
    #[serde(default)]
    pub filter: Option<WhereFilter>,
}

/// Shape of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricKind {
    Simple {
        measure: MetricInputMeasure,
    },
    Ratio {
        numerator: MetricInput,
        denominator: MetricInput,
    },
    Cumulative {
        measure: MetricInputMeasure,
        #[serde(default)]
        window: Option<MetricTimeWindow>,
        #[serde(default)]
        grain_to_date: Option<TimeGranularity>,
    },
    Derived {
        expr: String,
        metrics: Vec<MetricInput>,
    },
    Conversion {
        base_measure: MetricInputMeasure,
        conversion_measure: MetricInputMeasure,
        entity: String,
        #[serde(default)]
        window: Option<MetricTimeWindow>,
        #[serde(default)]
        calculation: ConversionCalculationType,
    },
}

/// A measure used by a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricInputMeasure {
    pub name: String,
    #[serde(default)]
    pub filter: Option<WhereFilter>,
}

impl MetricInputMeasure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: None,
        }
    }

    pub fn reference(&self) -> MeasureReference {
        MeasureReference::new(&self.name)
    }
}

/// Another metric used by a ratio or derived metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricInput {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub filter: Option<WhereFilter>,
}

impl MetricInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            filter: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn reference(&self) -> MetricReference {
        MetricReference::new(&self.name)
    }
}

/// A trailing window such as `7 days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTimeWindow {
    pub count: u32,
    pub granularity: TimeGranularity,
}

impl std::fmt::Display for MetricTimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.count, self.granularity)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionCalculationType {
    #[default]
    ConversionRate,
    Conversions,
}

impl Metric {
    fn with_kind(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            filter: None,
        }
    }

    pub fn simple(name: impl Into<String>, measure: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            MetricKind::Simple {
                measure: MetricInputMeasure::new(measure),
            },
        )
    }

    pub fn ratio(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            name,
            MetricKind::Ratio {
                numerator: MetricInput::new(numerator),
                denominator: MetricInput::new(denominator),
            },
        )
    }

    pub fn cumulative(
        name: impl Into<String>,
        measure: impl Into<String>,
        window: Option<MetricTimeWindow>,
    ) -> Self {
        Self::with_kind(
            name,
            MetricKind::Cumulative {
                measure: MetricInputMeasure::new(measure),
                window,
                grain_to_date: None,
            },
        )
    }

    pub fn derived(name: impl Into<String>, expr: impl Into<String>, metrics: Vec<MetricInput>) -> Self {
        Self::with_kind(
            name,
            MetricKind::Derived {
                expr: expr.into(),
                metrics,
            },
        )
    }

    pub fn conversion(
        name: impl Into<String>,
        base_measure: impl Into<String>,
        conversion_measure: impl Into<String>,
        entity: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            name,
            MetricKind::Conversion {
                base_measure: MetricInputMeasure::new(base_measure),
                conversion_measure: MetricInputMeasure::new(conversion_measure),
                entity: entity.into(),
                window: None,
                calculation: ConversionCalculationType::default(),
            },
        )
    }

    pub fn with_filter(mut self, filter: WhereFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn reference(&self) -> MetricReference {
        MetricReference::new(&self.name)
    }

    pub fn metric_type(&self) -> MetricType {
        match self.kind {
            MetricKind::Simple { .. } => MetricType::Simple,
            MetricKind::Ratio { .. } => MetricType::Ratio,
            MetricKind::Cumulative { .. } => MetricType::Cumulative,
            MetricKind::Derived { .. } => MetricType::Derived,
            MetricKind::Conversion { .. } => MetricType::Conversion,
        }
    }

    /// Measures referenced directly by this metric (not through other metrics).
    pub fn direct_measures(&self) -> Vec<&MetricInputMeasure> {
        match &self.kind {
            MetricKind::Simple { measure } | MetricKind::Cumulative { measure, .. } => {
                vec![measure]
            }
            MetricKind::Conversion {
                base_measure,
                conversion_measure,
                ..
            } => vec![base_measure, conversion_measure],
            MetricKind::Ratio { .. } | MetricKind::Derived { .. } => vec![],
        }
    }

    /// Metrics referenced directly by this metric.
    pub fn input_metrics(&self) -> Vec<&MetricInput> {
        match &self.kind {
            MetricKind::Ratio {
                numerator,
                denominator,
            } => vec![numerator, denominator],
            MetricKind::Derived { metrics, .. } => metrics.iter().collect(),
            MetricKind::Simple { .. }
            | MetricKind::Cumulative { .. }
            | MetricKind::Conversion { .. } => vec![],
        }
    }

    /// Entity the conversion events are matched on.
    pub fn conversion_entity(&self) -> Option<EntityReference> {
        match &self.kind {
            MetricKind::Conversion { entity, .. } => Some(EntityReference::new(entity)),
            _ => None,
        }
    }
}
