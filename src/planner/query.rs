//! Query input as written by a caller, and its resolved form.

use serde::{Deserialize, Serialize};

use crate::model::{MetricReference, WhereFilter};
use crate::semantic::specs::GroupBySpec;

/// A query by name: metrics, group-by items, filters and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricQuery {
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Filter templates, e.g. `{{ Dimension('listing__country_latest') }} = 'us'`.
    #[serde(default)]
    pub where_filters: Vec<String>,
    /// Metric or group-by names, `-` prefixed for descending.
    #[serde(default)]
    pub order_by: Vec<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Write to this table instead of returning a dataframe.
    #[serde(default)]
    pub output_table: Option<String>,
}

impl MetricQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics.extend(metrics.into_iter().map(Into::into));
        self
    }

    pub fn group_by<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn where_filter(mut self, template: impl Into<String>) -> Self {
        self.where_filters.push(template.into());
        self
    }

    pub fn order_by(mut self, item: impl Into<String>) -> Self {
        self.order_by.push(item.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn output_table(mut self, table: impl Into<String>) -> Self {
        self.output_table = Some(table.into());
        self
    }
}

/// A where filter with its element references resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedWhereFilter {
    pub filter: WhereFilter,
    pub items: Vec<GroupBySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum OrderByTarget {
    Metric(MetricReference),
    GroupBy(GroupBySpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBySpec {
    pub target: OrderByTarget,
    pub descending: bool,
}

impl std::fmt::Display for OrderBySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        match &self.target {
            OrderByTarget::Metric(metric) => write!(f, "{}", metric),
            OrderByTarget::GroupBy(spec) => write!(f, "{}", spec),
        }
    }
}

/// Where the query result goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    Dataframe,
    Table(String),
}

/// A query whose names all resolved to registered metrics and path keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedQuery {
    pub metrics: Vec<MetricReference>,
    pub group_by: Vec<GroupBySpec>,
    pub where_filters: Vec<ResolvedWhereFilter>,
    pub order_by: Vec<OrderBySpec>,
    pub limit: Option<u64>,
    pub output: OutputTarget,
}

impl ResolvedQuery {
    /// True for a distinct-values query.
    pub fn has_no_metrics(&self) -> bool {
        self.metrics.is_empty()
    }
}
