//! Typed group-by specs and the flattened `LinkableSpecSet` projection.

use serde::Serialize;

use crate::model::{DatePart, EntityReference, TimeGranularity};

use super::linkable::types::{
    qualified_name, ElementPathKey, LinkableElementType, METRIC_TIME_ELEMENT_NAME,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DimensionSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeDimensionSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    pub time_granularity: Option<TimeGranularity>,
    pub date_part: Option<DatePart>,
}

impl TimeDimensionSpec {
    pub fn metric_time(granularity: TimeGranularity) -> Self {
        Self {
            element_name: METRIC_TIME_ELEMENT_NAME.to_string(),
            entity_links: Vec::new(),
            time_granularity: Some(granularity),
            date_part: None,
        }
    }

    pub fn is_metric_time(&self) -> bool {
        self.element_name == METRIC_TIME_ELEMENT_NAME && self.entity_links.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntitySpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
}

/// A metric requested as a group-by item. The last entity link is the
/// entity the metric is grouped by before being joined in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupByMetricSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
}

/// Any resolved group-by item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupBySpec {
    Dimension(DimensionSpec),
    TimeDimension(TimeDimensionSpec),
    Entity(EntitySpec),
    Metric(GroupByMetricSpec),
}

impl GroupBySpec {
    pub fn from_path_key(key: &ElementPathKey) -> Self {
        let element_name = key.element_name.clone();
        let entity_links = key.entity_links.clone();
        match key.element_type {
            LinkableElementType::Dimension => GroupBySpec::Dimension(DimensionSpec {
                element_name,
                entity_links,
            }),
            LinkableElementType::TimeDimension => GroupBySpec::TimeDimension(TimeDimensionSpec {
                element_name,
                entity_links,
                time_granularity: key.time_granularity,
                date_part: key.date_part,
            }),
            LinkableElementType::Entity => GroupBySpec::Entity(EntitySpec {
                element_name,
                entity_links,
            }),
            LinkableElementType::Metric => GroupBySpec::Metric(GroupByMetricSpec {
                element_name,
                entity_links,
            }),
        }
    }

    pub fn path_key(&self) -> ElementPathKey {
        match self {
            GroupBySpec::Dimension(s) => ElementPathKey::new(
                &s.element_name,
                LinkableElementType::Dimension,
                s.entity_links.clone(),
            ),
            GroupBySpec::TimeDimension(s) => ElementPathKey::new(
                &s.element_name,
                LinkableElementType::TimeDimension,
                s.entity_links.clone(),
            )
            .with_time(s.time_granularity, s.date_part),
            GroupBySpec::Entity(s) => ElementPathKey::new(
                &s.element_name,
                LinkableElementType::Entity,
                s.entity_links.clone(),
            ),
            GroupBySpec::Metric(s) => ElementPathKey::new(
                &s.element_name,
                LinkableElementType::Metric,
                s.entity_links.clone(),
            ),
        }
    }

    pub fn qualified_name(&self) -> String {
        match self {
            GroupBySpec::Dimension(s) => qualified_name(&s.element_name, &s.entity_links, None, None),
            GroupBySpec::TimeDimension(s) => qualified_name(
                &s.element_name,
                &s.entity_links,
                s.time_granularity,
                s.date_part,
            ),
            GroupBySpec::Entity(s) => qualified_name(&s.element_name, &s.entity_links, None, None),
            GroupBySpec::Metric(s) => qualified_name(&s.element_name, &s.entity_links, None, None),
        }
    }

    pub fn is_metric_time(&self) -> bool {
        matches!(self, GroupBySpec::TimeDimension(s) if s.is_metric_time())
    }
}

impl std::fmt::Display for GroupBySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// A linkable element set flattened into typed spec lists, each sorted by
/// qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkableSpecSet {
    pub dimension_specs: Vec<DimensionSpec>,
    pub time_dimension_specs: Vec<TimeDimensionSpec>,
    pub entity_specs: Vec<EntitySpec>,
    pub group_by_metric_specs: Vec<GroupByMetricSpec>,
}

impl LinkableSpecSet {
    pub fn from_path_keys<'a>(keys: impl IntoIterator<Item = &'a ElementPathKey>) -> Self {
        let mut set = LinkableSpecSet::default();
        let mut specs: Vec<(String, GroupBySpec)> = keys
            .into_iter()
            .map(|key| (key.qualified_name(), GroupBySpec::from_path_key(key)))
            .collect();
        specs.sort();
        specs.dedup();
        for (_, spec) in specs {
            match spec {
                GroupBySpec::Dimension(s) => set.dimension_specs.push(s),
                GroupBySpec::TimeDimension(s) => set.time_dimension_specs.push(s),
                GroupBySpec::Entity(s) => set.entity_specs.push(s),
                GroupBySpec::Metric(s) => set.group_by_metric_specs.push(s),
            }
        }
        set
    }

    /// Every spec, dimensions first, then time dimensions, entities and metrics.
    pub fn all_specs(&self) -> Vec<GroupBySpec> {
        self.dimension_specs
            .iter()
            .cloned()
            .map(GroupBySpec::Dimension)
            .chain(
                self.time_dimension_specs
                    .iter()
                    .cloned()
                    .map(GroupBySpec::TimeDimension),
            )
            .chain(self.entity_specs.iter().cloned().map(GroupBySpec::Entity))
            .chain(
                self.group_by_metric_specs
                    .iter()
                    .cloned()
                    .map(GroupBySpec::Metric),
            )
            .collect()
    }

    /// Distinct qualified names, sorted. Used for suggestions.
    pub fn qualified_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.all_specs().iter().map(|s| s.qualified_name()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.dimension_specs.len()
            + self.time_dimension_specs.len()
            + self.entity_specs.len()
            + self.group_by_metric_specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
