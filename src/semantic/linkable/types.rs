//! Linkable elements: dimensions, entities and metrics reachable from a measure.

use std::collections::BTreeSet;

use crate::model::{
    DatePart, DimensionType, EntityReference, MetricReference, SemanticModelReference,
    TimeGranularity,
};
use crate::semantic::error::{SemanticError, SemanticResult};

/// Name of the virtual time dimension standing in for each measure's aggregation time.
pub const METRIC_TIME_ELEMENT_NAME: &str = "metric_time";

/// Separator between entity links and element names in qualified names.
pub const DUNDER: &str = "__";

/// How a linkable element was reached. Not mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkableElementProperty {
    /// Defined in the measure's own semantic model.
    Local,
    /// Local element addressed through one of the model's own entities.
    LocalLinked,
    /// Reached through at least one join.
    Joined,
    /// Reached through two or more joins.
    MultiHop,
    Entity,
    /// Another metric used as a group-by item.
    Metric,
    MetricTime,
    /// A rollup or date part of a time dimension rather than its declared grain.
    DerivedTimeGranularity,
}

impl LinkableElementProperty {
    pub const ALL: [LinkableElementProperty; 8] = [
        LinkableElementProperty::Local,
        LinkableElementProperty::LocalLinked,
        LinkableElementProperty::Joined,
        LinkableElementProperty::MultiHop,
        LinkableElementProperty::Entity,
        LinkableElementProperty::Metric,
        LinkableElementProperty::MetricTime,
        LinkableElementProperty::DerivedTimeGranularity,
    ];

    pub fn all() -> BTreeSet<LinkableElementProperty> {
        Self::ALL.into_iter().collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkableElementProperty::Local => "local",
            LinkableElementProperty::LocalLinked => "local_linked",
            LinkableElementProperty::Joined => "joined",
            LinkableElementProperty::MultiHop => "multi_hop",
            LinkableElementProperty::Entity => "entity",
            LinkableElementProperty::Metric => "metric",
            LinkableElementProperty::MetricTime => "metric_time",
            LinkableElementProperty::DerivedTimeGranularity => "derived_time_granularity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == lower)
    }
}

impl std::fmt::Display for LinkableElementProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkableElementType {
    Dimension,
    TimeDimension,
    Entity,
    Metric,
}

/// Identity of a group-by item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementPathKey {
    pub element_name: String,
    pub element_type: LinkableElementType,
    pub entity_links: Vec<EntityReference>,
    pub time_granularity: Option<TimeGranularity>,
    pub date_part: Option<DatePart>,
}

impl ElementPathKey {
    pub fn new(
        element_name: impl Into<String>,
        element_type: LinkableElementType,
        entity_links: Vec<EntityReference>,
    ) -> Self {
        Self {
            element_name: element_name.into(),
            element_type,
            entity_links,
            time_granularity: None,
            date_part: None,
        }
    }

    pub fn with_time(
        mut self,
        time_granularity: Option<TimeGranularity>,
        date_part: Option<DatePart>,
    ) -> Self {
        self.time_granularity = time_granularity;
        self.date_part = date_part;
        self
    }

    /// Name as written in a query: `listing__country_latest`, `metric_time__month`,
    /// `booking__ds__extract_dow`. Date parts omit the granularity.
    pub fn qualified_name(&self) -> String {
        qualified_name(
            &self.element_name,
            &self.entity_links,
            self.time_granularity,
            self.date_part,
        )
    }

    pub fn is_metric_time(&self) -> bool {
        self.element_name == METRIC_TIME_ELEMENT_NAME && self.entity_links.is_empty()
    }
}

impl std::fmt::Display for ElementPathKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

pub(crate) fn qualified_name(
    element_name: &str,
    entity_links: &[EntityReference],
    time_granularity: Option<TimeGranularity>,
    date_part: Option<DatePart>,
) -> String {
    let mut parts: Vec<String> = entity_links.iter().map(|e| e.to_string()).collect();
    parts.push(element_name.to_string());
    match (date_part, time_granularity) {
        (Some(part), _) => parts.push(format!("extract_{}", part)),
        (None, Some(granularity)) => parts.push(granularity.to_string()),
        (None, None) => {}
    }
    parts.join(DUNDER)
}

/// One join step: join into `semantic_model` on `join_on_entity`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticModelJoinPathElement {
    pub semantic_model: SemanticModelReference,
    pub join_on_entity: EntityReference,
}

/// Non-empty chain of joins starting from an implicit origin model.
///
/// Never repeats a semantic model or an entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticModelJoinPath {
    steps: Vec<SemanticModelJoinPathElement>,
}

impl SemanticModelJoinPath {
    pub fn new(steps: Vec<SemanticModelJoinPathElement>) -> SemanticResult<Self> {
        if steps.is_empty() {
            return Err(SemanticError::Internal(
                "a join path needs at least one step".into(),
            ));
        }
        let models: BTreeSet<_> = steps.iter().map(|s| &s.semantic_model).collect();
        let entities: BTreeSet<_> = steps.iter().map(|s| &s.join_on_entity).collect();
        if models.len() != steps.len() || entities.len() != steps.len() {
            return Err(SemanticError::Internal(format!(
                "join path repeats a semantic model or entity: {}",
                describe_steps(&steps)
            )));
        }
        Ok(Self { steps })
    }

    pub fn from_single_element(
        semantic_model: SemanticModelReference,
        join_on_entity: EntityReference,
    ) -> Self {
        Self {
            steps: vec![SemanticModelJoinPathElement {
                semantic_model,
                join_on_entity,
            }],
        }
    }

    pub fn steps(&self) -> &[SemanticModelJoinPathElement] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_step(&self) -> &SemanticModelJoinPathElement {
        // Construction guarantees at least one step.
        &self.steps[self.steps.len() - 1]
    }

    pub fn last_semantic_model(&self) -> &SemanticModelReference {
        &self.last_step().semantic_model
    }

    pub fn last_entity(&self) -> &EntityReference {
        &self.last_step().join_on_entity
    }

    pub fn entity_links(&self) -> Vec<EntityReference> {
        self.steps.iter().map(|s| s.join_on_entity.clone()).collect()
    }

    pub fn semantic_models(&self) -> Vec<SemanticModelReference> {
        self.steps.iter().map(|s| s.semantic_model.clone()).collect()
    }

    pub fn contains_model(&self, model: &SemanticModelReference) -> bool {
        self.steps.iter().any(|s| &s.semantic_model == model)
    }

    pub fn contains_entity(&self, entity: &EntityReference) -> bool {
        self.steps.iter().any(|s| &s.join_on_entity == entity)
    }

    /// Extend by one step. `None` if the step would revisit `origin`, a model
    /// already on the path, or an entity already used.
    pub fn extend(
        &self,
        origin: &SemanticModelReference,
        semantic_model: SemanticModelReference,
        join_on_entity: EntityReference,
    ) -> Option<Self> {
        if &semantic_model == origin
            || self.contains_model(&semantic_model)
            || self.contains_entity(&join_on_entity)
        {
            return None;
        }
        let mut steps = self.steps.clone();
        steps.push(SemanticModelJoinPathElement {
            semantic_model,
            join_on_entity,
        });
        Some(Self { steps })
    }
}

impl std::fmt::Display for SemanticModelJoinPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&describe_steps(&self.steps))
    }
}

fn describe_steps(steps: &[SemanticModelJoinPathElement]) -> String {
    steps
        .iter()
        .map(|s| format!("{}({})", s.semantic_model, s.join_on_entity))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Where an element really comes from. Two elements under one path key are
/// the same element exactly when their provenance matches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementProvenance {
    pub defined_in: Option<SemanticModelReference>,
    pub via: Vec<SemanticModelReference>,
}

/// Behaviour shared by the three kinds of linkable element.
pub trait LinkableElement: Clone + Ord {
    fn path_key(&self) -> ElementPathKey;

    fn properties(&self) -> &BTreeSet<LinkableElementProperty>;

    fn properties_mut(&mut self) -> &mut BTreeSet<LinkableElementProperty>;

    fn join_path(&self) -> Option<&SemanticModelJoinPath>;

    fn provenance(&self) -> ElementProvenance;

    /// Model the element's column lives in, if any.
    fn defined_in(&self) -> Option<&SemanticModelReference>;
}

/// Intermediate models of a dimension or entity join path: every step but the last.
fn intermediate_models(join_path: Option<&SemanticModelJoinPath>) -> Vec<SemanticModelReference> {
    match join_path {
        Some(path) => {
            let models = path.semantic_models();
            models[..models.len() - 1].to_vec()
        }
        None => Vec::new(),
    }
}

/// A dimension (categorical or time) reachable as a group-by item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkableDimension {
    pub element_name: String,
    /// `None` for metric_time.
    pub defined_in: Option<SemanticModelReference>,
    pub dimension_type: DimensionType,
    pub entity_links: Vec<EntityReference>,
    pub join_path: Option<SemanticModelJoinPath>,
    pub properties: BTreeSet<LinkableElementProperty>,
    pub time_granularity: Option<TimeGranularity>,
    pub date_part: Option<DatePart>,
}

impl LinkableDimension {
    pub fn is_time(&self) -> bool {
        self.dimension_type == DimensionType::Time
    }
}

impl LinkableElement for LinkableDimension {
    fn path_key(&self) -> ElementPathKey {
        let element_type = match self.dimension_type {
            DimensionType::Categorical => LinkableElementType::Dimension,
            DimensionType::Time => LinkableElementType::TimeDimension,
        };
        ElementPathKey::new(&self.element_name, element_type, self.entity_links.clone())
            .with_time(self.time_granularity, self.date_part)
    }

    fn properties(&self) -> &BTreeSet<LinkableElementProperty> {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut BTreeSet<LinkableElementProperty> {
        &mut self.properties
    }

    fn join_path(&self) -> Option<&SemanticModelJoinPath> {
        self.join_path.as_ref()
    }

    fn provenance(&self) -> ElementProvenance {
        ElementProvenance {
            defined_in: self.defined_in.clone(),
            via: intermediate_models(self.join_path.as_ref()),
        }
    }

    fn defined_in(&self) -> Option<&SemanticModelReference> {
        self.defined_in.as_ref()
    }
}

/// An entity reachable as a group-by item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkableEntity {
    pub element_name: String,
    pub defined_in: SemanticModelReference,
    pub entity_links: Vec<EntityReference>,
    pub join_path: Option<SemanticModelJoinPath>,
    pub properties: BTreeSet<LinkableElementProperty>,
}

impl LinkableElement for LinkableEntity {
    fn path_key(&self) -> ElementPathKey {
        ElementPathKey::new(
            &self.element_name,
            LinkableElementType::Entity,
            self.entity_links.clone(),
        )
    }

    fn properties(&self) -> &BTreeSet<LinkableElementProperty> {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut BTreeSet<LinkableElementProperty> {
        &mut self.properties
    }

    fn join_path(&self) -> Option<&SemanticModelJoinPath> {
        self.join_path.as_ref()
    }

    fn provenance(&self) -> ElementProvenance {
        ElementProvenance {
            defined_in: Some(self.defined_in.clone()),
            via: intermediate_models(self.join_path.as_ref()),
        }
    }

    fn defined_in(&self) -> Option<&SemanticModelReference> {
        Some(&self.defined_in)
    }
}

/// A metric used as a group-by item, computed per `join_on_entity` and joined
/// onto the model at the end of `join_path` (or the origin model when local).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkableMetric {
    pub metric: MetricReference,
    pub join_on_entity: EntityReference,
    pub join_path: Option<SemanticModelJoinPath>,
    pub properties: BTreeSet<LinkableElementProperty>,
}

impl LinkableMetric {
    /// Entity links of the path key: the join path's links then the join entity.
    pub fn entity_links(&self) -> Vec<EntityReference> {
        let mut links = self
            .join_path
            .as_ref()
            .map(|p| p.entity_links())
            .unwrap_or_default();
        links.push(self.join_on_entity.clone());
        links
    }
}

impl LinkableElement for LinkableMetric {
    fn path_key(&self) -> ElementPathKey {
        ElementPathKey::new(
            self.metric.as_str(),
            LinkableElementType::Metric,
            self.entity_links(),
        )
    }

    fn properties(&self) -> &BTreeSet<LinkableElementProperty> {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut BTreeSet<LinkableElementProperty> {
        &mut self.properties
    }

    fn join_path(&self) -> Option<&SemanticModelJoinPath> {
        self.join_path.as_ref()
    }

    fn provenance(&self) -> ElementProvenance {
        ElementProvenance {
            defined_in: None,
            via: self
                .join_path
                .as_ref()
                .map(|p| p.semantic_models())
                .unwrap_or_default(),
        }
    }

    fn defined_in(&self) -> Option<&SemanticModelReference> {
        None
    }
}
