//! Semantic models and the elements they declare.

use serde::{Deserialize, Serialize};

use super::references::{
    DimensionReference, EntityReference, MeasureReference, SemanticModelReference,
    TimeDimensionReference,
};
use super::types::{AggregationType, DimensionType, EntityType, TimeGranularity};

/// A named, table- or query-backed source of measures, dimensions and entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticModel {
    pub name: String,
    /// Physical relation, e.g. `analytics.fct_bookings`.
    #[serde(default)]
    pub node_relation: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Explicit primary entity for models without a `primary` typed entity.
    #[serde(default)]
    pub primary_entity: Option<String>,
    #[serde(default)]
    pub defaults: Option<SemanticModelDefaults>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// Model-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticModelDefaults {
    #[serde(default)]
    pub agg_time_dimension: Option<String>,
}

impl SemanticModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_relation: None,
            description: None,
            primary_entity: None,
            defaults: None,
            entities: Vec::new(),
            dimensions: Vec::new(),
            measures: Vec::new(),
        }
    }

    pub fn with_node_relation(mut self, relation: impl Into<String>) -> Self {
        self.node_relation = Some(relation.into());
        self
    }

    pub fn with_primary_entity(mut self, entity: impl Into<String>) -> Self {
        self.primary_entity = Some(entity.into());
        self
    }

    pub fn with_default_agg_time_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.defaults = Some(SemanticModelDefaults {
            agg_time_dimension: Some(dimension.into()),
        });
        self
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    pub fn reference(&self) -> SemanticModelReference {
        SemanticModelReference::new(&self.name)
    }

    pub fn get_entity(&self, entity: &EntityReference) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == entity.as_str())
    }

    pub fn get_dimension(&self, dimension: &DimensionReference) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == dimension.as_str())
    }

    pub fn get_measure(&self, measure: &MeasureReference) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == measure.as_str())
    }

    /// The primary entity: the explicit `primary_entity`, else the entity typed `primary`.
    pub fn primary_entity_reference(&self) -> Option<EntityReference> {
        if let Some(name) = &self.primary_entity {
            return Some(EntityReference::new(name));
        }
        self.entities
            .iter()
            .find(|e| e.entity_type == EntityType::Primary)
            .map(|e| e.reference())
    }

    /// Whether any dimension declares a validity window (slowly changing model).
    pub fn has_validity_window(&self) -> bool {
        self.dimensions.iter().any(|d| {
            d.type_params
                .as_ref()
                .is_some_and(|p| p.validity_params.is_some())
        })
    }
}

/// A typed join key inside a semantic model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub expr: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            expr: None,
            description: None,
        }
    }

    pub fn primary(name: impl Into<String>) -> Self {
        Self::new(name, EntityType::Primary)
    }

    pub fn unique(name: impl Into<String>) -> Self {
        Self::new(name, EntityType::Unique)
    }

    pub fn foreign(name: impl Into<String>) -> Self {
        Self::new(name, EntityType::Foreign)
    }

    pub fn natural(name: impl Into<String>) -> Self {
        Self::new(name, EntityType::Natural)
    }

    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    pub fn reference(&self) -> EntityReference {
        EntityReference::new(&self.name)
    }
}

/// A categorical or time dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    #[serde(default)]
    pub expr: Option<String>,
    #[serde(default)]
    pub type_params: Option<DimensionTypeParams>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Time-dimension parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionTypeParams {
    pub time_granularity: TimeGranularity,
    #[serde(default)]
    pub validity_params: Option<ValidityParams>,
}

/// Marks a time dimension as the start or end of a row's validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityParams {
    #[serde(default)]
    pub is_start: bool,
    #[serde(default)]
    pub is_end: bool,
}

impl Dimension {
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension_type: DimensionType::Categorical,
            expr: None,
            type_params: None,
            description: None,
        }
    }

    pub fn time(name: impl Into<String>, granularity: TimeGranularity) -> Self {
        Self {
            name: name.into(),
            dimension_type: DimensionType::Time,
            expr: None,
            type_params: Some(DimensionTypeParams {
                time_granularity: granularity,
                validity_params: None,
            }),
            description: None,
        }
    }

    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    /// Mark this time dimension as a validity window boundary.
    pub fn with_validity(mut self, is_start: bool, is_end: bool) -> Self {
        if let Some(params) = self.type_params.as_mut() {
            params.validity_params = Some(ValidityParams { is_start, is_end });
        }
        self
    }

    pub fn reference(&self) -> DimensionReference {
        DimensionReference::new(&self.name)
    }

    pub fn is_time(&self) -> bool {
        self.dimension_type == DimensionType::Time
    }

    /// Declared granularity; `None` for categorical dimensions.
    pub fn time_granularity(&self) -> Option<TimeGranularity> {
        match self.dimension_type {
            DimensionType::Time => self.type_params.as_ref().map(|p| p.time_granularity),
            DimensionType::Categorical => None,
        }
    }
}

/// An aggregatable column or expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub agg: AggregationType,
    #[serde(default)]
    pub expr: Option<String>,
    /// Overrides the model's default aggregation time dimension.
    #[serde(default)]
    pub agg_time_dimension: Option<String>,
    /// Present for semi-additive (windowed) measures.
    #[serde(default)]
    pub non_additive_dimension: Option<NonAdditiveDimension>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Window over which a semi-additive measure must not be summed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonAdditiveDimension {
    pub name: String,
    #[serde(default)]
    pub window_choice: Option<AggregationType>,
    #[serde(default)]
    pub window_groupings: Vec<String>,
}

impl Measure {
    pub fn new(name: impl Into<String>, agg: AggregationType) -> Self {
        Self {
            name: name.into(),
            agg,
            expr: None,
            agg_time_dimension: None,
            non_additive_dimension: None,
            description: None,
        }
    }

    pub fn sum(name: impl Into<String>) -> Self {
        Self::new(name, AggregationType::Sum)
    }

    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    pub fn with_agg_time_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.agg_time_dimension = Some(dimension.into());
        self
    }

    pub fn with_non_additive_dimension(mut self, dimension: NonAdditiveDimension) -> Self {
        self.non_additive_dimension = Some(dimension);
        self
    }

    pub fn reference(&self) -> MeasureReference {
        MeasureReference::new(&self.name)
    }

    pub fn is_non_additive(&self) -> bool {
        self.non_additive_dimension.is_some()
    }

    /// The aggregation time dimension name, falling back to the model default.
    pub fn agg_time_dimension_name(&self, model: &SemanticModel) -> Option<TimeDimensionReference> {
        self.agg_time_dimension
            .as_deref()
            .or_else(|| {
                model
                    .defaults
                    .as_ref()
                    .and_then(|d| d.agg_time_dimension.as_deref())
            })
            .map(TimeDimensionReference::new)
    }
}
