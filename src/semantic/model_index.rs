//! Semantic Model Index.
//!
//! Lookup tables over the semantic models of a manifest: models by name,
//! models by entity, the owning model of every measure, and the resolved
//! aggregation time dimension of every measure.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::model::{
    AggregationType, EntityReference, EntityType, Measure, MeasureReference, SemanticModel,
    SemanticModelReference, TimeDimensionReference, TimeGranularity,
};

use super::error::{
    ManifestIssue, ManifestValidationError, NotFoundError, SemanticError, SemanticResult,
};

/// Read-only view of an indexed set of semantic models.
pub trait SemanticModelAccessor {
    /// All semantic models in name order.
    fn semantic_models(&self) -> Vec<&SemanticModel>;

    fn get_by_reference(&self, model: &SemanticModelReference) -> Option<&SemanticModel>;

    /// Models declaring `entity`, in name order.
    fn get_semantic_models_for_entity(&self, entity: &EntityReference) -> Vec<&SemanticModel>;

    /// Entities through which the model's own elements can be addressed, sorted by name.
    fn entity_links_for_local_elements(&self, model: &SemanticModel) -> Vec<EntityReference>;

    fn get_semantic_model_for_measure(
        &self,
        measure: &MeasureReference,
    ) -> SemanticResult<&SemanticModel>;

    fn get_measure(&self, measure: &MeasureReference) -> SemanticResult<&Measure>;

    fn get_agg_time_dimension_for_measure(
        &self,
        measure: &MeasureReference,
    ) -> SemanticResult<TimeDimensionReference>;

    /// Declared granularity of the measure's aggregation time dimension.
    fn get_agg_time_granularity_for_measure(
        &self,
        measure: &MeasureReference,
    ) -> SemanticResult<TimeGranularity>;

    fn measure_exists(&self, measure: &MeasureReference) -> bool {
        self.get_semantic_model_for_measure(measure).is_ok()
    }
}

/// Resolved aggregation time dimension of one measure.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AggTimeDimension {
    dimension: TimeDimensionReference,
    granularity: TimeGranularity,
}

/// Index over the semantic models of a manifest. Immutable once built.
#[derive(Debug, Clone)]
pub struct SemanticModelIndex {
    models: BTreeMap<SemanticModelReference, SemanticModel>,
    entity_index: BTreeMap<EntityReference, BTreeSet<SemanticModelReference>>,
    measure_index: HashMap<MeasureReference, SemanticModelReference>,
    agg_time_dimensions: HashMap<MeasureReference, AggTimeDimension>,
}

impl SemanticModelIndex {
    /// Index `models`, failing with every issue found if any model is invalid.
    pub fn new(models: &[SemanticModel]) -> SemanticResult<Self> {
        let mut issues = Vec::new();
        let mut by_name: BTreeMap<SemanticModelReference, SemanticModel> = BTreeMap::new();
        let mut accepted: Vec<&SemanticModel> = Vec::new();

        for model in models {
            let reference = model.reference();
            if by_name.contains_key(&reference) {
                issues.push(ManifestIssue::DuplicateSemanticModel {
                    name: model.name.clone(),
                });
                continue;
            }
            validate_primary_entity(model, &mut issues);
            by_name.insert(reference, model.clone());
            accepted.push(model);
        }

        let mut measure_owners: BTreeMap<MeasureReference, Vec<(&SemanticModel, &Measure)>> =
            BTreeMap::new();
        for model in accepted {
            for measure in &model.measures {
                measure_owners
                    .entry(measure.reference())
                    .or_default()
                    .push((model, measure));
            }
        }

        let mut measure_index = HashMap::new();
        let mut agg_time_dimensions = HashMap::new();
        for (reference, owners) in &measure_owners {
            if owners.len() > 1 {
                let mut owner_models: Vec<String> =
                    owners.iter().map(|(m, _)| m.name.clone()).collect();
                owner_models.dedup();
                let mut aggregations: Vec<AggregationType> = Vec::new();
                for (_, measure) in owners {
                    if !aggregations.contains(&measure.agg) {
                        aggregations.push(measure.agg);
                    }
                }
                issues.push(ManifestIssue::MeasureInMultipleModels {
                    measure: reference.to_string(),
                    models: owner_models,
                    aggregations: (aggregations.len() > 1).then_some(aggregations),
                });
                continue;
            }

            let (model, measure) = owners[0];
            measure_index.insert(reference.clone(), model.reference());
            match resolve_agg_time_dimension(model, measure) {
                Ok(resolved) => {
                    agg_time_dimensions.insert(reference.clone(), resolved);
                }
                Err(issue) => issues.push(issue),
            }
        }

        if !issues.is_empty() {
            return Err(ManifestValidationError { issues }.into());
        }

        let mut entity_index: BTreeMap<EntityReference, BTreeSet<SemanticModelReference>> =
            BTreeMap::new();
        for model in by_name.values() {
            for entity in &model.entities {
                entity_index
                    .entry(entity.reference())
                    .or_default()
                    .insert(model.reference());
            }
        }

        Ok(Self {
            models: by_name,
            entity_index,
            measure_index,
            agg_time_dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Names of every indexed measure, sorted.
    pub fn measure_references(&self) -> Vec<MeasureReference> {
        let mut measures: Vec<_> = self.measure_index.keys().cloned().collect();
        measures.sort();
        measures
    }
}

impl SemanticModelAccessor for SemanticModelIndex {
    fn semantic_models(&self) -> Vec<&SemanticModel> {
        self.models.values().collect()
    }

    fn get_by_reference(&self, model: &SemanticModelReference) -> Option<&SemanticModel> {
        self.models.get(model)
    }

    fn get_semantic_models_for_entity(&self, entity: &EntityReference) -> Vec<&SemanticModel> {
        self.entity_index
            .get(entity)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|reference| self.models.get(reference))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn entity_links_for_local_elements(&self, model: &SemanticModel) -> Vec<EntityReference> {
        let mut links: BTreeSet<EntityReference> = model
            .entities
            .iter()
            .filter(|e| e.entity_type.is_locally_linkable())
            .map(|e| e.reference())
            .collect();
        if let Some(primary) = model.primary_entity_reference() {
            links.insert(primary);
        }
        links.into_iter().collect()
    }

    fn get_semantic_model_for_measure(
        &self,
        measure: &MeasureReference,
    ) -> SemanticResult<&SemanticModel> {
        self.measure_index
            .get(measure)
            .and_then(|model| self.models.get(model))
            .ok_or_else(|| NotFoundError::measure(measure.as_str()).into())
    }

    fn get_measure(&self, measure: &MeasureReference) -> SemanticResult<&Measure> {
        let model = self.get_semantic_model_for_measure(measure)?;
        model.get_measure(measure).ok_or_else(|| {
            SemanticError::Internal(format!(
                "measure '{}' is indexed under '{}' but not declared there",
                measure, model.name
            ))
        })
    }

    fn get_agg_time_dimension_for_measure(
        &self,
        measure: &MeasureReference,
    ) -> SemanticResult<TimeDimensionReference> {
        self.agg_time_dimensions
            .get(measure)
            .map(|agg| agg.dimension.clone())
            .ok_or_else(|| NotFoundError::measure(measure.as_str()).into())
    }

    fn get_agg_time_granularity_for_measure(
        &self,
        measure: &MeasureReference,
    ) -> SemanticResult<TimeGranularity> {
        self.agg_time_dimensions
            .get(measure)
            .map(|agg| agg.granularity)
            .ok_or_else(|| NotFoundError::measure(measure.as_str()).into())
    }
}

fn validate_primary_entity(model: &SemanticModel, issues: &mut Vec<ManifestIssue>) {
    let mut primaries: Vec<String> = model
        .entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Primary)
        .map(|e| e.name.clone())
        .collect();
    if let Some(explicit) = &model.primary_entity {
        if !primaries.contains(explicit) {
            primaries.push(explicit.clone());
        }
    }

    if primaries.len() > 1 {
        primaries.sort();
        issues.push(ManifestIssue::MultiplePrimaryEntities {
            model: model.name.clone(),
            entities: primaries,
        });
    } else if primaries.is_empty() && !model.dimensions.is_empty() {
        issues.push(ManifestIssue::MissingPrimaryEntity {
            model: model.name.clone(),
        });
    }
}

fn resolve_agg_time_dimension(
    model: &SemanticModel,
    measure: &Measure,
) -> Result<AggTimeDimension, ManifestIssue> {
    let Some(name) = measure.agg_time_dimension_name(model) else {
        return Err(ManifestIssue::InvalidAggTimeDimension {
            model: model.name.clone(),
            measure: measure.name.clone(),
            agg_time_dimension: None,
            reason: "neither the measure nor the model default sets one".into(),
        });
    };

    let matches: Vec<TimeGranularity> = model
        .dimensions
        .iter()
        .filter(|d| d.name == name.as_str())
        .filter_map(|d| d.time_granularity())
        .collect();

    match matches.as_slice() {
        [granularity] => Ok(AggTimeDimension {
            dimension: name,
            granularity: *granularity,
        }),
        _ => Err(ManifestIssue::InvalidAggTimeDimension {
            model: model.name.clone(),
            measure: measure.name.clone(),
            agg_time_dimension: Some(name.to_string()),
            reason: format!(
                "expected exactly one time dimension with a granularity, found {}",
                matches.len()
            ),
        }),
    }
}
