//! Linkable-Spec Resolver.
//!
//! Built once per manifest: walks the join graph from every semantic model,
//! caches the reachable elements per model, per measure and per metric, then
//! answers queries from the cache.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::model::{
    DimensionType, EntityReference, MeasureReference, Metric, MetricKind, MetricReference,
    MetricType, SemanticModel, SemanticModelReference, TimeGranularity,
};
use crate::semantic::error::{NotFoundError, SemanticError, SemanticResult};
use crate::semantic::join_evaluator::JoinEvaluator;
use crate::semantic::metric_lookup::collect_input_measures;
use crate::semantic::model_index::SemanticModelAccessor;

use super::element_set::{LinkableElementFilter, LinkableElementSet};
use super::metric_time::{metric_time_elements, time_variants};
use super::types::{
    LinkableDimension, LinkableElementProperty, LinkableEntity, LinkableMetric,
    SemanticModelJoinPath,
};

use LinkableElementProperty as Prop;

/// Search limits of the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum number of entity links on a reachable element.
    pub max_entity_links: usize,
    /// metric_time granularity offered to queries without metrics.
    pub default_metric_time_granularity: TimeGranularity,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_entity_links: 2,
            default_metric_time_granularity: TimeGranularity::Day,
        }
    }
}

/// Cached linkable element sets for one manifest.
#[derive(Debug, Clone)]
pub struct ValidLinkableSpecResolver {
    config: ResolverConfig,
    local_sets: BTreeMap<SemanticModelReference, LinkableElementSet>,
    model_sets: BTreeMap<SemanticModelReference, LinkableElementSet>,
    measure_sets: BTreeMap<MeasureReference, LinkableElementSet>,
    metric_sets: BTreeMap<MetricReference, LinkableElementSet>,
    no_metric_set: LinkableElementSet,
}

/// State shared while building.
struct Builder<'a, A: SemanticModelAccessor + ?Sized> {
    index: &'a A,
    join_evaluator: &'a JoinEvaluator,
    config: ResolverConfig,
    /// Metrics that can be grouped by each entity.
    joinable_metrics: BTreeMap<EntityReference, Vec<MetricReference>>,
}

impl ValidLinkableSpecResolver {
    /// Resolve every element reachable from every measure and metric.
    ///
    /// `metrics` must already be validated against `index`.
    pub fn build<A: SemanticModelAccessor + ?Sized>(
        index: &A,
        join_evaluator: &JoinEvaluator,
        metrics: &[Metric],
        config: ResolverConfig,
    ) -> SemanticResult<Self> {
        let start = Instant::now();
        let by_name: BTreeMap<MetricReference, Metric> =
            metrics.iter().map(|m| (m.reference(), m.clone())).collect();

        let builder = Builder {
            index,
            join_evaluator,
            config,
            joinable_metrics: joinable_metrics_by_entity(index, metrics, &by_name)?,
        };

        let mut local_sets = BTreeMap::new();
        let mut model_sets = BTreeMap::new();
        for model in index.semantic_models() {
            let local = LinkableElementSet::merge_by_path_key([
                &builder.local_elements(model),
                &builder.local_metrics(model),
            ]);
            let joined = builder.joined_elements(model)?;
            model_sets.insert(
                model.reference(),
                LinkableElementSet::merge_by_path_key([&local, &joined]),
            );
            local_sets.insert(model.reference(), local);
        }

        let mut metric_time_sets: HashMap<TimeGranularity, LinkableElementSet> = HashMap::new();
        let mut measure_sets = BTreeMap::new();
        for model in index.semantic_models() {
            for measure in &model.measures {
                let reference = measure.reference();
                let granularity = index.get_agg_time_granularity_for_measure(&reference)?;
                let metric_time = metric_time_sets
                    .entry(granularity)
                    .or_insert_with(|| metric_time_elements(granularity));
                let model_set = model_sets.get(&model.reference()).ok_or_else(|| {
                    SemanticError::Internal(format!("no element set for '{}'", model.name))
                })?;
                measure_sets.insert(
                    reference,
                    LinkableElementSet::merge_by_path_key([model_set, &*metric_time]),
                );
            }
        }

        let mut metric_sets = BTreeMap::new();
        for metric in metrics {
            let set = combine_for_metric(metric, &by_name, &measure_sets)?;
            debug!(
                metric = %metric.name,
                metric_type = %metric.metric_type(),
                path_keys = set.len(),
                "resolved linkable elements for metric"
            );
            metric_sets.insert(metric.reference(), set);
        }

        let default_metric_time = metric_time_elements(config.default_metric_time_granularity);
        let no_metric_set = LinkableElementSet::merge_by_path_key(
            local_sets.values().chain(std::iter::once(&default_metric_time)),
        );

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            semantic_models = model_sets.len(),
            measures = measure_sets.len(),
            metrics = metric_sets.len(),
            "built linkable element sets"
        );

        Ok(Self {
            config,
            local_sets,
            model_sets,
            measure_sets,
            metric_sets,
            no_metric_set,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Elements reachable from a measure, filtered.
    pub fn get_linkable_element_set_for_measure(
        &self,
        measure: &MeasureReference,
        filter: &LinkableElementFilter,
    ) -> SemanticResult<LinkableElementSet> {
        self.measure_sets
            .get(measure)
            .map(|set| set.filter(filter))
            .ok_or_else(|| NotFoundError::measure(measure.as_str()).into())
    }

    /// Elements every metric can be grouped by. Ambiguous keys are dropped
    /// per metric before filtering and intersecting.
    pub fn get_linkable_elements_for_metrics(
        &self,
        metrics: &[MetricReference],
        filter: &LinkableElementFilter,
    ) -> SemanticResult<LinkableElementSet> {
        let mut sets = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let set = self.metric_element_set(metric)?;
            sets.push(set.only_unique_path_keys().filter(filter));
        }
        Ok(LinkableElementSet::intersection_by_path_key(&sets))
    }

    /// Elements for a query without metrics.
    pub fn get_linkable_elements_for_distinct_values_query(
        &self,
        filter: &LinkableElementFilter,
    ) -> LinkableElementSet {
        self.no_metric_set.filter(filter)
    }

    /// A metric's combined set before ambiguity removal.
    pub fn metric_element_set(&self, metric: &MetricReference) -> SemanticResult<&LinkableElementSet> {
        self.metric_sets
            .get(metric)
            .ok_or_else(|| NotFoundError::metric(metric.as_str()).into())
    }

    /// Local and joined elements of one semantic model, without metric_time.
    pub fn semantic_model_element_set(
        &self,
        model: &SemanticModelReference,
    ) -> Option<&LinkableElementSet> {
        self.model_sets.get(model)
    }

    /// Local elements and local metrics of one semantic model.
    pub fn local_element_set(&self, model: &SemanticModelReference) -> Option<&LinkableElementSet> {
        self.local_sets.get(model)
    }
}

impl<A: SemanticModelAccessor + ?Sized> Builder<'_, A> {
    /// Elements of `model` addressable without a join, bare and through each
    /// locally linkable entity.
    fn local_elements(&self, model: &SemanticModel) -> LinkableElementSet {
        let links = self.index.entity_links_for_local_elements(model);
        let defined_in = model.reference();

        let mut link_options: Vec<(Vec<EntityReference>, BTreeSet<Prop>)> =
            vec![(Vec::new(), BTreeSet::from([Prop::Local]))];
        for link in &links {
            link_options.push((
                vec![link.clone()],
                BTreeSet::from([Prop::Local, Prop::LocalLinked]),
            ));
        }

        let mut dimensions = Vec::new();
        for (entity_links, properties) in &link_options {
            dimensions.extend(dimension_elements(
                model,
                &defined_in,
                entity_links,
                None,
                properties,
            ));
        }

        let mut entities = Vec::new();
        for entity in &model.entities {
            let reference = entity.reference();
            for (entity_links, properties) in &link_options {
                if entity_links.contains(&reference) {
                    continue;
                }
                let mut properties = properties.clone();
                properties.insert(Prop::Entity);
                entities.push(LinkableEntity {
                    element_name: entity.name.clone(),
                    defined_in: defined_in.clone(),
                    entity_links: entity_links.clone(),
                    join_path: None,
                    properties,
                });
            }
        }

        LinkableElementSet::from_elements(dimensions, entities, Vec::new())
    }

    /// Metrics that can be grouped by one of `model`'s entities and joined onto it.
    fn local_metrics(&self, model: &SemanticModel) -> LinkableElementSet {
        if self.config.max_entity_links == 0 {
            return LinkableElementSet::default();
        }
        let metrics = model.entities.iter().flat_map(|entity| {
            self.metric_elements(&entity.reference(), None, &BTreeSet::from([Prop::Metric]))
        });
        LinkableElementSet::from_elements(Vec::new(), Vec::new(), metrics.collect::<Vec<_>>())
    }

    /// Breadth-first join search from `model` up to `max_entity_links` hops.
    fn joined_elements(&self, model: &SemanticModel) -> SemanticResult<LinkableElementSet> {
        let origin = model.reference();
        if self.config.max_entity_links == 0 {
            return Ok(LinkableElementSet::default());
        }

        let mut frontier: Vec<SemanticModelJoinPath> = self
            .join_evaluator
            .outgoing_joins(&origin)
            .into_iter()
            .map(|(target, edge)| SemanticModelJoinPath::from_single_element(target, edge.entity))
            .collect();

        let mut sets = Vec::new();
        let mut hop = 1;
        loop {
            let mut properties = BTreeSet::from([Prop::Joined]);
            if hop > 1 {
                properties.insert(Prop::MultiHop);
            }
            for path in &frontier {
                trace!(origin = %origin, path = %path, "join path");
                sets.push(self.elements_for_join_path(path, &properties)?);
            }

            if hop >= self.config.max_entity_links {
                break;
            }
            let mut next = Vec::new();
            for path in &frontier {
                for (target, edge) in self.join_evaluator.outgoing_joins(path.last_semantic_model()) {
                    if let Some(extended) = path.extend(&origin, target, edge.entity) {
                        next.push(extended);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
            hop += 1;
        }

        Ok(LinkableElementSet::merge_by_path_key(&sets))
    }

    /// Elements of the model at the end of `path`, prefixed with its entity links.
    fn elements_for_join_path(
        &self,
        path: &SemanticModelJoinPath,
        properties: &BTreeSet<Prop>,
    ) -> SemanticResult<LinkableElementSet> {
        let model = self
            .index
            .get_by_reference(path.last_semantic_model())
            .ok_or_else(|| {
                SemanticError::Internal(format!(
                    "join path ends at unknown semantic model '{}'",
                    path.last_semantic_model()
                ))
            })?;
        let defined_in = model.reference();
        let entity_links = path.entity_links();
        let arrival = path.last_entity();

        let dimensions = dimension_elements(model, &defined_in, &entity_links, Some(path), properties);

        let mut entity_properties = properties.clone();
        entity_properties.insert(Prop::Entity);
        let entities: Vec<LinkableEntity> = model
            .entities
            .iter()
            .filter(|e| e.name != arrival.as_str())
            .map(|e| LinkableEntity {
                element_name: e.name.clone(),
                defined_in: defined_in.clone(),
                entity_links: entity_links.clone(),
                join_path: Some(path.clone()),
                properties: entity_properties.clone(),
            })
            .collect();

        let mut metrics = Vec::new();
        if path.len() < self.config.max_entity_links {
            let mut metric_properties = properties.clone();
            metric_properties.insert(Prop::Metric);
            for entity in model.entities.iter().filter(|e| e.name != arrival.as_str()) {
                metrics.extend(self.metric_elements(
                    &entity.reference(),
                    Some(path),
                    &metric_properties,
                ));
            }
        }

        Ok(LinkableElementSet::from_elements(dimensions, entities, metrics))
    }

    fn metric_elements(
        &self,
        entity: &EntityReference,
        join_path: Option<&SemanticModelJoinPath>,
        properties: &BTreeSet<Prop>,
    ) -> Vec<LinkableMetric> {
        self.joinable_metrics
            .get(entity)
            .map(|metrics| {
                metrics
                    .iter()
                    .map(|metric| LinkableMetric {
                        metric: metric.clone(),
                        join_on_entity: entity.clone(),
                        join_path: join_path.cloned(),
                        properties: properties.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Dimensions of `model` under `entity_links`, time dimensions expanded to
/// every granularity and date part they support.
fn dimension_elements(
    model: &SemanticModel,
    defined_in: &SemanticModelReference,
    entity_links: &[EntityReference],
    join_path: Option<&SemanticModelJoinPath>,
    properties: &BTreeSet<Prop>,
) -> Vec<LinkableDimension> {
    let mut out = Vec::new();
    for dimension in &model.dimensions {
        let base = LinkableDimension {
            element_name: dimension.name.clone(),
            defined_in: Some(defined_in.clone()),
            dimension_type: dimension.dimension_type,
            entity_links: entity_links.to_vec(),
            join_path: join_path.cloned(),
            properties: properties.clone(),
            time_granularity: None,
            date_part: None,
        };
        match (dimension.dimension_type, dimension.time_granularity()) {
            (DimensionType::Time, Some(granularity)) => {
                for variant in time_variants(granularity) {
                    let mut element = base.clone();
                    element.time_granularity = Some(variant.granularity);
                    element.date_part = variant.date_part;
                    if variant.derived {
                        element.properties.insert(Prop::DerivedTimeGranularity);
                    }
                    out.push(element);
                }
            }
            _ => out.push(base),
        }
    }
    out
}

/// Simple, ratio and derived metrics keyed by each entity shared by the
/// models of all their input measures.
fn joinable_metrics_by_entity<A: SemanticModelAccessor + ?Sized>(
    index: &A,
    metrics: &[Metric],
    by_name: &BTreeMap<MetricReference, Metric>,
) -> SemanticResult<BTreeMap<EntityReference, Vec<MetricReference>>> {
    let mut out: BTreeMap<EntityReference, Vec<MetricReference>> = BTreeMap::new();
    for metric in metrics {
        match metric.metric_type() {
            MetricType::Simple | MetricType::Ratio | MetricType::Derived => {}
            MetricType::Cumulative | MetricType::Conversion => continue,
        }
        let measures = collect_input_measures(metric, by_name)?;
        let mut shared: Option<BTreeSet<EntityReference>> = None;
        for measure in &measures {
            let model = index.get_semantic_model_for_measure(&measure.reference())?;
            let entities: BTreeSet<EntityReference> =
                model.entities.iter().map(|e| e.reference()).collect();
            shared = Some(match shared {
                Some(current) => current.intersection(&entities).cloned().collect(),
                None => entities,
            });
        }
        for entity in shared.unwrap_or_default() {
            out.entry(entity).or_default().push(metric.reference());
        }
    }
    for metrics in out.values_mut() {
        metrics.sort();
    }
    Ok(out)
}

/// Combine per-measure sets according to the metric's type.
fn combine_for_metric(
    metric: &Metric,
    by_name: &BTreeMap<MetricReference, Metric>,
    measure_sets: &BTreeMap<MeasureReference, LinkableElementSet>,
) -> SemanticResult<LinkableElementSet> {
    let measures: Vec<MeasureReference> = match &metric.kind {
        MetricKind::Conversion { base_measure, .. } => vec![base_measure.reference()],
        MetricKind::Simple { .. }
        | MetricKind::Ratio { .. }
        | MetricKind::Derived { .. }
        | MetricKind::Cumulative { .. } => collect_input_measures(metric, by_name)?
            .iter()
            .map(|m| m.reference())
            .collect(),
    };

    let mut sets = Vec::with_capacity(measures.len());
    for measure in &measures {
        let set = measure_sets
            .get(measure)
            .ok_or_else(|| NotFoundError::measure(measure.as_str()))?;
        sets.push(set.clone());
    }
    let combined = LinkableElementSet::intersection_by_path_key(&sets);

    Ok(match metric.metric_type() {
        MetricType::Simple | MetricType::Ratio | MetricType::Derived | MetricType::Conversion => {
            combined
        }
        MetricType::Cumulative => combined.filter(
            &LinkableElementFilter::default()
                .without_all_of(&[Prop::MetricTime, Prop::DerivedTimeGranularity]),
        ),
    })
}
