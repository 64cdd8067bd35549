//! Metric / Element Lookup.
//!
//! [`MetricLookupBuilder`] validates and registers metrics against a
//! [`SemanticModelIndex`]. [`MetricLookupBuilder::build`] then runs the
//! one-time resolver and yields a read-only [`MetricLookup`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info};

use crate::model::{
    EntityReference, Manifest, MeasureReference, Metric, MetricInputMeasure, MetricKind,
    MetricReference, TimeDimensionReference,
};

use super::error::{NotFoundError, SemanticError, SemanticResult};
use super::join_evaluator::JoinEvaluator;
use super::linkable::element_set::{LinkableElementFilter, LinkableElementSet};
use super::linkable::resolver::{ResolverConfig, ValidLinkableSpecResolver};
use super::model_index::{SemanticModelAccessor, SemanticModelIndex};
use super::specs::TimeDimensionSpec;

/// Read-only access to registered metrics.
pub trait MetricAccessor {
    fn get_metric(&self, metric: &MetricReference) -> SemanticResult<&Metric>;

    fn get_metrics(&self, metrics: &[MetricReference]) -> SemanticResult<Vec<&Metric>> {
        metrics.iter().map(|m| self.get_metric(m)).collect()
    }

    /// Every registered metric, sorted by name.
    fn metric_references(&self) -> Vec<MetricReference>;

    /// Measures feeding `metric`, following ratio and derived inputs.
    fn input_measures(&self, metric: &MetricReference) -> SemanticResult<Vec<MetricInputMeasure>>;
}

/// Mutable metric registration.
#[derive(Debug, Clone)]
pub struct MetricLookupBuilder {
    index: SemanticModelIndex,
    metrics: BTreeMap<MetricReference, Metric>,
    registration_order: Vec<MetricReference>,
}

impl MetricLookupBuilder {
    pub fn new(index: SemanticModelIndex) -> Self {
        Self {
            index,
            metrics: BTreeMap::new(),
            registration_order: Vec::new(),
        }
    }

    /// Index the manifest's models and register its metrics in dependency order.
    pub fn from_manifest(manifest: &Manifest) -> SemanticResult<Self> {
        let index = SemanticModelIndex::new(&manifest.semantic_models)?;
        let mut builder = Self::new(index);
        for metric in registration_order(&manifest.metrics)? {
            builder.add_metric(metric.clone())?;
        }
        Ok(builder)
    }

    /// Register `metric`. Its measures must be indexed and its input metrics
    /// already registered.
    pub fn add_metric(&mut self, metric: Metric) -> SemanticResult<()> {
        let reference = metric.reference();
        if self.metrics.contains_key(&reference) {
            return Err(SemanticError::DuplicateMetric(metric.name.clone()));
        }
        for measure in metric.direct_measures() {
            if !self.index.measure_exists(&measure.reference()) {
                return Err(SemanticError::NonExistentMeasure {
                    metric: metric.name.clone(),
                    measure: measure.name.clone(),
                });
            }
        }
        for input in metric.input_metrics() {
            if !self.metrics.contains_key(&input.reference()) {
                return Err(SemanticError::UnknownMetricInput {
                    metric: metric.name.clone(),
                    input: input.name.clone(),
                });
            }
        }
        debug!(metric = %metric.name, metric_type = %metric.metric_type(), "registered metric");
        self.registration_order.push(reference.clone());
        self.metrics.insert(reference, metric);
        Ok(())
    }

    pub fn semantic_model_index(&self) -> &SemanticModelIndex {
        &self.index
    }

    /// Resolve linkable elements for every registered metric.
    pub fn build(self, config: ResolverConfig) -> SemanticResult<MetricLookup> {
        let join_evaluator = JoinEvaluator::new(&self.index);
        let ordered: Vec<Metric> = self
            .registration_order
            .iter()
            .filter_map(|m| self.metrics.get(m).cloned())
            .collect();
        let resolver =
            ValidLinkableSpecResolver::build(&self.index, &join_evaluator, &ordered, config)?;
        info!(
            metrics = self.metrics.len(),
            join_edges = join_evaluator.edge_count(),
            "metric lookup ready"
        );
        Ok(MetricLookup {
            index: self.index,
            join_evaluator,
            metrics: self.metrics,
            resolver,
        })
    }
}

impl MetricAccessor for MetricLookupBuilder {
    fn get_metric(&self, metric: &MetricReference) -> SemanticResult<&Metric> {
        self.metrics
            .get(metric)
            .ok_or_else(|| NotFoundError::metric(metric.as_str()).into())
    }

    fn metric_references(&self) -> Vec<MetricReference> {
        self.metrics.keys().cloned().collect()
    }

    fn input_measures(&self, metric: &MetricReference) -> SemanticResult<Vec<MetricInputMeasure>> {
        collect_input_measures(self.get_metric(metric)?, &self.metrics)
    }
}

/// Registered metrics plus their resolved linkable elements. Read-only.
#[derive(Debug, Clone)]
pub struct MetricLookup {
    index: SemanticModelIndex,
    join_evaluator: JoinEvaluator,
    metrics: BTreeMap<MetricReference, Metric>,
    resolver: ValidLinkableSpecResolver,
}

impl MetricLookup {
    /// Index, register and resolve a whole manifest.
    pub fn from_manifest(manifest: &Manifest, config: ResolverConfig) -> SemanticResult<Self> {
        if let Ok(hash) = manifest.content_hash() {
            info!(manifest_hash = %hash, "building metric lookup");
        }
        MetricLookupBuilder::from_manifest(manifest)?.build(config)
    }

    pub fn semantic_model_index(&self) -> &SemanticModelIndex {
        &self.index
    }

    pub fn join_evaluator(&self) -> &JoinEvaluator {
        &self.join_evaluator
    }

    pub fn resolver(&self) -> &ValidLinkableSpecResolver {
        &self.resolver
    }

    pub fn linkable_elements_for_measure(
        &self,
        measure: &MeasureReference,
        filter: Option<&LinkableElementFilter>,
    ) -> SemanticResult<LinkableElementSet> {
        self.resolver
            .get_linkable_element_set_for_measure(measure, &filter.cloned().unwrap_or_default())
    }

    pub fn linkable_elements_for_metrics(
        &self,
        metrics: &[MetricReference],
        filter: Option<&LinkableElementFilter>,
    ) -> SemanticResult<LinkableElementSet> {
        self.resolver
            .get_linkable_elements_for_metrics(metrics, &filter.cloned().unwrap_or_default())
    }

    pub fn linkable_elements_for_no_metrics_query(
        &self,
        filter: Option<&LinkableElementFilter>,
    ) -> LinkableElementSet {
        self.resolver
            .get_linkable_elements_for_distinct_values_query(&filter.cloned().unwrap_or_default())
    }

    /// Time dimensions that may stand in for metric_time for `metric`.
    ///
    /// Empty unless every input measure aggregates by the same time dimension
    /// reached through the same primary entity.
    pub fn get_valid_agg_time_dimensions_for_metric(
        &self,
        metric: &MetricReference,
    ) -> SemanticResult<Vec<TimeDimensionSpec>> {
        let measures = self.input_measures(metric)?;
        let mut path_keys: BTreeSet<(TimeDimensionReference, EntityReference)> = BTreeSet::new();
        let mut base_granularity = None;
        for measure in &measures {
            let reference = measure.reference();
            let model = self.index.get_semantic_model_for_measure(&reference)?;
            let Some(primary) = model.primary_entity_reference() else {
                return Ok(Vec::new());
            };
            let dimension = self.index.get_agg_time_dimension_for_measure(&reference)?;
            let granularity = self.index.get_agg_time_granularity_for_measure(&reference)?;
            path_keys.insert((dimension, primary));
            base_granularity = Some(granularity);
        }

        let (Some((dimension, primary)), Some(base)) =
            (path_keys.iter().next(), base_granularity)
        else {
            return Ok(Vec::new());
        };
        if path_keys.len() != 1 {
            return Ok(Vec::new());
        }

        Ok(base
            .and_coarser()
            .map(|granularity| TimeDimensionSpec {
                element_name: dimension.to_string(),
                entity_links: vec![primary.clone()],
                time_granularity: Some(granularity),
                date_part: None,
            })
            .collect())
    }
}

impl MetricAccessor for MetricLookup {
    fn get_metric(&self, metric: &MetricReference) -> SemanticResult<&Metric> {
        self.metrics
            .get(metric)
            .ok_or_else(|| NotFoundError::metric(metric.as_str()).into())
    }

    fn metric_references(&self) -> Vec<MetricReference> {
        self.metrics.keys().cloned().collect()
    }

    fn input_measures(&self, metric: &MetricReference) -> SemanticResult<Vec<MetricInputMeasure>> {
        collect_input_measures(self.get_metric(metric)?, &self.metrics)
    }
}

/// Measures feeding `metric`, depth first, without duplicates. Metric-level
/// filters are not merged in here.
pub(crate) fn collect_input_measures(
    metric: &Metric,
    metrics: &BTreeMap<MetricReference, Metric>,
) -> SemanticResult<Vec<MetricInputMeasure>> {
    fn visit(
        metric: &Metric,
        metrics: &BTreeMap<MetricReference, Metric>,
        visiting: &mut Vec<String>,
        out: &mut Vec<MetricInputMeasure>,
    ) -> SemanticResult<()> {
        if visiting.contains(&metric.name) {
            let mut cycle = visiting.clone();
            cycle.push(metric.name.clone());
            return Err(SemanticError::MetricCycle(cycle));
        }
        visiting.push(metric.name.clone());
        match &metric.kind {
            MetricKind::Simple { .. }
            | MetricKind::Cumulative { .. }
            | MetricKind::Conversion { .. } => {
                for measure in metric.direct_measures() {
                    if !out.iter().any(|m| m.name == measure.name) {
                        out.push(measure.clone());
                    }
                }
            }
            MetricKind::Ratio { .. } | MetricKind::Derived { .. } => {
                for input in metric.input_metrics() {
                    let child = metrics.get(&input.reference()).ok_or_else(|| {
                        SemanticError::UnknownMetricInput {
                            metric: metric.name.clone(),
                            input: input.name.clone(),
                        }
                    })?;
                    visit(child, metrics, visiting, out)?;
                }
            }
        }
        visiting.pop();
        Ok(())
    }

    let mut out = Vec::new();
    visit(metric, metrics, &mut Vec::new(), &mut out)?;
    Ok(out)
}

/// Order metrics so that every metric follows the metrics it references.
fn registration_order(metrics: &[Metric]) -> SemanticResult<Vec<&Metric>> {
    let mut graph: DiGraph<&Metric, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for metric in metrics {
        if nodes.contains_key(metric.name.as_str()) {
            return Err(SemanticError::DuplicateMetric(metric.name.clone()));
        }
        nodes.insert(metric.name.as_str(), graph.add_node(metric));
    }
    for metric in metrics {
        let to = nodes[metric.name.as_str()];
        for input in metric.input_metrics() {
            // Unknown inputs are reported by `add_metric`.
            if let Some(&from) = nodes.get(input.name.as_str()) {
                graph.add_edge(from, to, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|idx| graph[idx]).collect()),
        Err(_) => {
            let mut cycle: Vec<String> = tarjan_scc(&graph)
                .into_iter()
                .find(|scc| {
                    scc.len() > 1 || graph.edges_connecting(scc[0], scc[0]).next().is_some()
                })
                .map(|scc| scc.into_iter().map(|idx| graph[idx].name.clone()).collect())
                .unwrap_or_default();
            cycle.sort();
            Err(SemanticError::MetricCycle(cycle))
        }
    }
}
