//! Dataflow Plan Builder.
//!
//! Turns a [`ResolvedQuery`] into a [`DataflowPlan`]. Every join comes from
//! the join path recorded on a resolved linkable element. The builder never
//! asks the join evaluator again.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::model::{
    EntityReference, MetricInputMeasure, MetricKind, MetricReference, MetricTimeWindow,
    SemanticModel, TimeGranularity, WhereFilter,
};
use crate::planner::group_by_name::match_path_key;
use crate::planner::query::{OutputTarget, ResolvedQuery};
use crate::planner::{PlanError, PlanResult};
use crate::semantic::error::{NotFoundError, SemanticError};
use crate::semantic::linkable::{
    ElementPathKey, LinkableElementSet, LinkableElementType, SemanticModelJoinPath,
    SemanticModelJoinPathElement,
};
use crate::semantic::metric_lookup::{MetricAccessor, MetricLookup};
use crate::semantic::model_index::SemanticModelAccessor;
use crate::semantic::specs::GroupBySpec;

use super::id::IdGenerator;
use super::plan::{
    AggregateMeasuresNode, CombineAggregatedOutputsNode, ComputeMetricsNode, DataflowPlan,
    DataflowPlanNode, FilterElementsNode, JoinConversionEventsNode, JoinOnEntitiesNode,
    JoinOverTimeRangeNode, JoinTarget, OrderByLimitNode, ReadSqlSourceNode, ReadTimeSpineNode,
    WhereConstraintNode, WriteToResultDataframeNode, WriteToResultTableNode,
};

/// A filter applied on a branch. Query filters arrive with their items
/// resolved. Metric and measure filters are resolved per measure.
#[derive(Debug, Clone)]
struct BranchFilter {
    filter: WhereFilter,
    items: Option<Vec<ElementPathKey>>,
}

impl BranchFilter {
    fn unresolved(filter: &WhereFilter) -> Self {
        Self {
            filter: filter.clone(),
            items: None,
        }
    }
}

#[derive(Debug, Clone)]
struct TimeRange {
    window: Option<MetricTimeWindow>,
    grain_to_date: Option<TimeGranularity>,
}

/// Joins needed by one branch, merged by shared path prefix.
#[derive(Debug, Default)]
struct JoinTrie {
    children: BTreeMap<SemanticModelJoinPathElement, JoinTrie>,
    /// Metric sub-plans joined at this level, keyed by join entity.
    metrics: BTreeMap<EntityReference, BTreeSet<MetricReference>>,
}

impl JoinTrie {
    fn node_at(&mut self, path: Option<&SemanticModelJoinPath>) -> &mut JoinTrie {
        let mut node = self;
        if let Some(path) = path {
            for step in path.steps() {
                node = node.children.entry(step.clone()).or_default();
            }
        }
        node
    }

    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.metrics.is_empty()
    }
}

pub struct DataflowPlanBuilder<'a> {
    lookup: &'a MetricLookup,
    ids: IdGenerator,
}

impl<'a> DataflowPlanBuilder<'a> {
    pub fn new(lookup: &'a MetricLookup, ids: IdGenerator) -> Self {
        Self { lookup, ids }
    }

    /// Build the plan for a resolved query.
    pub fn build_plan(&mut self, query: &ResolvedQuery) -> PlanResult<DataflowPlan> {
        let group_by: Vec<ElementPathKey> = query.group_by.iter().map(GroupBySpec::path_key).collect();
        let filters: Vec<BranchFilter> = query
            .where_filters
            .iter()
            .map(|f| BranchFilter {
                filter: f.filter.clone(),
                items: Some(f.items.iter().map(GroupBySpec::path_key).collect()),
            })
            .collect();

        let mut node = if query.has_no_metrics() {
            self.build_distinct_values(&group_by, &filters)?
        } else {
            let mut branches = Vec::with_capacity(query.metrics.len());
            for metric in &query.metrics {
                branches.push(self.build_metric_branch(metric, &group_by, &filters)?);
            }
            self.combine(branches)?
        };

        if !query.order_by.is_empty() || query.limit.is_some() {
            node = DataflowPlanNode::OrderByLimit(OrderByLimitNode {
                id: self.ids.next_id("obl"),
                input: Box::new(node),
                order_by: query.order_by.clone(),
                limit: query.limit,
            });
        }

        let sink = match &query.output {
            OutputTarget::Dataframe => {
                DataflowPlanNode::WriteToResultDataframe(WriteToResultDataframeNode {
                    id: self.ids.next_id("wrd"),
                    input: Box::new(node),
                })
            }
            OutputTarget::Table(table) => DataflowPlanNode::WriteToResultTable(WriteToResultTableNode {
                id: self.ids.next_id("wrt"),
                input: Box::new(node),
                table: table.clone(),
            }),
        };

        let plan = DataflowPlan::new(sink);
        debug!(
            metrics = query.metrics.len(),
            group_by = group_by.len(),
            nodes = plan.node_count(),
            "built dataflow plan"
        );
        Ok(plan)
    }

    fn build_metric_branch(
        &mut self,
        reference: &MetricReference,
        group_by: &[ElementPathKey],
        filters: &[BranchFilter],
    ) -> PlanResult<DataflowPlanNode> {
        let lookup = self.lookup;
        let metric = lookup.get_metric(reference)?;
        debug!(metric = %metric.name, metric_type = %metric.metric_type(), "planning metric");

        let mut filters = filters.to_vec();
        if let Some(filter) = &metric.filter {
            filters.push(BranchFilter::unresolved(filter));
        }

        let input = match &metric.kind {
            MetricKind::Simple { measure } => {
                self.build_aggregated_measure(measure, group_by, &filters, None)?
            }
            MetricKind::Cumulative {
                measure,
                window,
                grain_to_date,
            } => {
                let range = TimeRange {
                    window: *window,
                    grain_to_date: *grain_to_date,
                };
                self.build_aggregated_measure(measure, group_by, &filters, Some(range))?
            }
            MetricKind::Ratio { .. } | MetricKind::Derived { .. } => {
                let mut branches = Vec::new();
                for input in metric.input_metrics() {
                    let mut input_filters = filters.clone();
                    if let Some(filter) = &input.filter {
                        input_filters.push(BranchFilter::unresolved(filter));
                    }
                    branches.push(self.build_metric_branch(
                        &input.reference(),
                        group_by,
                        &input_filters,
                    )?);
                }
                self.combine(branches)?
            }
            MetricKind::Conversion {
                base_measure,
                conversion_measure,
                entity,
                window,
                ..
            } => {
                let base = self.build_measure_rows(base_measure, group_by, &filters, None)?;
                let conversion_model = lookup
                    .semantic_model_index()
                    .get_semantic_model_for_measure(&conversion_measure.reference())?;
                let conversion = self.read_source(conversion_model);
                let joined = DataflowPlanNode::JoinConversionEvents(JoinConversionEventsNode {
                    id: self.ids.next_id("jce"),
                    base: Box::new(base),
                    conversion: Box::new(conversion),
                    entity: EntityReference::new(entity.as_str()),
                    window: *window,
                });
                let include = std::iter::once(base_measure.name.clone())
                    .chain(std::iter::once(conversion_measure.name.clone()))
                    .chain(group_by.iter().map(ElementPathKey::qualified_name))
                    .collect();
                let selected = self.filter_elements(joined, include, false);
                DataflowPlanNode::AggregateMeasures(AggregateMeasuresNode {
                    id: self.ids.next_id("am"),
                    input: Box::new(selected),
                    measures: vec![base_measure.reference(), conversion_measure.reference()],
                })
            }
        };

        Ok(DataflowPlanNode::ComputeMetrics(ComputeMetricsNode {
            id: self.ids.next_id("cm"),
            input: Box::new(input),
            metrics: vec![reference.clone()],
        }))
    }

    fn build_aggregated_measure(
        &mut self,
        measure: &MetricInputMeasure,
        group_by: &[ElementPathKey],
        filters: &[BranchFilter],
        time_range: Option<TimeRange>,
    ) -> PlanResult<DataflowPlanNode> {
        let rows = self.build_measure_rows(measure, group_by, filters, time_range)?;
        let include = std::iter::once(measure.name.clone())
            .chain(group_by.iter().map(ElementPathKey::qualified_name))
            .collect();
        let selected = self.filter_elements(rows, include, false);
        Ok(DataflowPlanNode::AggregateMeasures(AggregateMeasuresNode {
            id: self.ids.next_id("am"),
            input: Box::new(selected),
            measures: vec![measure.reference()],
        }))
    }

    /// Measure rows with every required element joined in and every filter applied.
    fn build_measure_rows(
        &mut self,
        measure: &MetricInputMeasure,
        group_by: &[ElementPathKey],
        filters: &[BranchFilter],
        time_range: Option<TimeRange>,
    ) -> PlanResult<DataflowPlanNode> {
        let lookup = self.lookup;
        let reference = measure.reference();
        let model = lookup
            .semantic_model_index()
            .get_semantic_model_for_measure(&reference)?;
        let elements = lookup.linkable_elements_for_measure(&reference, None)?;

        let mut branch_filters = filters.to_vec();
        if let Some(filter) = &measure.filter {
            branch_filters.push(BranchFilter::unresolved(filter));
        }
        let mut resolved: Vec<(WhereFilter, Vec<ElementPathKey>)> = Vec::new();
        for branch_filter in branch_filters {
            let items = match branch_filter.items {
                Some(items) => items,
                None => resolve_filter_items(&branch_filter.filter, &elements, reference.as_str())?,
            };
            resolved.push((branch_filter.filter, items));
        }

        let mut trie = JoinTrie::default();
        for key in group_by
            .iter()
            .chain(resolved.iter().flat_map(|(_, items)| items.iter()))
        {
            add_element(&mut trie, &elements, key, reference.as_str())?;
        }

        let mut node = self.read_source(model);
        if let Some(range) = time_range {
            node = DataflowPlanNode::JoinOverTimeRange(JoinOverTimeRangeNode {
                id: self.ids.next_id("jotr"),
                input: Box::new(node),
                window: range.window,
                grain_to_date: range.grain_to_date,
            });
        }
        node = self.build_join_tree(node, &trie)?;
        for (filter, _) in resolved {
            node = self.where_constraint(node, filter);
        }
        Ok(node)
    }

    /// Distinct values of the group-by items. Read from the first semantic
    /// model holding all of them locally, else the first one reaching them.
    fn build_distinct_values(
        &mut self,
        group_by: &[ElementPathKey],
        filters: &[BranchFilter],
    ) -> PlanResult<DataflowPlanNode> {
        if group_by.is_empty() {
            return Err(PlanError::UnsupportedQuery(
                "a query without metrics needs at least one group-by item".to_string(),
            ));
        }
        let required: Vec<&ElementPathKey> = group_by
            .iter()
            .chain(filters.iter().flat_map(|f| f.items.iter().flatten()))
            .collect();
        let (time, other): (Vec<&ElementPathKey>, Vec<&ElementPathKey>) =
            required.iter().copied().partition(|k| k.is_metric_time());

        let lookup = self.lookup;
        let mut node = if other.is_empty() {
            let granularity = time
                .iter()
                .filter_map(|k| k.time_granularity)
                .min()
                .unwrap_or(lookup.resolver().config().default_metric_time_granularity);
            DataflowPlanNode::ReadTimeSpine(ReadTimeSpineNode {
                id: self.ids.next_id("rts"),
                granularity,
            })
        } else {
            if !time.is_empty() {
                return Err(PlanError::UnsupportedQuery(
                    "metric_time cannot be combined with other group-by items in a query without metrics"
                        .to_string(),
                ));
            }
            let candidates: Vec<_> = lookup
                .semantic_model_index()
                .semantic_models()
                .into_iter()
                .filter_map(|model| {
                    let set = lookup.resolver().semantic_model_element_set(&model.reference())?;
                    required
                        .iter()
                        .all(|k| set.element_count(k) == 1)
                        .then_some((model, set))
                })
                .collect();
            // Prefer a model holding every item locally.
            let anchor = candidates
                .iter()
                .find(|(model, _)| {
                    lookup
                        .resolver()
                        .local_element_set(&model.reference())
                        .is_some_and(|local| required.iter().all(|k| local.contains_key(k)))
                })
                .or_else(|| candidates.first())
                .copied();
            let Some((model, set)) = anchor else {
                let names: Vec<String> = required.iter().map(|k| k.qualified_name()).collect();
                return Err(PlanError::UnsupportedQuery(format!(
                    "no semantic model provides all of: {}",
                    names.join(", ")
                )));
            };
            debug!(anchor = %model.name, "planning distinct values");

            let mut trie = JoinTrie::default();
            for key in &required {
                add_element(&mut trie, set, key, &model.name)?;
            }
            let source = self.read_source(model);
            self.build_join_tree(source, &trie)?
        };

        for filter in filters {
            node = self.where_constraint(node, filter.filter.clone());
        }
        let include = group_by.iter().map(ElementPathKey::qualified_name).collect();
        Ok(self.filter_elements(node, include, true))
    }

    /// Join `left` to every path in `trie`. Nested paths become nested joins
    /// on the right side.
    fn build_join_tree(
        &mut self,
        left: DataflowPlanNode,
        trie: &JoinTrie,
    ) -> PlanResult<DataflowPlanNode> {
        if trie.is_empty() {
            return Ok(left);
        }
        let lookup = self.lookup;
        let mut targets = Vec::new();
        for (step, child) in &trie.children {
            let model = lookup
                .semantic_model_index()
                .get_by_reference(&step.semantic_model)
                .ok_or_else(|| {
                    SemanticError::from(NotFoundError::semantic_model(step.semantic_model.as_str()))
                })?;
            let source = self.read_source(model);
            let right = self.build_join_tree(source, child)?;
            targets.push(JoinTarget {
                right,
                join_on_entity: step.join_on_entity.clone(),
            });
        }
        for (entity, metrics) in &trie.metrics {
            let right = self.build_metric_subplan(entity, metrics)?;
            targets.push(JoinTarget {
                right,
                join_on_entity: entity.clone(),
            });
        }
        Ok(DataflowPlanNode::JoinOnEntities(JoinOnEntitiesNode {
            id: self.ids.next_id("jo"),
            left: Box::new(left),
            targets,
        }))
    }

    /// Metrics grouped by `entity`, ready to be joined on it.
    fn build_metric_subplan(
        &mut self,
        entity: &EntityReference,
        metrics: &BTreeSet<MetricReference>,
    ) -> PlanResult<DataflowPlanNode> {
        let key = ElementPathKey::new(entity.as_str(), LinkableElementType::Entity, Vec::new());
        let mut branches = Vec::with_capacity(metrics.len());
        for metric in metrics {
            branches.push(self.build_metric_branch(metric, std::slice::from_ref(&key), &[])?);
        }
        self.combine(branches)
    }

    fn combine(&mut self, mut branches: Vec<DataflowPlanNode>) -> PlanResult<DataflowPlanNode> {
        match branches.len() {
            0 => Err(PlanError::UnsupportedQuery(
                "a metric must have at least one input".to_string(),
            )),
            1 => branches
                .pop()
                .ok_or_else(|| PlanError::UnsupportedQuery("empty branch list".to_string())),
            _ => Ok(DataflowPlanNode::CombineAggregatedOutputs(
                CombineAggregatedOutputsNode {
                    id: self.ids.next_id("cao"),
                    inputs: branches,
                },
            )),
        }
    }

    fn read_source(&mut self, model: &SemanticModel) -> DataflowPlanNode {
        DataflowPlanNode::ReadSqlSource(ReadSqlSourceNode {
            id: self.ids.next_id("rss"),
            semantic_model: model.reference(),
            node_relation: model.node_relation.clone(),
        })
    }

    fn where_constraint(&mut self, input: DataflowPlanNode, filter: WhereFilter) -> DataflowPlanNode {
        DataflowPlanNode::WhereConstraint(WhereConstraintNode {
            id: self.ids.next_id("wc"),
            input: Box::new(input),
            filter,
        })
    }

    fn filter_elements(
        &mut self,
        input: DataflowPlanNode,
        include: Vec<String>,
        distinct: bool,
    ) -> DataflowPlanNode {
        DataflowPlanNode::FilterElements(FilterElementsNode {
            id: self.ids.next_id("fe"),
            input: Box::new(input),
            include,
            distinct,
        })
    }
}

/// Record the joins `key` needs. metric_time is always local.
fn add_element(
    trie: &mut JoinTrie,
    elements: &LinkableElementSet,
    key: &ElementPathKey,
    context: &str,
) -> PlanResult<()> {
    let unavailable = || PlanError::ElementUnavailable {
        item: key.qualified_name(),
        context: context.to_string(),
    };

    if let Some(found) = elements.path_key_to_linkable_dimensions().get(key) {
        let [element] = found.as_slice() else {
            return Err(unavailable());
        };
        trie.node_at(element.join_path.as_ref());
        return Ok(());
    }
    if let Some(found) = elements.path_key_to_linkable_entities().get(key) {
        let [element] = found.as_slice() else {
            return Err(unavailable());
        };
        trie.node_at(element.join_path.as_ref());
        return Ok(());
    }
    if let Some(found) = elements.path_key_to_linkable_metrics().get(key) {
        let [element] = found.as_slice() else {
            return Err(unavailable());
        };
        trie.node_at(element.join_path.as_ref())
            .metrics
            .entry(element.join_on_entity.clone())
            .or_default()
            .insert(element.metric.clone());
        return Ok(());
    }
    Err(unavailable())
}

fn resolve_filter_items(
    filter: &WhereFilter,
    elements: &LinkableElementSet,
    context: &str,
) -> PlanResult<Vec<ElementPathKey>> {
    let keys = elements.path_keys();
    filter
        .item_references()
        .iter()
        .map(|reference| {
            let name = reference.to_group_by_name();
            match_path_key(&name, &keys, Some(reference.kind)).ok_or(PlanError::ElementUnavailable {
                item: name,
                context: context.to_string(),
            })
        })
        .collect()
}
