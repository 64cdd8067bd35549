//! Dataflow plan node types.

use crate::model::{
    EntityReference, MeasureReference, MetricReference, MetricTimeWindow, SemanticModelReference,
    TimeGranularity, WhereFilter,
};
use crate::planner::query::OrderBySpec;

use super::id::NodeId;

/// Dataflow plan node. Every node owns its inputs, so a plan is a tree
/// rooted at its sink.
#[derive(Debug, Clone, PartialEq)]
pub enum DataflowPlanNode {
    // Sources
    ReadSqlSource(ReadSqlSourceNode),
    ReadTimeSpine(ReadTimeSpineNode),

    // Joins
    JoinOnEntities(JoinOnEntitiesNode),
    JoinOverTimeRange(JoinOverTimeRangeNode),
    JoinConversionEvents(JoinConversionEventsNode),

    // Row and column selection
    WhereConstraint(WhereConstraintNode),
    FilterElements(FilterElementsNode),

    // Aggregation and metrics
    AggregateMeasures(AggregateMeasuresNode),
    ComputeMetrics(ComputeMetricsNode),
    CombineAggregatedOutputs(CombineAggregatedOutputsNode),

    // Output
    OrderByLimit(OrderByLimitNode),
    WriteToResultDataframe(WriteToResultDataframeNode),
    WriteToResultTable(WriteToResultTableNode),
}

/// Read the rows of a semantic model.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadSqlSourceNode {
    pub id: NodeId,
    pub semantic_model: SemanticModelReference,
    pub node_relation: Option<String>,
}

/// Read the time spine at a granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadTimeSpineNode {
    pub id: NodeId,
    pub granularity: TimeGranularity,
}

/// One right-hand side of a [`JoinOnEntitiesNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTarget {
    pub right: DataflowPlanNode,
    pub join_on_entity: EntityReference,
}

/// Left join of `left` to each target on its entity. Columns from a target
/// are prefixed with the target's entity.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOnEntitiesNode {
    pub id: NodeId,
    pub left: Box<DataflowPlanNode>,
    pub targets: Vec<JoinTarget>,
}

/// Join every time spine row to the measure rows within a trailing window
/// or since the start of a grain. Neither set means all time.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOverTimeRangeNode {
    pub id: NodeId,
    pub input: Box<DataflowPlanNode>,
    pub window: Option<MetricTimeWindow>,
    pub grain_to_date: Option<TimeGranularity>,
}

/// Match each base event to the conversion events of the same entity.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinConversionEventsNode {
    pub id: NodeId,
    pub base: Box<DataflowPlanNode>,
    pub conversion: Box<DataflowPlanNode>,
    pub entity: EntityReference,
    pub window: Option<MetricTimeWindow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereConstraintNode {
    pub id: NodeId,
    pub input: Box<DataflowPlanNode>,
    pub filter: WhereFilter,
}

/// Keep only the named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterElementsNode {
    pub id: NodeId,
    pub input: Box<DataflowPlanNode>,
    pub include: Vec<String>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMeasuresNode {
    pub id: NodeId,
    pub input: Box<DataflowPlanNode>,
    pub measures: Vec<MeasureReference>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeMetricsNode {
    pub id: NodeId,
    pub input: Box<DataflowPlanNode>,
    pub metrics: Vec<MetricReference>,
}

/// Full outer join of aggregated outputs on their group-by items.
#[derive(Debug, Clone, PartialEq)]
pub struct CombineAggregatedOutputsNode {
    pub id: NodeId,
    pub inputs: Vec<DataflowPlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByLimitNode {
    pub id: NodeId,
    pub input: Box<DataflowPlanNode>,
    pub order_by: Vec<OrderBySpec>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteToResultDataframeNode {
    pub id: NodeId,
    pub input: Box<DataflowPlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteToResultTableNode {
    pub id: NodeId,
    pub input: Box<DataflowPlanNode>,
    pub table: String,
}

impl DataflowPlanNode {
    pub fn id(&self) -> &NodeId {
        match self {
            DataflowPlanNode::ReadSqlSource(n) => &n.id,
            DataflowPlanNode::ReadTimeSpine(n) => &n.id,
            DataflowPlanNode::JoinOnEntities(n) => &n.id,
            DataflowPlanNode::JoinOverTimeRange(n) => &n.id,
            DataflowPlanNode::JoinConversionEvents(n) => &n.id,
            DataflowPlanNode::WhereConstraint(n) => &n.id,
            DataflowPlanNode::FilterElements(n) => &n.id,
            DataflowPlanNode::AggregateMeasures(n) => &n.id,
            DataflowPlanNode::ComputeMetrics(n) => &n.id,
            DataflowPlanNode::CombineAggregatedOutputs(n) => &n.id,
            DataflowPlanNode::OrderByLimit(n) => &n.id,
            DataflowPlanNode::WriteToResultDataframe(n) => &n.id,
            DataflowPlanNode::WriteToResultTable(n) => &n.id,
        }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            DataflowPlanNode::ReadSqlSource(_) => "ReadSqlSource",
            DataflowPlanNode::ReadTimeSpine(_) => "ReadTimeSpine",
            DataflowPlanNode::JoinOnEntities(_) => "JoinOnEntities",
            DataflowPlanNode::JoinOverTimeRange(_) => "JoinOverTimeRange",
            DataflowPlanNode::JoinConversionEvents(_) => "JoinConversionEvents",
            DataflowPlanNode::WhereConstraint(_) => "WhereConstraint",
            DataflowPlanNode::FilterElements(_) => "FilterElements",
            DataflowPlanNode::AggregateMeasures(_) => "AggregateMeasures",
            DataflowPlanNode::ComputeMetrics(_) => "ComputeMetrics",
            DataflowPlanNode::CombineAggregatedOutputs(_) => "CombineAggregatedOutputs",
            DataflowPlanNode::OrderByLimit(_) => "OrderByLimit",
            DataflowPlanNode::WriteToResultDataframe(_) => "WriteToResultDataframe",
            DataflowPlanNode::WriteToResultTable(_) => "WriteToResultTable",
        }
    }

    /// One-line summary of the node's parameters. Empty when it has none.
    pub fn description(&self) -> String {
        match self {
            DataflowPlanNode::ReadSqlSource(n) => match &n.node_relation {
                Some(relation) => format!("{} ({})", n.semantic_model, relation),
                None => n.semantic_model.to_string(),
            },
            DataflowPlanNode::ReadTimeSpine(n) => n.granularity.to_string(),
            DataflowPlanNode::JoinOnEntities(n) => {
                let entities: Vec<&str> = n.targets.iter().map(|t| t.join_on_entity.as_str()).collect();
                format!("on {}", entities.join(", "))
            }
            DataflowPlanNode::JoinOverTimeRange(n) => match (&n.window, n.grain_to_date) {
                (Some(window), _) => format!("window {} {}", window.count, window.granularity),
                (None, Some(grain)) => format!("{} to date", grain),
                (None, None) => "all time".to_string(),
            },
            DataflowPlanNode::JoinConversionEvents(n) => match &n.window {
                Some(window) => format!(
                    "on {} within {} {}",
                    n.entity, window.count, window.granularity
                ),
                None => format!("on {}", n.entity),
            },
            DataflowPlanNode::WhereConstraint(n) => n.filter.template.clone(),
            DataflowPlanNode::FilterElements(n) => {
                let mut text = n.include.join(", ");
                if n.distinct {
                    text.push_str(" (distinct)");
                }
                text
            }
            DataflowPlanNode::AggregateMeasures(n) => {
                let names: Vec<&str> = n.measures.iter().map(|m| m.as_str()).collect();
                names.join(", ")
            }
            DataflowPlanNode::ComputeMetrics(n) => {
                let names: Vec<&str> = n.metrics.iter().map(|m| m.as_str()).collect();
                names.join(", ")
            }
            DataflowPlanNode::CombineAggregatedOutputs(_) => String::new(),
            DataflowPlanNode::OrderByLimit(n) => {
                let mut parts = Vec::new();
                if !n.order_by.is_empty() {
                    let items: Vec<String> = n.order_by.iter().map(|o| o.to_string()).collect();
                    parts.push(format!("order by {}", items.join(", ")));
                }
                if let Some(limit) = n.limit {
                    parts.push(format!("limit {}", limit));
                }
                parts.join(" ")
            }
            DataflowPlanNode::WriteToResultDataframe(_) => String::new(),
            DataflowPlanNode::WriteToResultTable(n) => n.table.clone(),
        }
    }

    /// Direct inputs, left side first.
    pub fn children(&self) -> Vec<&DataflowPlanNode> {
        match self {
            DataflowPlanNode::ReadSqlSource(_) | DataflowPlanNode::ReadTimeSpine(_) => Vec::new(),
            DataflowPlanNode::JoinOnEntities(n) => std::iter::once(n.left.as_ref())
                .chain(n.targets.iter().map(|t| &t.right))
                .collect(),
            DataflowPlanNode::JoinConversionEvents(n) => vec![n.base.as_ref(), n.conversion.as_ref()],
            DataflowPlanNode::CombineAggregatedOutputs(n) => n.inputs.iter().collect(),
            DataflowPlanNode::JoinOverTimeRange(n) => vec![n.input.as_ref()],
            DataflowPlanNode::WhereConstraint(n) => vec![n.input.as_ref()],
            DataflowPlanNode::FilterElements(n) => vec![n.input.as_ref()],
            DataflowPlanNode::AggregateMeasures(n) => vec![n.input.as_ref()],
            DataflowPlanNode::ComputeMetrics(n) => vec![n.input.as_ref()],
            DataflowPlanNode::OrderByLimit(n) => vec![n.input.as_ref()],
            DataflowPlanNode::WriteToResultDataframe(n) => vec![n.input.as_ref()],
            DataflowPlanNode::WriteToResultTable(n) => vec![n.input.as_ref()],
        }
    }

    /// This node and all of its descendants, parents before children.
    pub fn descendants(&self) -> Vec<&DataflowPlanNode> {
        let mut out = vec![self];
        for child in self.children() {
            out.extend(child.descendants());
        }
        out
    }
}

/// A complete plan, rooted at its sink node.
#[derive(Debug, Clone, PartialEq)]
pub struct DataflowPlan {
    sink: DataflowPlanNode,
}

impl DataflowPlan {
    pub fn new(sink: DataflowPlanNode) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &DataflowPlanNode {
        &self.sink
    }

    pub fn node_count(&self) -> usize {
        self.sink.descendants().len()
    }

    /// Nodes of one type in pre-order.
    pub fn nodes_of_type(&self, node_type: &str) -> Vec<&DataflowPlanNode> {
        self.sink
            .descendants()
            .into_iter()
            .filter(|n| n.node_type() == node_type)
            .collect()
    }

    /// Indented tree, one node per line: `Type (id): description`.
    pub fn text_structure(&self) -> String {
        let mut out = String::new();
        render(&self.sink, 0, &mut out);
        out
    }
}

fn render(node: &DataflowPlanNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(node.node_type());
    out.push_str(" (");
    out.push_str(node.id().as_str());
    out.push(')');
    let description = node.description();
    if !description.is_empty() {
        out.push_str(": ");
        out.push_str(&description);
    }
    out.push('\n');
    for child in node.children() {
        render(child, depth + 1, out);
    }
}
