//! Query planner - converts a metric query into a dataflow plan.
//!
//! Two phases:
//! 1. Resolution: names → metric references and path keys (`QueryParser`)
//! 2. Dataflow planning: resolved query → operator tree (`DataflowPlanBuilder`)

pub mod dataflow;
pub mod group_by_name;
pub mod query;
pub mod query_parser;
pub mod suggestions;

pub use dataflow::{DataflowPlan, DataflowPlanBuilder, DataflowPlanNode, IdGenerator, NodeId};
pub use group_by_name::GroupByItemName;
pub use query::{MetricQuery, OrderBySpec, OrderByTarget, OutputTarget, ResolvedQuery};
pub use query_parser::{IssueKind, QueryParser, QueryResolutionError, ResolutionIssue};
pub use suggestions::SuggestionConfig;

use thiserror::Error;
use tracing::debug;

use crate::semantic::error::SemanticError;
use crate::semantic::metric_lookup::MetricLookup;

/// Errors that can occur during planning.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Resolution(#[from] QueryResolutionError),

    #[error("'{item}' cannot be resolved to exactly one element for '{context}'")]
    ElementUnavailable { item: String, context: String },

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),
}

impl PlanError {
    /// The resolution error, if this is one.
    pub fn as_resolution(&self) -> Option<&QueryResolutionError> {
        match self {
            PlanError::Resolution(e) => Some(e),
            _ => None,
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Main entry point for query planning.
pub struct QueryPlanner<'a> {
    lookup: &'a MetricLookup,
    suggestions: SuggestionConfig,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(lookup: &'a MetricLookup) -> Self {
        Self {
            lookup,
            suggestions: SuggestionConfig::default(),
        }
    }

    pub fn with_suggestion_config(mut self, config: SuggestionConfig) -> Self {
        self.suggestions = config;
        self
    }

    /// Resolve names only.
    pub fn resolve(&self, query: &MetricQuery) -> PlanResult<ResolvedQuery> {
        QueryParser::new(self.lookup)
            .with_suggestion_config(self.suggestions)
            .parse(query)
    }

    /// Resolve and plan a query. Node ids start at 0 for every call.
    pub fn plan(&self, query: &MetricQuery) -> PlanResult<DataflowPlan> {
        let resolved = self.resolve(query)?;
        debug!(metrics = ?query.metrics, group_by = ?query.group_by, "planning query");
        DataflowPlanBuilder::new(self.lookup, IdGenerator::new()).build_plan(&resolved)
    }
}
