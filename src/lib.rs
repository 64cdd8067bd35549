//! # Metrica
//!
//! The core of a metrics semantic layer: which dimensions, entities and
//! metrics a metric can be grouped by, over which joins, and the dataflow
//! plan that computes a query.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Manifest (semantic models, metrics)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [model_index]
//! ┌─────────────────────────────────────────────────────────┐
//! │       SemanticModelIndex (entities, measures)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [join_evaluator + linkable]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Linkable element sets per model, measure and metric    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [metric_lookup]
//! ┌─────────────────────────────────────────────────────────┐
//! │                     MetricLookup                         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │                    DataflowPlan                          │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod logging;
pub mod model;
pub mod planner;
pub mod semantic;

#[doc(hidden)]
pub mod test_fixtures;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::model::{
        Dimension, Entity, Manifest, Measure, Metric, MetricReference, SemanticModel,
        TimeGranularity, WhereFilter,
    };
    pub use crate::planner::{DataflowPlan, MetricQuery, QueryPlanner, ResolvedQuery};
    pub use crate::semantic::{
        LinkableElementFilter, LinkableElementProperty, LinkableElementSet, MetricAccessor,
        MetricLookup, ResolverConfig, SemanticError, SemanticModelAccessor,
    };
}

pub use model::Manifest;
pub use planner::{MetricQuery, QueryPlanner};
pub use semantic::MetricLookup;
