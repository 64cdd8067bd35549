//! Semantic manifest types.
//!
//! These are the immutable inputs to the index, resolver and planner:
//! semantic models with their entities, dimensions and measures, plus metrics.

pub mod filter;
pub mod manifest;
pub mod metric;
pub mod references;
pub mod semantic_model;
pub mod types;

pub use filter::{FilterItemKind, FilterItemReference, WhereFilter};
pub use manifest::Manifest;
pub use metric::{
    ConversionCalculationType, Metric, MetricInput, MetricInputMeasure, MetricKind,
    MetricTimeWindow, MetricType,
};
pub use references::{
    DimensionReference, EntityReference, MeasureReference, MetricReference,
    SemanticModelReference, TimeDimensionReference,
};
pub use semantic_model::{
    Dimension, DimensionTypeParams, Entity, Measure, NonAdditiveDimension, SemanticModel,
    SemanticModelDefaults, ValidityParams,
};
pub use types::{AggregationType, DatePart, DimensionType, EntityType, TimeGranularity};
