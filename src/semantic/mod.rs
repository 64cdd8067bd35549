//! Semantic layer core.
//!
//! Built leaf first, once per manifest:
//!
//! 1. [`model_index`] indexes semantic models by entity and measure.
//! 2. [`join_evaluator`] decides which model-to-model joins are fan-out safe.
//! 3. [`linkable`] searches the join graph and caches every element each
//!    measure and metric can be grouped by.
//! 4. [`metric_lookup`] registers metrics and fronts the resolver.
//!
//! Everything here is immutable after construction and can be shared
//! between readers without locking.

pub mod error;
pub mod join_evaluator;
pub mod linkable;
pub mod metric_lookup;
pub mod model_index;
pub mod specs;

pub use error::{
    LookupKind, ManifestIssue, ManifestValidationError, NotFoundError, SemanticError,
    SemanticResult,
};
pub use join_evaluator::{Cardinality, JoinEvaluator};
pub use linkable::{
    ElementPathKey, LinkableElementFilter, LinkableElementProperty, LinkableElementSet,
    ResolverConfig, ValidLinkableSpecResolver,
};
pub use metric_lookup::{MetricAccessor, MetricLookup, MetricLookupBuilder};
pub use model_index::{SemanticModelAccessor, SemanticModelIndex};
pub use specs::{GroupBySpec, LinkableSpecSet};
