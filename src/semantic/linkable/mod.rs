//! Linkable elements and the resolver that enumerates them.

pub mod element_set;
pub mod metric_time;
pub mod resolver;
pub mod types;

pub use element_set::{LinkableElementFilter, LinkableElementSet};
pub use resolver::{ResolverConfig, ValidLinkableSpecResolver};
pub use types::{
    ElementPathKey, ElementProvenance, LinkableDimension, LinkableElement,
    LinkableElementProperty, LinkableElementType, LinkableEntity, LinkableMetric,
    SemanticModelJoinPath, SemanticModelJoinPathElement, METRIC_TIME_ELEMENT_NAME,
};
