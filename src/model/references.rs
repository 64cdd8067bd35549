//! Typed names for model elements.
//!
//! Every element is identified by name only, but the types keep a measure
//! name from being passed where an entity name is expected.

use serde::{Deserialize, Serialize};

macro_rules! reference_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_string())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }
    };
}

reference_type!(
    /// Name of a semantic model.
    SemanticModelReference
);
reference_type!(
    /// Name of an entity (join key).
    EntityReference
);
reference_type!(
    /// Name of a categorical or time dimension.
    DimensionReference
);
reference_type!(
    /// Name of a time dimension.
    TimeDimensionReference
);
reference_type!(
    /// Name of a measure.
    MeasureReference
);
reference_type!(
    /// Name of a metric.
    MetricReference
);

impl From<TimeDimensionReference> for DimensionReference {
    fn from(reference: TimeDimensionReference) -> Self {
        DimensionReference(reference.0)
    }
}
