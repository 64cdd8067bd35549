//! Error types for the semantic layer.
//!
//! Construction problems are collected into a [`ManifestValidationError`] so
//! a manifest reports every issue at once. Lookups of unregistered names
//! return [`NotFoundError`]. Join invalidity is never an error; the join
//! evaluator answers it with `None`/`false`.

use std::fmt;

use crate::model::AggregationType;

/// Result type for semantic operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemanticError {
    /// The manifest could not be indexed.
    #[error(transparent)]
    InvalidManifest(#[from] ManifestValidationError),

    #[error("Metric '{0}' is already registered")]
    DuplicateMetric(String),

    #[error("Metric '{metric}' references measure '{measure}', which is not defined in any semantic model")]
    NonExistentMeasure { metric: String, measure: String },

    /// Input metric missing or not yet registered.
    #[error("Metric '{metric}' references metric '{input}', which has not been registered")]
    UnknownMetricInput { metric: String, input: String },

    #[error("Metric definitions form a cycle through: {}", .0.join(", "))]
    MetricCycle(Vec<String>),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Internal consistency violation; never expected for a valid manifest.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SemanticError {
    /// Whether this is a lookup of an unregistered name.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SemanticError::NotFound(_))
    }
}

/// What kind of name a failed lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    SemanticModel,
    Measure,
    Metric,
}

impl LookupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupKind::SemanticModel => "semantic model",
            LookupKind::Measure => "measure",
            LookupKind::Metric => "metric",
        }
    }
}

/// A keyed lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {} '{key}'", .kind.as_str())]
pub struct NotFoundError {
    pub kind: LookupKind,
    pub key: String,
}

impl NotFoundError {
    pub fn new(kind: LookupKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn metric(key: impl Into<String>) -> Self {
        Self::new(LookupKind::Metric, key)
    }

    pub fn measure(key: impl Into<String>) -> Self {
        Self::new(LookupKind::Measure, key)
    }

    pub fn semantic_model(key: impl Into<String>) -> Self {
        Self::new(LookupKind::SemanticModel, key)
    }

    /// The name that was looked up.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Every problem found while indexing a manifest.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct ManifestValidationError {
    pub issues: Vec<ManifestIssue>,
}

impl fmt::Display for ManifestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Manifest failed validation with {} issue(s):",
            self.issues.len()
        )?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// A single construction-time problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestIssue {
    DuplicateSemanticModel {
        name: String,
    },

    /// A measure name declared by more than one model. `aggregations` is set
    /// when the declarations also disagree on the aggregation.
    MeasureInMultipleModels {
        measure: String,
        models: Vec<String>,
        aggregations: Option<Vec<AggregationType>>,
    },

    /// The aggregation time dimension does not name exactly one time
    /// dimension with a granularity in the owning model.
    InvalidAggTimeDimension {
        model: String,
        measure: String,
        agg_time_dimension: Option<String>,
        reason: String,
    },

    MultiplePrimaryEntities {
        model: String,
        entities: Vec<String>,
    },

    /// Dimensions are declared but no primary entity can address them.
    MissingPrimaryEntity {
        model: String,
    },
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestIssue::DuplicateSemanticModel { name } => {
                write!(f, "Semantic model '{}' is registered more than once", name)
            }
            ManifestIssue::MeasureInMultipleModels {
                measure,
                models,
                aggregations,
            } => {
                write!(
                    f,
                    "Measure '{}' is defined in several semantic models: {}",
                    measure,
                    models.join(", ")
                )?;
                if let Some(aggs) = aggregations {
                    let aggs: Vec<&str> = aggs.iter().map(|a| a.as_str()).collect();
                    write!(f, " (conflicting aggregations: {})", aggs.join(", "))?;
                }
                Ok(())
            }
            ManifestIssue::InvalidAggTimeDimension {
                model,
                measure,
                agg_time_dimension,
                reason,
            } => match agg_time_dimension {
                Some(name) => write!(
                    f,
                    "Aggregation time dimension '{}' of measure '{}' in '{}' is invalid: {}",
                    name, measure, model, reason
                ),
                None => write!(
                    f,
                    "Measure '{}' in '{}' has no aggregation time dimension: {}",
                    measure, model, reason
                ),
            },
            ManifestIssue::MultiplePrimaryEntities { model, entities } => write!(
                f,
                "Semantic model '{}' has more than one primary entity: {}",
                model,
                entities.join(", ")
            ),
            ManifestIssue::MissingPrimaryEntity { model } => write!(
                f,
                "Semantic model '{}' has dimensions but no primary entity",
                model
            ),
        }
    }
}
