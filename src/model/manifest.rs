//! The manifest: every semantic model and metric of a project.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::metric::Metric;
use super::semantic_model::SemanticModel;

/// Parsed semantic manifest.
///
/// Shape validation happens upstream; cross-reference validation happens when
/// the index and metric lookup are built from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub semantic_models: Vec<SemanticModel>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl Manifest {
    pub fn new(semantic_models: Vec<SemanticModel>, metrics: Vec<Metric>) -> Self {
        Self {
            semantic_models,
            metrics,
        }
    }

    /// Load a manifest already rendered to JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// SHA-256 of the manifest's JSON serialization, as 64 lowercase hex chars.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}
