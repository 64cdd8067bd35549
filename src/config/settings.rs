//! TOML-based configuration for metrica.
//!
//! Supports a config file (metrica.toml) with environment variable expansion
//! in paths.
//!
//! Example configuration:
//! ```toml
//! [manifest]
//! path = "${PROJECT_DIR}/target/semantic_manifest.json"
//!
//! [resolver]
//! max_entity_links = 2
//! default_metric_time_granularity = "day"
//!
//! [planner]
//! max_suggestions = 6
//! min_suggestion_score = 0.6
//!
//! [logging]
//! filter = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::TimeGranularity;
use crate::planner::SuggestionConfig;
use crate::semantic::linkable::ResolverConfig;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "METRICA_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub manifest: ManifestSettings,
    pub resolver: ResolverSettings,
    pub planner: PlannerSettings,
    pub logging: LoggingSettings,
}

/// Where to find the manifest when none is given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManifestSettings {
    /// Path to a JSON manifest (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl ManifestSettings {
    /// The manifest path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Join search limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Maximum entity links on a reachable element.
    pub max_entity_links: usize,

    /// metric_time granularity for queries without metrics.
    pub default_metric_time_granularity: TimeGranularity,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let config = ResolverConfig::default();
        Self {
            max_entity_links: config.max_entity_links,
            default_metric_time_granularity: config.default_metric_time_granularity,
        }
    }
}

impl From<&ResolverSettings> for ResolverConfig {
    fn from(settings: &ResolverSettings) -> Self {
        ResolverConfig {
            max_entity_links: settings.max_entity_links,
            default_metric_time_granularity: settings.default_metric_time_granularity,
        }
    }
}

/// Query resolution settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Suggestions offered per unresolved name.
    pub max_suggestions: usize,

    /// Similarity floor for suggestions (0.0 to 1.0).
    pub min_suggestion_score: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        let config = SuggestionConfig::default();
        Self {
            max_suggestions: config.max_suggestions,
            min_suggestion_score: config.min_score,
        }
    }
}

impl From<&PlannerSettings> for SuggestionConfig {
    fn from(settings: &PlannerSettings) -> Self {
        SuggestionConfig {
            max_suggestions: settings.max_suggestions,
            min_score: settings.min_suggestion_score,
        }
    }
}

/// Log output settings. `RUST_LOG` takes precedence.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing-subscriber` filter directive, e.g. `"metrica=debug"`.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `METRICA_CONFIG`
    /// 2. `./metrica.toml`
    /// 3. `~/.config/metrica/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("metrica.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("metrica").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.resolver.max_entity_links == 0 {
            return Err(SettingsError::InvalidConfig(
                "resolver.max_entity_links must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.planner.min_suggestion_score) {
            return Err(SettingsError::InvalidConfig(format!(
                "planner.min_suggestion_score must be between 0 and 1, got {}",
                self.planner.min_suggestion_score
            )));
        }
        Ok(())
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::from(&self.resolver)
    }

    pub fn suggestion_config(&self) -> SuggestionConfig {
        SuggestionConfig::from(&self.planner)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }
        let mut var_name = String::new();
        while let Some(&ch) = chars.peek() {
            if braced {
                chars.next();
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            } else if ch.is_alphanumeric() || ch == '_' {
                chars.next();
                var_name.push(ch);
            } else {
                break;
            }
        }
        if var_name.is_empty() && !braced {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }
        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
