//! Configuration module for metrica.
//!
//! Handles the settings file and environment variables.

mod settings;

pub use settings::{
    expand_env_vars, LoggingSettings, ManifestSettings, PlannerSettings, ResolverSettings,
    Settings, SettingsError, CONFIG_ENV_VAR,
};
