use std::env;
use std::fs;
use std::path::PathBuf;

use metrica::config::{Settings, SettingsError};
use metrica::model::TimeGranularity;
use metrica::planner::SuggestionConfig;
use metrica::semantic::ResolverConfig;

const FULL: &str = r#"
[manifest]
path = "/srv/project/target/semantic_manifest.json"

[resolver]
max_entity_links = 3
default_metric_time_granularity = "month"

[planner]
max_suggestions = 3
min_suggestion_score = 0.8

[logging]
filter = "metrica=debug"
"#;

#[test]
fn test_full_settings() {
    let settings = Settings::from_toml_str(FULL).unwrap();
    assert_eq!(
        settings.manifest.resolved_path().unwrap(),
        Some(PathBuf::from("/srv/project/target/semantic_manifest.json"))
    );
    assert_eq!(
        settings.resolver_config(),
        ResolverConfig {
            max_entity_links: 3,
            default_metric_time_granularity: TimeGranularity::Month,
        }
    );
    assert_eq!(
        settings.suggestion_config(),
        SuggestionConfig {
            max_suggestions: 3,
            min_score: 0.8,
        }
    );
    assert_eq!(settings.logging.filter, "metrica=debug");
}

#[test]
fn test_missing_sections_use_defaults() {
    let settings = Settings::from_toml_str("[resolver]\nmax_entity_links = 1\n").unwrap();
    assert_eq!(settings.resolver.max_entity_links, 1);
    assert_eq!(
        settings.resolver.default_metric_time_granularity,
        TimeGranularity::Day
    );
    assert_eq!(settings.suggestion_config(), SuggestionConfig::default());
    assert_eq!(settings.manifest.resolved_path().unwrap(), None);

    assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
}

#[test]
fn test_zero_entity_links_rejected() {
    let err = Settings::from_toml_str("[resolver]\nmax_entity_links = 0\n").unwrap_err();
    assert!(matches!(err, SettingsError::InvalidConfig(_)));
}

#[test]
fn test_suggestion_score_out_of_range_rejected() {
    let err = Settings::from_toml_str("[planner]\nmin_suggestion_score = 1.5\n").unwrap_err();
    match err {
        SettingsError::InvalidConfig(message) => assert!(message.contains("1.5")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unknown_granularity_is_a_parse_error() {
    let err = Settings::from_toml_str("[resolver]\ndefault_metric_time_granularity = \"fortnight\"\n")
        .unwrap_err();
    assert!(matches!(err, SettingsError::ParseError(_)));
}

#[test]
fn test_missing_file() {
    let path = env::temp_dir().join("metrica_settings_test_does_not_exist.toml");
    let err = Settings::from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::FileNotFound(p) if p == path));
}

#[test]
fn test_from_file() {
    let path = env::temp_dir().join(format!("metrica_settings_test_{}.toml", std::process::id()));
    fs::write(&path, FULL).unwrap();
    let settings = Settings::from_file(&path);
    fs::remove_file(&path).unwrap();
    assert_eq!(settings.unwrap().resolver.max_entity_links, 3);
}

#[test]
fn test_manifest_path_expands_env_vars() {
    env::set_var("METRICA_SETTINGS_TEST_PROJECT", "/work/shop");
    let settings = Settings::from_toml_str(
        "[manifest]\npath = \"${METRICA_SETTINGS_TEST_PROJECT}/target/manifest.json\"\n",
    )
    .unwrap();
    assert_eq!(
        settings.manifest.resolved_path().unwrap(),
        Some(PathBuf::from("/work/shop/target/manifest.json"))
    );
    env::remove_var("METRICA_SETTINGS_TEST_PROJECT");

    let missing = Settings::from_toml_str("[manifest]\npath = \"${METRICA_SETTINGS_TEST_UNSET}/m.json\"\n")
        .unwrap();
    assert!(matches!(
        missing.manifest.resolved_path(),
        Err(SettingsError::MissingEnvVar(name)) if name == "METRICA_SETTINGS_TEST_UNSET"
    ));
}
