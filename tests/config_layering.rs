//! Layered configuration feeding the worker and telemetry sections.

use std::fs;

use edge_worker::ImageFallback;
use petcare_edge::config::{project_config_path, ConfigError, ConfigOrigin, EffectiveConfig};
use serde_json::json;
use tempfile::TempDir;

fn write_project_config(dir: &TempDir, contents: &str) {
    let path = project_config_path(dir.path());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_project_file_under_dot_petcare() {
    let dir = TempDir::new().unwrap();
    write_project_config(
        &dir,
        r#"
[cache]
version = 4
origin = "https://petcare.test"
image_fallback = "empty_ok"

[telemetry]
interval_seconds = 120
"#,
    );

    let config = EffectiveConfig::build(None, Some(&project_config_path(dir.path())), None).unwrap();
    let settings = config.settings();

    assert_eq!(settings.cache.version, 4);
    assert_eq!(settings.cache.origin, "https://petcare.test");
    assert_eq!(settings.cache.image_fallback, ImageFallback::EmptyOk);
    assert_eq!(settings.telemetry.interval_seconds, 120);
    // Untouched keys keep their defaults
    assert_eq!(settings.telemetry.cooldown_seconds, 300);
    assert_eq!(config.sources[1].origin, ConfigOrigin::Project);
}

#[test]
fn test_cli_beats_project() {
    let dir = TempDir::new().unwrap();
    write_project_config(&dir, "[cache]\nversion = 4\n");

    let cli = json!({ "cache": { "version": 9 } });
    let config =
        EffectiveConfig::build(None, Some(&project_config_path(dir.path())), Some(cli)).unwrap();

    assert_eq!(config.settings().cache.version, 9);
    let origins: Vec<_> = config.sources.iter().map(|s| s.origin).collect();
    assert_eq!(
        origins,
        vec![ConfigOrigin::Builtin, ConfigOrigin::Project, ConfigOrigin::Cli]
    );
}

#[test]
fn test_api_patterns_replace_rather_than_append() {
    let dir = TempDir::new().unwrap();
    write_project_config(&dir, "[cache]\napi_patterns = [\"^/graphql\"]\n");

    let config = EffectiveConfig::build(None, Some(&project_config_path(dir.path())), None).unwrap();
    assert_eq!(config.settings().cache.selector.api_patterns, vec!["^/graphql".to_string()]);
}

#[test]
fn test_messaging_token_redacted_in_output() {
    let dir = TempDir::new().unwrap();
    write_project_config(&dir, "[messaging]\nauth_token = \"hunter2\"\nproduction = true\n");

    let config = EffectiveConfig::build(None, Some(&project_config_path(dir.path())), None).unwrap();

    assert_eq!(config.settings().messaging.auth_token.as_deref(), Some("hunter2"));
    assert!(config.settings().messaging.production);
    let rendered = config.to_json().unwrap();
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("[REDACTED]"));
}

#[test]
fn test_invalid_thresholds_fail_validation() {
    let dir = TempDir::new().unwrap();
    write_project_config(&dir, "[telemetry]\nemergency_percent = 120.0\n");

    let err = EffectiveConfig::build(None, Some(&project_config_path(dir.path())), None).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}
