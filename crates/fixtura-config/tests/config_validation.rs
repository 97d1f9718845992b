use std::fs;
use std::path::PathBuf;

use fixtura_config::{
    ConfigError, config_json_schema_value, load_config, validate_config, validate_config_json,
};
use fixtura_core::{Association, ColumnType, ModelMetadata, ModelRegistry, Validation};
use serde_json::json;

fn registry() -> ModelRegistry {
    ModelRegistry::new()
        .with_model(
            ModelMetadata::new("Network")
                .with_column("name", ColumnType::String)
                .with_validation("name", Validation::presence()),
        )
        .with_model(
            ModelMetadata::new("Show")
                .with_column("name", ColumnType::String)
                .with_column("status", ColumnType::String)
                .with_association(Association::belongs_to("network", "Network"))
                .with_validation("network", Validation::presence()),
        )
}

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("fixtura-{}-{name}", std::process::id()));
    fs::write(&path, contents).expect("write scratch config");
    path
}

#[test]
fn valid_config_passes_both_layers() {
    let config = json!({
        "config_version": "0.1",
        "options": { "max_unique_attempts": 50, "base_time": "2024-01-01T12:00:00" },
        "models": [{
            "model": "Show",
            "defaults": { "status": "airing", "network": { "name": "HBO" } },
            "force_on_create": ["network"],
            "presets": { "ended": { "status": "ended" } }
        }]
    });
    let schema = config_json_schema_value().expect("schema json");

    let structural = validate_config_json(&config, &schema).expect("compile schema");
    assert!(structural.is_ok(), "structural errors: {:?}", structural.errors);

    let validated = validate_config(&config, &schema, &registry()).expect("valid config");
    assert!(validated.warnings.is_empty());
    assert_eq!(validated.config.options.max_unique_attempts, Some(50));
    assert!(validated.config.options.base_time.is_some());
    assert_eq!(validated.config.options.email_domain, "example.com");
}

#[test]
fn structural_errors_carry_json_paths() {
    let config = json!({
        "config_version": "0.1",
        "models": [{ "model": 42 }]
    });
    let schema = config_json_schema_value().expect("schema json");
    let report = validate_config(&config, &schema, &registry()).expect_err("invalid");
    assert!(
        report
            .errors
            .iter()
            .any(|issue| issue.code == "schema_violation" && issue.path == "/models/0/model")
    );
}

#[test]
fn load_config_reads_toml() {
    let path = scratch_file(
        "load.toml",
        r#"
config_version = "0.1"

[[models]]
model = "Show"
force_on_create = ["network"]

[models.presets.ended]
status = "ended"
"#,
    );
    let validated = load_config(&path, &registry()).expect("load toml config");
    let show = validated.config.model("Show").expect("show config");
    assert_eq!(show.force_on_create, vec!["network".to_string()]);
    assert!(show.presets.contains_key("ended"));
    fs::remove_file(path).ok();
}

#[test]
fn load_config_surfaces_registry_issues() {
    let path = scratch_file(
        "unknown.json",
        r#"{ "config_version": "0.1", "models": [{ "model": "Movie" }] }"#,
    );
    let err = load_config(&path, &registry()).expect_err("unknown model");
    match err {
        ConfigError::Invalid(report) => assert_eq!(report.codes(), vec!["unknown_model"]),
        other => panic!("unexpected error: {other}"),
    }
    fs::remove_file(path).ok();
}
