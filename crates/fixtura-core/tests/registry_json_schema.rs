use fixtura_core::ModelRegistry;
use schemars::schema_for;

#[test]
fn json_schema_lists_registry_contract() {
    let generated = schema_for!(ModelRegistry);
    let json = serde_json::to_value(&generated).expect("serialize generated schema");

    let required = json["required"].as_array().expect("required list");
    assert!(required.contains(&serde_json::json!("registry_version")));
    assert!(required.contains(&serde_json::json!("models")));

    let definitions = json["definitions"].as_object().expect("definitions");
    for name in ["ModelMetadata", "Association", "Validation", "ColumnType"] {
        assert!(definitions.contains_key(name), "missing definition {name}");
    }
}
