use fixtura_core::{
    AssociationKind, ColumnType, Condition, ModelRegistry, ValidationRule, validate_registry,
};

const SNAPSHOT: &str = r#"{
  "registry_version": "0.1",
  "models": [
    {
      "name": "Network",
      "columns": [
        { "name": "id", "type": "integer" },
        { "name": "name", "type": "string" }
      ],
      "validations": {
        "name": [{ "kind": "presence" }, { "kind": "uniqueness" }]
      }
    },
    {
      "name": "Show",
      "columns": [
        { "name": "id", "type": "integer" },
        { "name": "name", "type": "string" },
        { "name": "network_id", "type": "integer" },
        { "name": "status", "type": "string" }
      ],
      "associations": [
        { "name": "network", "kind": "belongs_to", "target": "Network" }
      ],
      "validations": {
        "network": [{ "kind": "presence", "condition": { "when": "field_equals", "field": "status", "value": "airing" } }],
        "status": [{ "kind": "inclusion", "in": ["airing", "ended"], "allow_nil": true }]
      }
    }
  ]
}"#;

#[test]
fn loads_registry_snapshot() {
    let registry = ModelRegistry::from_json(SNAPSHOT).expect("parse registry");
    validate_registry(&registry).expect("valid registry");

    let show = registry.model("Show").expect("show model");
    assert_eq!(show.primary_key, "id");
    assert_eq!(
        show.column("network_id").map(|column| column.column_type),
        Some(ColumnType::Integer)
    );

    let network = show.association("network").expect("network association");
    assert_eq!(network.kind, AssociationKind::BelongsTo);
    assert_eq!(network.foreign_key(), Some("network_id"));

    let presence = show.presence_rule(network).expect("presence rule");
    assert!(matches!(
        presence.condition,
        Some(Condition::FieldEquals { ref field, .. }) if field == "status"
    ));

    let status = show.validations_for("status");
    assert!(matches!(status[0].rule, ValidationRule::Inclusion { ref within } if within.len() == 2));
    assert!(status[0].allow_nil);
}

#[test]
fn serializes_registry_deterministically() {
    let registry = ModelRegistry::from_json(SNAPSHOT).expect("parse registry");
    let first = serde_json::to_string(&registry).expect("serialize registry");
    let reparsed = ModelRegistry::from_json(&first).expect("reparse registry");
    assert_eq!(registry, reparsed);
    assert_eq!(first, serde_json::to_string(&reparsed).expect("serialize again"));
}
