#![allow(dead_code)]

use chrono::NaiveDateTime;
use fixtura_core::{Association, ColumnType, Condition, ModelMetadata, ModelRegistry, Validation};
use fixtura_engine::{InMemoryStore, Sampler, SamplerOptions};

/// A small catalog of TV shows exercising every association and rule kind.
pub fn registry() -> ModelRegistry {
    ModelRegistry::new()
        .with_model(
            ModelMetadata::new("Network")
                .with_column("name", ColumnType::String)
                .with_validation("name", Validation::presence())
                .with_validation("name", Validation::uniqueness()),
        )
        .with_model(
            ModelMetadata::new("Show")
                .with_column("name", ColumnType::String)
                .with_column("status", ColumnType::String)
                .with_column("premiered_at", ColumnType::Datetime)
                .with_timestamps()
                .with_association(Association::belongs_to("network", "Network"))
                .with_association(Association::belongs_to("merged_into", "Show"))
                .with_association(Association::has_many_through(
                    "tags", "Tag", "Tagging", "show_id", "tag_id",
                ))
                .with_association(Association::has_many("episodes", "Episode", "show_id"))
                .with_validation("name", Validation::uniqueness())
                .with_validation(
                    "status",
                    Validation::inclusion(vec![
                        serde_json::json!("airing"),
                        serde_json::json!("ended"),
                    ]),
                )
                .with_validation("network", Validation::presence()),
        )
        .with_model(
            ModelMetadata::new("Tag")
                .with_column("name", ColumnType::String)
                .with_validation("name", Validation::presence())
                .with_validation("name", Validation::uniqueness()),
        )
        .with_model(
            ModelMetadata::new("Tagging")
                .with_association(Association::belongs_to("show", "Show"))
                .with_association(Association::belongs_to("tag", "Tag"))
                .with_validation("show", Validation::presence())
                .with_validation("tag", Validation::presence())
                .with_validation("tag_id", Validation::scoped_uniqueness(["show_id"])),
        )
        .with_model(
            ModelMetadata::new("Episode")
                .with_column("title", ColumnType::String)
                .with_column("season", ColumnType::Integer)
                .with_column("number", ColumnType::Integer)
                .with_association(Association::belongs_to("show", "Show"))
                .with_validation("title", Validation::length(Some(4), Some(12)))
                .with_validation(
                    "number",
                    Validation::scoped_uniqueness(["show_id", "season"]),
                )
                .with_validation("show", Validation::presence()),
        )
        .with_model(
            ModelMetadata::new("Bookmark")
                .with_association(Association::polymorphic("bookmarkable", ["Show", "Episode"]))
                .with_validation("bookmarkable", Validation::presence()),
        )
        .with_model(
            ModelMetadata::new("Like")
                .with_association(Association::polymorphic("likeable", ["Show", "Episode"])),
        )
        .with_model(
            ModelMetadata::new("User")
                .with_column("email", ColumnType::String)
                .with_column("role", ColumnType::String)
                .with_column("login", ColumnType::String)
                .with_validation("email", Validation::email_format())
                .with_validation("email", Validation::uniqueness())
                .with_validation(
                    "role",
                    Validation::inclusion(vec![
                        serde_json::json!("viewer"),
                        serde_json::json!("admin"),
                    ]),
                )
                .with_validation("login", Validation::length(Some(3), Some(8)))
                .with_validation("login", Validation::uniqueness()),
        )
        .with_model(ModelMetadata::new("PaymentMethod").with_column("label", ColumnType::String))
        .with_model(
            ModelMetadata::new("Subscription")
                .with_column("plan", ColumnType::String)
                .with_association(Association::belongs_to("user", "User"))
                .with_association(Association::belongs_to("payment_method", "PaymentMethod"))
                .with_validation("user", Validation::presence())
                .with_validation(
                    "plan",
                    Validation::inclusion(vec![serde_json::json!("free"), serde_json::json!("paid")]),
                )
                .with_validation(
                    "payment_method",
                    Validation::presence().when(Condition::FieldEquals {
                        field: "plan".to_string(),
                        value: serde_json::json!("paid"),
                    }),
                ),
        )
        .with_model(ModelMetadata::new("Gift").with_column("note", ColumnType::Text))
        .with_model(ModelMetadata::new("Wrapping").with_column("color", ColumnType::String))
        .with_model(
            ModelMetadata::new("Order")
                .with_association(Association::belongs_to("gift", "Gift"))
                .with_association(Association::belongs_to("wrapping", "Wrapping"))
                .with_validation(
                    "wrapping",
                    Validation::presence().when(Condition::FieldPresent {
                        field: "gift_id".to_string(),
                    }),
                ),
        )
        .with_model(
            ModelMetadata::new("Review")
                .with_column("body", ColumnType::Text)
                .with_association(Association::belongs_to("show", "Show")),
        )
        .with_model(
            ModelMetadata::new("Appearance")
                .with_association(Association::belongs_to("episode", "Episode"))
                .with_association(Association::belongs_to("show", "Show"))
                .with_validation("episode", Validation::presence())
                .with_validation("show", Validation::presence()),
        )
}

pub fn base_time() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-03-01T20:00:00", "%Y-%m-%dT%H:%M:%S")
        .expect("base time")
}

/// Sampler over an empty in-memory store with a pinned clock.
pub fn sampler() -> Sampler<InMemoryStore> {
    sampler_for(registry())
}

pub fn sampler_for(registry: ModelRegistry) -> Sampler<InMemoryStore> {
    let options = SamplerOptions {
        base_time: Some(base_time()),
        ..SamplerOptions::default()
    };
    Sampler::new(registry.clone(), InMemoryStore::new(registry))
        .expect("valid registry")
        .with_options(options)
}
