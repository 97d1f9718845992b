mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use fixtura_config::{ConfigError, SamplerConfig};
use fixtura_core::Value;
use fixtura_engine::{
    AttrValue, Attributes, InMemoryStore, SampleError, SampleRequest, Sampler,
};

use common::{base_time, registry, sampler};

fn config(json: serde_json::Value) -> SamplerConfig {
    serde_json::from_value(json).expect("config document")
}

#[test]
fn presets_yield_to_explicit_attributes() {
    let mut sampler = sampler();
    sampler.customize("Show").preset(
        "finale",
        Attributes::from([("status".to_string(), AttrValue::from("ended"))]),
    );

    let ended = sampler
        .sample("Show", SampleRequest::new().preset("finale"))
        .expect("preset show");
    let airing = sampler
        .sample(
            "Show",
            SampleRequest::new().preset("finale").set("status", "airing"),
        )
        .expect("overridden preset");
    let again = sampler
        .sample("Show", SampleRequest::new().preset("finale"))
        .expect("preset show again");

    assert_eq!(ended.get("status"), &Value::from("ended"));
    assert_eq!(airing.get("status"), &Value::from("airing"));
    assert_ne!(airing.id, ended.id);
    assert_eq!(again.id, ended.id);
}

#[test]
fn configured_defaults_fill_gaps() {
    let registry = registry();
    let document = config(serde_json::json!({
        "config_version": "0.1",
        "options": {
            "base_time": "2024-03-01T20:00:00",
            "email_domain": "fixtura.test"
        },
        "models": [
            {
                "model": "Show",
                "defaults": {
                    "status": "ended",
                    "network": { "name": "HBO" }
                }
            }
        ]
    }));
    let mut sampler =
        Sampler::from_config(registry.clone(), InMemoryStore::new(registry), &document)
            .expect("sampler from config");

    let lost = sampler
        .sample("Show", SampleRequest::new().set("name", "Lost"))
        .expect("lost");
    let fringe = sampler
        .sample(
            "Show",
            SampleRequest::new().set("name", "Fringe").set("status", "airing"),
        )
        .expect("fringe");
    let user = sampler.sample("User", SampleRequest::new()).expect("user");

    let networks = sampler.store().records("Network");
    assert_eq!(networks.len(), 1);
    assert_eq!(networks[0].get("name"), &Value::from("HBO"));
    assert_eq!(lost.get("network_id"), &networks[0].id_value());
    assert_eq!(fringe.get("network_id"), &networks[0].id_value());
    assert_eq!(lost.get("status"), &Value::from("ended"));
    assert_eq!(fringe.get("status"), &Value::from("airing"));
    assert_eq!(lost.get("premiered_at"), &Value::DateTime(base_time()));
    assert_eq!(user.get("email"), &Value::from("john.doe.0@fixtura.test"));
}

#[test]
fn configuration_errors_stop_setup() {
    let registry = registry();
    let document = config(serde_json::json!({
        "config_version": "0.1",
        "models": [
            { "model": "Movie", "defaults": { "title": "Heat" } },
            { "model": "Like", "force_on_create": ["likeable"] }
        ]
    }));

    let err = Sampler::from_config(registry.clone(), InMemoryStore::new(registry), &document)
        .err()
        .expect("invalid config");
    match err {
        SampleError::Config(ConfigError::Invalid(report)) => {
            let codes = report.codes();
            assert!(codes.contains(&"unknown_model"));
            assert!(codes.contains(&"force_on_create_not_belongs_to"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lazy_defaults_run_per_record() {
    let mut sampler = sampler();
    let counter = Arc::new(AtomicI64::new(0));
    let shared = Arc::clone(&counter);
    sampler.customize("Review").lazy_default("body", move || {
        AttrValue::from(format!("review {}", shared.fetch_add(1, Ordering::SeqCst)))
    });

    let first = sampler
        .create_sample("Review", SampleRequest::new())
        .expect("first review");
    let second = sampler
        .create_sample("Review", SampleRequest::new())
        .expect("second review");
    let explicit = sampler
        .create_sample("Review", SampleRequest::new().set("body", "fine"))
        .expect("explicit body");

    assert_eq!(first.get("body"), &Value::from("review 0"));
    assert_eq!(second.get("body"), &Value::from("review 1"));
    assert_eq!(explicit.get("body"), &Value::from("fine"));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn forced_associations_resolve_on_first_insert() {
    let mut sampler = sampler();
    sampler.customize("Review").force_on_create("show");

    let review = sampler
        .create_sample("Review", SampleRequest::new())
        .expect("review");

    let shows = sampler.store().records("Show");
    assert_eq!(review.get("show_id"), &shows[0].id_value());
    assert_eq!(sampler.report().model("Review").backfilled, 0);
}

#[test]
fn forced_unique_columns_skip_taken_values() {
    let mut sampler = sampler();
    sampler.customize("Episode").force_unique("title");

    sampler
        .create_sample("Episode", SampleRequest::new().set("title", "aaaa"))
        .expect("explicit title");
    let generated = sampler
        .create_sample("Episode", SampleRequest::new())
        .expect("generated title");

    assert_eq!(generated.get("title"), &Value::from("aaab"));
}

#[test]
fn failing_hooks_abort_creation() {
    let mut sampler = sampler();
    sampler.customize("Tag").before_save(|draft, _, _| {
        Err(SampleError::Hook {
            model: draft.model.clone(),
            message: "tags are frozen".to_string(),
        })
    });

    let err = sampler
        .sample("Tag", SampleRequest::new())
        .expect_err("hook failure");
    assert!(matches!(err, SampleError::Hook { ref model, .. } if model == "Tag"));
    assert!(sampler.store().is_empty("Tag"));
}

#[test]
fn report_counts_every_outcome() {
    let mut sampler = sampler();
    sampler
        .sample("Show", SampleRequest::new().set("name", "Lost"))
        .expect("created");
    sampler
        .sample("Show", SampleRequest::new().set("name", "Lost"))
        .expect("found");
    sampler.sample("Review", SampleRequest::new()).expect("review");

    let report = serde_json::to_value(sampler.report()).expect("report json");
    assert_eq!(report["models"]["Show"]["created"], 1);
    assert_eq!(report["models"]["Show"]["found"], 2);
    assert_eq!(report["models"]["Network"]["created"], 1);
    assert_eq!(report["models"]["Review"]["backfilled"], 1);
    assert_eq!(report["uniqueness_retries"], 0);
    assert!(
        report["session_id"]
            .as_str()
            .is_some_and(|id| !id.is_empty())
    );
}
