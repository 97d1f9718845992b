use std::env;
use std::path::PathBuf;

use fixtura_config::{ConfigError, load_config};
use fixtura_core::ModelRegistry;
use fixtura_engine::logging::init_logging;
use fixtura_engine::{InMemoryStore, SampleRequest, Sampler};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    let mut args = env::args().skip(1);
    let mut registry_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut model: Option<String> = None;
    let mut count = 1_usize;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--registry" => registry_path = args.next().map(PathBuf::from),
            "--config" => config_path = args.next().map(PathBuf::from),
            "--count" => {
                count = args.next().ok_or("missing --count value")?.parse()?;
            }
            _ => {
                if model.is_none() {
                    model = Some(arg);
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let model = model.ok_or("missing model name")?;
    let registry_path = registry_path.ok_or("missing --registry path")?;
    let registry = ModelRegistry::from_json(&std::fs::read_to_string(&registry_path)?)?;
    let store = InMemoryStore::new(registry.clone());

    let mut sampler = match config_path {
        Some(path) => {
            let validated = match load_config(&path, &registry) {
                Ok(validated) => validated,
                Err(ConfigError::Invalid(report)) => {
                    for issue in &report.errors {
                        eprintln!("error {issue}");
                    }
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            };
            Sampler::from_config(registry, store, &validated.config)?
        }
        None => Sampler::new(registry, store)?,
    };

    for _ in 0..count {
        let record = sampler.create_sample(&model, SampleRequest::new())?;
        println!("{}", serde_json::to_string(&record)?);
    }
    println!("{}", serde_json::to_string_pretty(sampler.report())?);
    Ok(())
}
