use std::env;
use std::path::{Path, PathBuf};

use fixtura_config::{ConfigError, ValidationReport, load_config};
use fixtura_core::ModelRegistry;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut registry_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--registry" => {
                registry_path = args.next().map(PathBuf::from);
            }
            _ => {
                if config_path.is_none() {
                    config_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let config_path = config_path.ok_or("missing config path")?;
    let registry_path = registry_path.ok_or("missing --registry path")?;
    let registry = load_registry(&registry_path)?;

    let validated = match load_config(&config_path, &registry) {
        Ok(validated) => validated,
        Err(ConfigError::Invalid(report)) => {
            eprintln!("config validation failed");
            print_report(&report);
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    if validated.warnings.is_empty() {
        println!("config validated successfully");
    } else {
        eprintln!("config validated with warnings:");
        print_report(&ValidationReport {
            errors: Vec::new(),
            warnings: validated.warnings,
        });
    }

    Ok(())
}

fn load_registry(path: &Path) -> Result<ModelRegistry, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(ModelRegistry::from_json(&contents)?)
}

fn print_report(report: &ValidationReport) {
    for issue in &report.errors {
        eprintln!("error {issue}");
    }
    for issue in &report.warnings {
        eprintln!("warning {issue}");
    }
}
