//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{PipelineConfig, ServerVersion, ServerVersionProbe, DISPATCH_BATCH_SIZE};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    sink: String,
    sink_type: String,
    num_workers: usize,
    interval_ms: u64,
    batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_version: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                version: format!("{:?}", config.version),
                sink: config.sink.name.clone(),
                sink_type: format!("{:?}", config.sink.sink_type),
                num_workers: config.dispatch.num_workers,
                interval_ms: config.dispatch.interval_ms,
                batch_size: config.dispatch.batch_size,
                server_version: config.server.version.clone(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &PipelineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    match config.server.version.as_deref() {
        None => warnings.push(
            "server.version is not set - workers will exit without dispatching".to_string(),
        ),
        Some(raw) => {
            // Already validated by the loader
            if let Ok(version) = raw.parse::<ServerVersion>() {
                if version < ServerVersionProbe::MIN_VERSION {
                    warnings.push(format!(
                        "server version {version} does not accept metrics (requires {} or later)",
                        ServerVersionProbe::MIN_VERSION
                    ));
                }
            }
        }
    }

    let batch_size = config.dispatch.batch_size;
    if batch_size == 0 {
        warnings.push("dispatch.batch_size is 0 - each batch takes the whole queue".to_string());
    } else if batch_size > DISPATCH_BATCH_SIZE {
        warnings.push(format!(
            "dispatch.batch_size {batch_size} exceeds the {DISPATCH_BATCH_SIZE} metrics the collection endpoint accepts"
        ));
    }

    if config.dispatch.num_workers > 1 {
        warnings.push(format!(
            "{} workers configured - batches may be delivered out of order",
            config.dispatch.num_workers
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Sink: {} ({})", summary.sink, summary.sink_type);
            println!("  Workers: {}", summary.num_workers);
            println!("  Interval: {} ms", summary.interval_ms);
            println!("  Batch size: {}", summary.batch_size);
            println!(
                "  Server version: {}",
                summary.server_version.as_deref().unwrap_or("(unknown)")
            );
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
