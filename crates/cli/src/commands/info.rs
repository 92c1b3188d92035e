//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{CapabilityProbe, PipelineConfig, ServerVersion, ServerVersionProbe, SinkType};
use dispatcher::sinks::HttpSinkConfig;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    dispatch: DispatchInfo,
    sink: SinkInfo,
    server: ServerInfo,
}

#[derive(Serialize)]
struct DispatchInfo {
    num_workers: usize,
    interval_ms: u64,
    batch_size: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
}

#[derive(Serialize)]
struct ServerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    dispatch_supported: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &PipelineConfig) -> ConfigInfo {
    let version = config
        .server
        .version
        .as_deref()
        .and_then(|v| v.parse::<ServerVersion>().ok());

    let endpoint = match (config.sink.sink_type, config.server.base_url.as_deref()) {
        (SinkType::Http, Some(base)) => HttpSinkConfig::from_params(base, &config.sink.params)
            .ok()
            .map(|c| c.endpoint()),
        _ => None,
    };

    ConfigInfo {
        version: format!("{:?}", config.version),
        dispatch: DispatchInfo {
            num_workers: config.dispatch.num_workers,
            interval_ms: config.dispatch.interval_ms,
            batch_size: config.dispatch.batch_size,
        },
        sink: SinkInfo {
            name: config.sink.name.clone(),
            sink_type: format!("{:?}", config.sink.sink_type),
            params: config
                .sink
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            endpoint,
        },
        server: ServerInfo {
            base_url: config.server.base_url.clone(),
            version: config.server.version.clone(),
            dispatch_supported: ServerVersionProbe::new(version).is_supported(),
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Telemetry Relay Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Dispatch");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Workers: {}", info.dispatch.num_workers);
    println!("   ├─ Interval: {} ms", info.dispatch.interval_ms);
    if info.dispatch.batch_size == 0 {
        println!("   └─ Batch size: unbounded");
    } else {
        println!("   └─ Batch size: {}", info.dispatch.batch_size);
    }

    println!("\n📤 Sink");
    println!("   ├─ Name: {}", info.sink.name);
    match info.sink.endpoint {
        Some(ref endpoint) => {
            println!("   ├─ Type: {}", info.sink.sink_type);
            println!("   └─ Endpoint: {}", endpoint);
        }
        None if info.sink.params.is_empty() => {
            println!("   └─ Type: {}", info.sink.sink_type);
        }
        None => {
            println!("   ├─ Type: {}", info.sink.sink_type);
            let last = info.sink.params.len() - 1;
            for (i, (key, value)) in info.sink.params.iter().enumerate() {
                let prefix = if i == last { "└─" } else { "├─" };
                println!("   {} {} = {}", prefix, key, value);
            }
        }
    }

    println!("\n🌐 Server");
    println!(
        "   ├─ Base URL: {}",
        info.server.base_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "   ├─ Version: {}",
        info.server.version.as_deref().unwrap_or("(unknown)")
    );
    println!(
        "   └─ Dispatch: {}",
        if info.server.dispatch_supported {
            "supported"
        } else {
            "unsupported"
        }
    );

    println!();
}
