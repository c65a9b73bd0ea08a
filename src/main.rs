//! Petcare Edge CLI
//!
//! Entry point for the `petcare-edge` command-line tool.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{mpsc, Arc};

use clap::{Parser, Subcommand};
use edge_protocol::{HttpResponse, InterceptedRequest, Method, ResourceKind};
use edge_worker::{CacheStorage, DiskStorage, StoreNames, SystemClock};
use petcare_edge::config::{host_config_path, project_config_path, EffectiveConfig};
use petcare_edge::messaging::{Channel, DryRunProvider, EndpointRequest, MessagingEndpoint};
use petcare_edge::telemetry::{CacheCleanup, CacheStorageEstimator, Poller, StorageMonitor};
use petcare_edge::{EdgeSettings, Selector};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "petcare-edge")]
#[command(about = "Edge cache, storage telemetry and messaging for the pet-care marketplace", version)]
struct Cli {
    /// Project root holding .petcare/edge.toml
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Override a config value, e.g. --set cache.version=3 (repeatable)
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain which lane a request would take
    Explain {
        /// Request URL or path
        url: String,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Declared destination (script, style, document, image)
        #[arg(long, default_value = "")]
        kind: String,

        /// Output in human-readable format instead of JSON
        #[arg(long)]
        human: bool,
    },

    /// Print the effective configuration with provenance
    Config,

    /// Report storage usage of a disk cache root
    Telemetry {
        /// Cache root directory
        #[arg(long)]
        root: PathBuf,

        /// Storage quota in bytes
        #[arg(long)]
        quota: u64,

        /// Keep polling until Ctrl-C
        #[arg(long)]
        watch: bool,
    },

    /// Handle one messaging request read as JSON from stdin
    Send {
        /// Channel: email, sms or whatsapp
        #[arg(long)]
        channel: String,
    },
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let effective = match load_config(&cli.project, &cli.overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Explain {
            url,
            method,
            kind,
            human,
        } => run_explain(effective.settings(), &url, &method, &kind, human),
        Commands::Config => run_config(&effective),
        Commands::Telemetry { root, quota, watch } => {
            run_telemetry(effective.settings(), &root, quota, watch)
        }
        Commands::Send { channel } => run_send(effective.into_settings(), &channel),
    }
}

fn load_config(project: &Path, overrides: &[String]) -> Result<EffectiveConfig, String> {
    let cli_layer = if overrides.is_empty() {
        None
    } else {
        let mut layer = json!({});
        for item in overrides {
            apply_override(&mut layer, item)?;
        }
        Some(layer)
    };
    let host = host_config_path();
    let project = project_config_path(project);
    EffectiveConfig::build(host.as_deref(), Some(&project), cli_layer).map_err(|e| e.to_string())
}

/// Apply `a.b.c=value` to a JSON object. The value is parsed as JSON when
/// possible, otherwise taken as a string.
fn apply_override(layer: &mut Value, item: &str) -> Result<(), String> {
    let (key, raw) = item
        .split_once('=')
        .ok_or_else(|| format!("override '{}' must be KEY=VALUE", item))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let mut parts: Vec<&str> = key.split('.').collect();
    let last = parts.pop().filter(|k| !k.is_empty()).ok_or("empty override key")?;
    let mut current = layer;
    for part in parts {
        current = current
            .as_object_mut()
            .ok_or("override path crosses a scalar")?
            .entry(part.to_string())
            .or_insert_with(|| json!({}));
    }
    current
        .as_object_mut()
        .ok_or("override path crosses a scalar")?
        .insert(last.to_string(), value);
    Ok(())
}

fn run_explain(settings: &EdgeSettings, url: &str, method: &str, kind: &str, human: bool) {
    let method: Method = match method.parse() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let url = settings.cache.absolute_url(url);
    let request = InterceptedRequest::new(url, method, ResourceKind::from_destination(kind));

    let selector = match Selector::new(&settings.cache.selector) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let selection = selector.select(&request);

    if human {
        println!("{} {}", request.method, request.url);
        println!("  lane:   {}", selection.lane);
        println!("  reason: {}", selection.reason.to_code());
        println!("  {}", selection.explain());
    } else {
        print_json(&json!({
            "request": request,
            "lane": selection.lane,
            "reason": selection.reason.to_code(),
        }));
    }
}

fn run_config(effective: &EffectiveConfig) {
    match effective.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            process::exit(1);
        }
    }
}

fn run_telemetry(settings: &EdgeSettings, root: &Path, quota: u64, watch: bool) {
    let storage: Arc<dyn CacheStorage> = match DiskStorage::new(root) {
        Ok(s) => Arc::new(s.with_quota(quota)),
        Err(e) => {
            eprintln!("Error opening cache root {}: {}", root.display(), e);
            process::exit(1);
        }
    };
    let clock = Arc::new(SystemClock);

    let monitor = match StorageMonitor::new(
        &settings.telemetry,
        Box::new(CacheStorageEstimator::new(Arc::clone(&storage))),
        clock.clone(),
    ) {
        Ok(m) => m.with_storage(Arc::clone(&storage)),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    CacheCleanup::new(
        Arc::clone(&storage),
        StoreNames::for_version(&settings.cache.prefix, settings.cache.version),
        clock,
        settings.telemetry.optimize_max_age(),
    )
    .register(&monitor);

    if !watch {
        match monitor.poll() {
            Some(outcome) => print_json(&outcome),
            None => print_json(&json!({ "available": false })),
        }
        return;
    }

    let monitor = Arc::new(monitor);
    let _printer = monitor.subscribe(|report| {
        if let Ok(line) = serde_json::to_string(report) {
            println!("{}", line);
        }
    });

    let (stop_tx, stop_rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    }) {
        eprintln!("Error setting Ctrl-C handler: {}", e);
        process::exit(1);
    }

    let poller = match Poller::spawn(Arc::clone(&monitor), settings.telemetry.interval()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    info!(interval_seconds = settings.telemetry.interval_seconds, "polling storage; Ctrl-C to stop");
    let _ = stop_rx.recv();
    poller.stop();
}

fn run_send(settings: EdgeSettings, channel: &str) {
    let channel: Channel = match channel.parse() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        eprintln!("Error reading stdin: {}", e);
        process::exit(1);
    }
    let request: EndpointRequest = match serde_json::from_str(&input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: stdin is not a request object: {}", e);
            process::exit(1);
        }
    };

    let endpoint = MessagingEndpoint::new(channel, settings.messaging, Arc::new(DryRunProvider));
    let response = endpoint.handle(&request);
    print_json(&render_response(&response));
    if !response.ok() {
        process::exit(1);
    }
}

fn render_response(response: &HttpResponse) -> Value {
    let body = response
        .json_body()
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).to_string()));
    json!({
        "status": response.status,
        "headers": response.headers,
        "body": body,
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_override_nested() {
        let mut layer = json!({});
        apply_override(&mut layer, "cache.version=3").unwrap();
        apply_override(&mut layer, "cache.origin=https://petcare.test").unwrap();
        apply_override(&mut layer, "messaging.production=true").unwrap();

        assert_eq!(layer["cache"]["version"], 3);
        assert_eq!(layer["cache"]["origin"], "https://petcare.test");
        assert_eq!(layer["messaging"]["production"], true);
    }

    #[test]
    fn test_apply_override_rejects_missing_value() {
        let mut layer = json!({});
        assert!(apply_override(&mut layer, "cache.version").is_err());
    }
}
