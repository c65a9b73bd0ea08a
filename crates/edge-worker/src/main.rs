//! Edge Worker Entrypoint
//!
//! Usage: edge-worker serve --root DIR [--config FILE] [--origin URL] [--version N] [--offline]
//!
//! Installs and activates one cache generation over a disk store, then
//! answers JSON envelopes from stdin on stdout, one per line. `--config`
//! reads the `[cache]` section of an edge config file; `--origin` and
//! `--version` override it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use edge_worker::{
    CacheWorker, DiskStorage, HttpNetwork, Network, OfflineNetwork, RpcHandler, SystemClock,
    WorkerConfig,
};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct ServeArgs {
    root: PathBuf,
    config: WorkerConfig,
    offline: bool,
}

fn usage() -> ExitCode {
    eprintln!("Usage: edge-worker serve --root DIR [--config FILE] [--origin URL] [--version N] [--offline]");
    eprintln!();
    eprintln!("Reads one JSON worker envelope per line from stdin and writes one response per line to stdout.");
    ExitCode::FAILURE
}

fn parse_serve_args(args: &[String]) -> Result<ServeArgs, String> {
    let mut root = None;
    let mut config_path: Option<PathBuf> = None;
    let mut origin = None;
    let mut version = None;
    let mut offline = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--root" => root = iter.next().map(PathBuf::from),
            "--config" => {
                config_path = Some(PathBuf::from(iter.next().ok_or("--config needs a value")?));
            }
            "--origin" => {
                origin = Some(iter.next().ok_or("--origin needs a value")?.clone());
            }
            "--version" => {
                let raw = iter.next().ok_or("--version needs a value")?;
                let parsed: u32 = raw
                    .parse()
                    .map_err(|_| format!("invalid --version '{}'", raw))?;
                version = Some(parsed);
            }
            "--offline" => offline = true,
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }

    let root = root.ok_or("--root is required")?;
    let mut config = match config_path.as_deref() {
        Some(path) => load_config(path)?,
        None => WorkerConfig::default(),
    };
    if let Some(origin) = origin {
        config.origin = origin;
    }
    if let Some(version) = version {
        config.version = version;
    }
    Ok(ServeArgs {
        root,
        config,
        offline,
    })
}

fn load_config(path: &Path) -> Result<WorkerConfig, String> {
    WorkerConfig::from_toml_file(path).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args[1] != "serve" {
        return usage();
    }

    let serve = match parse_serve_args(&args[2..]) {
        Ok(serve) => serve,
        Err(e) => {
            eprintln!("{}", e);
            return usage();
        }
    };

    let storage = match DiskStorage::new(&serve.root) {
        Ok(storage) => storage,
        Err(e) => {
            error!("cannot open cache root {}: {}", serve.root.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let network: Arc<dyn Network> = if serve.offline {
        Arc::new(OfflineNetwork)
    } else {
        match HttpNetwork::new() {
            Ok(network) => Arc::new(network),
            Err(e) => {
                error!("cannot build HTTP client: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    let mut worker = match CacheWorker::new(serve.config, Arc::new(storage), network, Arc::new(SystemClock)) {
        Ok(worker) => worker,
        Err(e) => {
            error!("invalid worker configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // A failed install leaves the worker in pass-through mode.
    match worker.install() {
        Ok(_) => {
            if let Err(e) = worker.activate() {
                warn!("activation deferred: {}", e);
            }
        }
        Err(e) => warn!("install failed, serving without cache: {}", e),
    }

    let mut handler = RpcHandler::new(worker);
    if let Err(e) = handler.run() {
        error!("RPC handler error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_without_config() {
        let serve = parse_serve_args(&args(&["--root", "/tmp/edge"])).unwrap();
        assert_eq!(serve.root, PathBuf::from("/tmp/edge"));
        assert_eq!(serve.config, WorkerConfig::default());
        assert!(!serve.offline);
    }

    #[test]
    fn test_config_file_cache_section_applies() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[cache]").unwrap();
        writeln!(file, "version = 5").unwrap();
        writeln!(file, "origin = \"https://petcare.test\"").unwrap();
        writeln!(file, "freshness_window_seconds = 60").unwrap();
        let path = file.path().to_str().unwrap();

        let serve = parse_serve_args(&args(&["--config", path, "--root", "/tmp/edge"])).unwrap();
        assert_eq!(serve.config.version, 5);
        assert_eq!(serve.config.origin, "https://petcare.test");
        assert_eq!(serve.config.freshness_window_seconds, 60);
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[cache]").unwrap();
        writeln!(file, "version = 5").unwrap();
        let path = file.path().to_str().unwrap();

        // Order on the command line does not matter
        let serve = parse_serve_args(&args(&["--version", "7", "--root", "/tmp/edge", "--config", path])).unwrap();
        assert_eq!(serve.config.version, 7);
    }

    #[test]
    fn test_unreadable_config_rejected() {
        let err = parse_serve_args(&args(&["--root", "/tmp/edge", "--config", "/nonexistent/edge.toml"]))
            .unwrap_err();
        assert!(err.contains("/nonexistent/edge.toml"), "{}", err);
    }
}
