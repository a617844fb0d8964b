use anyhow::{bail, Context, Result};
use palisade_core::{logging, Config};
use palisade_trust_mesh::TrustMesh;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config = match parse_config_path(&args)? {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    logging::init_with_filter(&config.node.log_level, config.node.log_format);

    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let mesh = TrustMesh::new(&config);
    let export_path = PathBuf::from(&config.node.export_path);

    let handles = mesh.start()?;
    info!(
        node_id = %config.node.node_id,
        export_path = %export_path.display(),
        "palisade-node started"
    );

    if config.node.export_interval_ms == 0 {
        tokio::signal::ctrl_c().await?;
    } else {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(config.node.export_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => export(&mesh, &export_path),
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
            }
        }
    }

    info!("Shutdown requested");
    mesh.stop();
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Shield pass ended abnormally");
        }
    }

    export(&mesh, &export_path);
    info!("palisade-node stopped");
    Ok(())
}

fn export(mesh: &TrustMesh, path: &Path) {
    if let Err(e) = mesh.export_metrics(path) {
        error!(path = %path.display(), error = %e, "Metrics export failed");
    }
}

/// `--config <path>` is optional; defaults apply without it
fn parse_config_path(args: &[String]) -> Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            bail!("--config was provided without a path");
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_config_path() {
        assert_eq!(
            parse_config_path(&args(&["palisade-node", "--config", "node.toml"])).unwrap(),
            Some(PathBuf::from("node.toml"))
        );
        assert_eq!(parse_config_path(&args(&["palisade-node"])).unwrap(), None);
        assert!(parse_config_path(&args(&["palisade-node", "--config"])).is_err());
    }

    #[test]
    fn test_version_handshake_shape() {
        let handshake = NodeVersionHandshake {
            version: "0.0.0",
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        let value = serde_json::to_value(&handshake).unwrap();
        assert_eq!(value["runtime_version"], 1);
        assert_eq!(value["protocol_version"], 1);
    }
}
