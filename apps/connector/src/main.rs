//! # Actindo Connector
//!
//! Replays hub calls against a storefront snapshot.
//!
//! ## Usage
//! ```text
//! actindo-connector <snapshot.json> [--config <connector.toml>] [--save]
//!
//! stdin   one call per line:   {"method": "orders.list", "params": [{}]}
//! stdout  one result per line: {"ok": true, ...} or {"ok": false, "error", "kind"}
//! stderr  logs
//! ```
//!
//! With `--save` the snapshot file is rewritten with the storefront's final
//! state once stdin is exhausted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use actindo_store::MemoryStorefront;
use actindo_sync::{ConnectorConfig, SyncService};

/// One line of input.
#[derive(Debug, Deserialize)]
struct Call {
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug)]
struct Args {
    snapshot: PathBuf,
    config: Option<PathBuf>,
    save: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut snapshot = None;
        let mut config = None;
        let mut save = false;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    config = Some(PathBuf::from(path));
                }
                "--save" => save = true,
                other if other.starts_with("--") => bail!("unknown option {other}"),
                other => snapshot = Some(PathBuf::from(other)),
            }
        }

        let snapshot = snapshot
            .context("usage: actindo-connector <snapshot.json> [--config <path>] [--save]")?;
        Ok(Args { snapshot, config, save })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse()?;
    let config = ConnectorConfig::load_or_default(args.config.clone());
    init_tracing(&config.logging.filter);

    let store = Arc::new(
        MemoryStorefront::load(&args.snapshot)
            .with_context(|| format!("loading {}", args.snapshot.display()))?,
    );
    let service = SyncService::new(store.clone(), config);
    info!(snapshot = %args.snapshot.display(), "Connector ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut calls = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Call>(line) {
            Ok(call) => {
                debug!(method = %call.method, "Call received");
                service.call(&call.method, &call.params).await
            }
            Err(err) => {
                warn!(error = %err, "Malformed call");
                json!({ "ok": false, "error": format!("malformed call: {err}"), "kind": "validation" })
            }
        };
        calls += 1;

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    if args.save {
        let json = store.to_json().await?;
        tokio::fs::write(&args.snapshot, json)
            .await
            .with_context(|| format!("saving {}", args.snapshot.display()))?;
        info!(snapshot = %args.snapshot.display(), "Saved storefront snapshot");
    }

    info!(calls, "Connector finished");
    Ok(())
}

/// Installs the log subscriber on stderr.
///
/// `RUST_LOG` wins over the configured filter (`[logging] filter` or
/// `ACTINDO_LOG`).
fn init_tracing(configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
