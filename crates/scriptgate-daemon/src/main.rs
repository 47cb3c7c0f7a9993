//! scriptgate-daemon - signature-gated script execution gateway.
//!
//! Startup order matters: configuration, then the trust store, then the
//! listener. The trust store is built completely before the first
//! connection is accepted and is never mutated afterward; an unreadable
//! certificate directory is fatal, an individual malformed certificate is
//! skipped with a warning.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use scriptgate_core::config::ScriptgateConfig;
use scriptgate_core::runner::BashRunner;
use scriptgate_core::trust::{DirectoryCertificateSource, TrustStore};
use scriptgate_daemon::server::Gateway;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// scriptgate daemon - signed script execution gateway
#[derive(Parser, Debug)]
#[command(name = "scriptgate-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "scriptgate.toml")]
    config: PathBuf,

    /// Override the TCP listen address
    #[arg(long)]
    listen_addr: Option<SocketAddr>,

    /// Override the certificate directory
    #[arg(long)]
    cert_dir: Option<PathBuf>,

    /// Override the worker pool size
    #[arg(long)]
    workers: Option<usize>,

    /// Override the pending-request queue capacity
    #[arg(long)]
    queue_capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = if args.config.exists() {
        ScriptgateConfig::from_file(&args.config)
            .with_context(|| format!("failed to load {}", args.config.display()))?
    } else {
        debug!(path = %args.config.display(), "no configuration file; using defaults");
        ScriptgateConfig::default()
    };

    if let Some(listen_addr) = args.listen_addr {
        config.gateway.listen_addr = listen_addr;
    }
    if let Some(cert_dir) = args.cert_dir {
        config.gateway.cert_dir = cert_dir;
    }
    if let Some(workers) = args.workers {
        config.gateway.workers = workers;
    }
    if let Some(queue_capacity) = args.queue_capacity {
        config.gateway.queue_capacity = queue_capacity;
    }
    config.gateway.validate().context("invalid configuration")?;

    let source = DirectoryCertificateSource::new(&config.gateway.cert_dir);
    let trust = TrustStore::load(&source).with_context(|| {
        format!(
            "failed to load trust store from {}",
            config.gateway.cert_dir.display()
        )
    })?;
    info!(
        cert_dir = %config.gateway.cert_dir.display(),
        keys = trust.len(),
        signing_keys = trust.signing_key_count(),
        "trust store loaded"
    );

    let gateway = Gateway::new(config.gateway, trust, Arc::new(BashRunner::new()));
    let listener = gateway.bind().await.context("failed to bind listener")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
        let _ = shutdown_tx.send(true);
    });

    gateway.serve(listener, shutdown_rx).await;

    Ok(())
}
