//! Drydock garbage collector daemon.

use anyhow::{Context, Result};
use clap::Parser;
use drydock_core::AppConfig;
use drydock_gc::{Collector, Runner};
use drydock_remote::HttpConnector;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Drydock - worker resource lifecycle and reclamation
#[derive(Parser, Debug)]
#[command(name = "drydock-gcd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "DRYDOCK_CONFIG",
        default_value = "config/drydock.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config: AppConfig = Figment::new()
        .merge(Toml::file(&args.config))
        .merge(Env::prefixed("DRYDOCK_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    let store = drydock_metadata::from_config(&config.metadata)
        .await
        .context("failed to open metadata store")?;

    let connector = Arc::new(HttpConnector::new(config.gc.remote_timeout()));
    let collector = Collector::new(store, connector, config.gc.clone());
    let runner = Runner::new(collector, config.gc.interval());

    tracing::info!(
        interval_secs = config.gc.interval_secs,
        remote_timeout_secs = config.gc.remote_timeout_secs,
        "drydock garbage collector started"
    );

    runner
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    Ok(())
}
