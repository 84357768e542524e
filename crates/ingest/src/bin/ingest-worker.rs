//! ingest-worker — MQTT telemetry subscriber and per-message pipeline.
//!
//! Flow: broker message → topic/payload validation → tenant + device
//! resolution (cached) → parameter discovery → time-series batch write →
//! liveness update → rule evaluation enqueue.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use plantops_cache::Cache;
use plantops_core::config::{load_dotenv, Config};
use plantops_ingest::{IngestPipeline, MqttSubscriber};
use plantops_queue::RedisBroker;
use plantops_tsdb::TsdbClient;

/// Telemetry ingest worker.
#[derive(Parser, Debug)]
#[command(name = "ingest-worker", version, about)]
struct Cli {
    /// Override the MQTT client id (distinguishes parallel sessions).
    #[arg(long, env = "MQTT_CLIENT_ID")]
    client_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(client_id) = cli.client_id {
        config.mqtt.client_id = client_id;
    }
    config.log_summary();

    let pool = plantops_db::connect(&config.postgres).await?;
    let cache = Cache::connect(&config.cache).await?;
    let tsdb = TsdbClient::new(&config.influx);
    let broker = RedisBroker::connect(&config.queue).await?;

    let pipeline = Arc::new(IngestPipeline::new(pool, cache, tsdb, broker));
    let subscriber = MqttSubscriber::new(config.mqtt.clone(), pipeline);

    info!("ingest-worker starting");
    tokio::select! {
        _ = subscriber.run() => {}
        _ = shutdown_signal() => {
            info!("shutdown signal received, closing mqtt session");
        }
    }
    info!("ingest-worker exited cleanly");

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
