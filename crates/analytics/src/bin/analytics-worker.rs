//! analytics-worker — consumes `run_analytics_job` tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use plantops_analytics::AnalyticsWorker;
use plantops_core::config::{load_dotenv, Config};
use plantops_queue::{
    RedisBroker, RetryPolicy, RunAnalyticsJob, TaskEnvelope, TaskError, TaskHandler, Worker,
    QUEUE_ANALYTICS, TASK_RUN_ANALYTICS_JOB,
};
use plantops_storage::ArtifactStore;
use plantops_tsdb::TsdbClient;

/// Analytics worker — anomaly detection, failure risk, energy forecasting.
#[derive(Parser, Debug)]
#[command(name = "analytics-worker", version, about)]
struct Cli {
    /// Consumer name (distinguishes processing lists between replicas).
    #[arg(long, env = "ANALYTICS_WORKER_NAME", default_value = "analytics-worker")]
    name: String,
}

struct AnalyticsTaskHandler {
    worker: AnalyticsWorker,
}

#[async_trait]
impl TaskHandler for AnalyticsTaskHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<(), TaskError> {
        if envelope.task_name != TASK_RUN_ANALYTICS_JOB {
            return Err(TaskError::Fatal(format!(
                "unexpected task '{}' on analytics queue",
                envelope.task_name
            )));
        }

        let task: RunAnalyticsJob = envelope
            .payload()
            .map_err(|e| TaskError::Fatal(e.to_string()))?;

        self.worker.execute(task.job_id).await
    }
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
    let config = Config::from_env();
    config.log_summary();

    let pool = plantops_db::connect(&config.postgres).await?;
    let tsdb = TsdbClient::new(&config.influx);
    let store = ArtifactStore::new(&config.object_store)?;
    let broker = RedisBroker::connect(&config.queue).await?;

    let handler = Arc::new(AnalyticsTaskHandler {
        worker: AnalyticsWorker::new(pool, tsdb, store),
    });

    info!("analytics-worker starting");
    Worker::new(
        &cli.name,
        QUEUE_ANALYTICS,
        RetryPolicy::fixed(1, Duration::from_secs(60)),
    )
    .run(broker, handler)
    .await?;
    info!("analytics-worker exited cleanly");

    Ok(())
}
