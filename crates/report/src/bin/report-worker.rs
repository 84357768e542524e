//! report-worker — consumes `generate_report` tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use plantops_core::config::{load_dotenv, Config};
use plantops_queue::{
    GenerateReport, RedisBroker, RetryPolicy, TaskEnvelope, TaskError, TaskHandler, Worker,
    QUEUE_REPORTING, TASK_GENERATE_REPORT,
};
use plantops_report::ReportWorker;
use plantops_storage::ArtifactStore;
use plantops_tsdb::TsdbClient;

/// Report generation worker — PDF, Excel, and JSON artifacts.
#[derive(Parser, Debug)]
#[command(name = "report-worker", version, about)]
struct Cli {
    /// Consumer name (distinguishes processing lists between replicas).
    #[arg(long, env = "REPORT_WORKER_NAME", default_value = "report-worker")]
    name: String,
}

struct ReportTaskHandler {
    worker: ReportWorker,
}

#[async_trait]
impl TaskHandler for ReportTaskHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<(), TaskError> {
        if envelope.task_name != TASK_GENERATE_REPORT {
            return Err(TaskError::Fatal(format!(
                "unexpected task '{}' on reporting queue",
                envelope.task_name
            )));
        }

        let task: GenerateReport = envelope
            .payload()
            .map_err(|e| TaskError::Fatal(e.to_string()))?;

        self.worker.execute(task.report_id).await
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

    let handler = Arc::new(ReportTaskHandler {
        worker: ReportWorker::new(pool, tsdb, store),
    });

    info!("report-worker starting");
    Worker::new(
        &cli.name,
        QUEUE_REPORTING,
        RetryPolicy::fixed(1, Duration::from_secs(60)),
    )
    .run(broker, handler)
    .await?;
    info!("report-worker exited cleanly");

    Ok(())
}
