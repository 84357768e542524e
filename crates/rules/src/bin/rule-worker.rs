//! rule-worker — consumes `evaluate_rules` tasks and produces alerts.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use plantops_core::config::{load_dotenv, Config};
use plantops_queue::{
    EvaluateRules, RedisBroker, RetryPolicy, TaskEnvelope, TaskError, TaskHandler, Worker,
    QUEUE_RULE_ENGINE, TASK_EVALUATE_RULES,
};
use plantops_rules::RuleEngine;

/// Rule evaluation worker — schedule/cooldown gates, condition trees, alerts.
#[derive(Parser, Debug)]
#[command(name = "rule-worker", version, about)]
struct Cli {
    /// Consumer name (distinguishes processing lists between replicas).
    #[arg(long, env = "RULE_WORKER_NAME", default_value = "rule-worker")]
    name: String,
}

struct RuleTaskHandler {
    engine: RuleEngine,
}

#[async_trait]
impl TaskHandler for RuleTaskHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<(), TaskError> {
        if envelope.task_name != TASK_EVALUATE_RULES {
            return Err(TaskError::Fatal(format!(
                "unexpected task '{}' on rule_engine queue",
                envelope.task_name
            )));
        }

        let job: EvaluateRules = envelope
            .payload()
            .map_err(|e| TaskError::Fatal(e.to_string()))?;

        self.engine
            .evaluate_job(&job)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))
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
    let broker = RedisBroker::connect(&config.queue).await?;

    let handler = Arc::new(RuleTaskHandler {
        engine: RuleEngine::new(pool, broker.clone(), config.default_timezone.clone()),
    });

    info!("rule-worker starting");
    Worker::new(&cli.name, QUEUE_RULE_ENGINE, RetryPolicy::exponential(3))
        .run(broker, handler)
        .await?;
    info!("rule-worker exited cleanly");

    Ok(())
}
