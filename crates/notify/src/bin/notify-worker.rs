//! notify-worker — consumes `send_notifications` tasks and dispatches
//! email / WhatsApp alerts.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use plantops_core::config::{load_dotenv, Config};
use plantops_notify::dispatcher::Dispatcher;
use plantops_notify::email::EmailNotifier;
use plantops_notify::whatsapp::WhatsAppNotifier;
use plantops_notify::NotificationWorker;
use plantops_queue::{
    RedisBroker, RetryPolicy, SendNotifications, TaskEnvelope, TaskError, TaskHandler, Worker,
    QUEUE_NOTIFICATIONS, TASK_SEND_NOTIFICATIONS,
};

/// Notification worker — alert delivery over email and WhatsApp.
#[derive(Parser, Debug)]
#[command(name = "notify-worker", version, about)]
struct Cli {
    /// Consumer name (distinguishes processing lists between replicas).
    #[arg(long, env = "NOTIFY_WORKER_NAME", default_value = "notify-worker")]
    name: String,
}

struct NotifyTaskHandler {
    worker: NotificationWorker,
}

#[async_trait]
impl TaskHandler for NotifyTaskHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<(), TaskError> {
        if envelope.task_name != TASK_SEND_NOTIFICATIONS {
            return Err(TaskError::Fatal(format!(
                "unexpected task '{}' on notifications queue",
                envelope.task_name
            )));
        }

        let task: SendNotifications = envelope
            .payload()
            .map_err(|e| TaskError::Fatal(e.to_string()))?;

        self.worker.execute(task.alert_id, task.channels).await
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

    let email = EmailNotifier::from_config(&config.smtp)?
        .map(|n| Box::new(n) as Box<dyn plantops_notify::Notifier>);
    if email.is_none() {
        info!("smtp not configured, email channel disabled");
    }
    let whatsapp = WhatsAppNotifier::from_config(&config.twilio)
        .map(|n| Box::new(n) as Box<dyn plantops_notify::Notifier>);
    if whatsapp.is_none() {
        info!("twilio not configured, whatsapp channel disabled");
    }

    let handler = Arc::new(NotifyTaskHandler {
        worker: NotificationWorker::new(pool, Dispatcher::new(email, whatsapp)),
    });

    info!("notify-worker starting");
    Worker::new(&cli.name, QUEUE_NOTIFICATIONS, RetryPolicy::exponential(3))
        .run(broker, handler)
        .await?;
    info!("notify-worker exited cleanly");

    Ok(())
}
