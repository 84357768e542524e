//! Notification job execution: load the alert with its relations, fan out,
//! record completion.

use sqlx::PgPool;
use tracing::{info, warn};

use plantops_core::types::NotificationChannels;
use plantops_db::repo;
use plantops_queue::TaskError;

use crate::dispatcher::Dispatcher;
use crate::traits::AlertMessage;

pub struct NotificationWorker {
    pool: PgPool,
    dispatcher: Dispatcher,
}

impl NotificationWorker {
    pub fn new(pool: PgPool, dispatcher: Dispatcher) -> Self {
        Self { pool, dispatcher }
    }

    pub async fn execute(
        &self,
        alert_id: i64,
        channels: NotificationChannels,
    ) -> Result<(), TaskError> {
        let context = repo::alert::get_context(&self.pool, alert_id)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?;

        let Some(context) = context else {
            // Nothing to deliver and nothing to retry against.
            warn!(alert_id, "alert not found, dropping notification task");
            return Ok(());
        };

        let users = repo::user::active_for_factory(&self.pool, context.factory_id)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?;

        let alert = AlertMessage::from_context(&context);
        let summary = self.dispatcher.dispatch(&alert, channels, &users).await;

        repo::alert::mark_notification_sent(&self.pool, alert_id)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?;

        info!(
            alert_id,
            user_count = users.len(),
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            "notifications completed"
        );

        Ok(())
    }
}
