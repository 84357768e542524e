//! Queue worker runner: one task at a time, wrapper-driven retries,
//! graceful shutdown on SIGTERM/SIGINT.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::broker::RedisBroker;
use crate::envelope::TaskEnvelope;
use crate::error::QueueError;

const POLL_TIMEOUT: Duration = Duration::from_secs(5);
const CONSUME_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// How a task failed, which decides whether the wrapper retries it.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Permanent: logged and acked without retry (e.g. unmet preconditions).
    #[error("{0}")]
    Fatal(String),

    /// Transient: redelivered per the worker's retry policy.
    #[error("{0}")]
    Retryable(String),
}

/// Handler for one task type family consumed from a queue.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<(), TaskError>;
}

// ── Retry policy ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// `2^attempt` seconds (attempt counts from 0).
    Exponential,
    /// A fixed delay between attempts.
    Fixed(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Max 3 retries at `2^attempt` seconds (rule evaluation, notifications).
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential,
        }
    }

    /// Fixed-delay retries (analytics and report jobs: once after 60 s).
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Delay before redelivering attempt `attempt` (0-based count of
    /// retries already performed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Exponential => Duration::from_secs(2u64.saturating_pow(attempt)),
            Backoff::Fixed(delay) => delay,
        }
    }
}

// ── Worker ──────────────────────────────────────────────────────────

/// A named, single-inflight consumer loop for one queue.
pub struct Worker {
    name: String,
    queue: String,
    policy: RetryPolicy,
}

impl Worker {
    pub fn new(name: &str, queue: &str, policy: RetryPolicy) -> Self {
        Self {
            name: name.to_string(),
            queue: queue.to_string(),
            policy,
        }
    }

    /// Run until SIGTERM/SIGINT. The in-flight task finishes before exit;
    /// anything left unacked is redelivered to the next incarnation.
    pub async fn run(
        &self,
        broker: RedisBroker,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), QueueError> {
        let mut consumer = broker.consumer(&self.queue, &self.name).await?;
        consumer.recover().await?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        info!(worker = %self.name, queue = %self.queue, "worker started");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!(worker = %self.name, "shutdown signal received");
                    break;
                }
                result = consumer.next(POLL_TIMEOUT) => {
                    match result {
                        Ok(Some(delivery)) => {
                            self.process(&broker, &mut consumer, delivery, handler.as_ref())
                                .await;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(worker = %self.name, error = %e, "consume failed, reconnecting");
                            tokio::time::sleep(CONSUME_ERROR_BACKOFF).await;
                            match broker.consumer(&self.queue, &self.name).await {
                                Ok(fresh) => consumer = fresh,
                                Err(e) => {
                                    warn!(worker = %self.name, error = %e, "reconnect failed");
                                }
                            }
                        }
                    }
                }
            }
        }

        info!(worker = %self.name, "worker stopped");
        Ok(())
    }

    async fn process(
        &self,
        broker: &RedisBroker,
        consumer: &mut crate::broker::QueueConsumer,
        delivery: crate::broker::Delivery,
        handler: &dyn TaskHandler,
    ) {
        let task = delivery.envelope.task_name.clone();
        let attempt = delivery.envelope.retries;

        match handler.handle(&delivery.envelope).await {
            Ok(()) => {
                info!(worker = %self.name, task = %task, attempt, "task complete");
            }
            Err(TaskError::Fatal(reason)) => {
                error!(worker = %self.name, task = %task, attempt, reason = %reason, "task failed permanently");
            }
            Err(TaskError::Retryable(reason)) => {
                if attempt < self.policy.max_retries {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        worker = %self.name,
                        task = %task,
                        attempt,
                        delay_secs = delay.as_secs(),
                        reason = %reason,
                        "task failed, scheduling retry"
                    );
                    schedule_retry(broker.clone(), self.queue.clone(), delivery.envelope.next_attempt(), delay);
                } else {
                    error!(
                        worker = %self.name,
                        task = %task,
                        attempt,
                        reason = %reason,
                        "task failed, retries exhausted"
                    );
                }
            }
        }

        // Ack-late: the entry leaves the processing list only once the
        // outcome (including any retry scheduling) is decided.
        if let Err(e) = consumer.ack(&delivery).await {
            warn!(worker = %self.name, task = %task, error = %e, "ack failed");
        }
    }
}

/// Republish an envelope after a delay without blocking the consume loop.
fn schedule_retry(broker: RedisBroker, queue: String, envelope: TaskEnvelope, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = broker.enqueue(&queue, &envelope).await {
            error!(queue = %queue, task = %envelope.task_name, error = %e, "retry enqueue failed");
        }
    });
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicy::exponential(3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(1, Duration::from_secs(60));
        assert_eq!(policy.delay_for(0), Duration::from_secs(60));
        assert_eq!(policy.delay_for(5), Duration::from_secs(60));
    }

    #[test]
    fn exponential_backoff_saturates() {
        let policy = RetryPolicy::exponential(3);
        // Absurd attempt counts must not panic.
        assert!(policy.delay_for(200) > Duration::from_secs(0));
    }
}
