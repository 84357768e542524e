//! Redis list broker: publisher plus per-consumer ack-late consumption.

use std::time::Duration;

use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, Direction};
use tracing::{debug, info, warn};

use plantops_core::config::QueueConfig;

use crate::envelope::TaskEnvelope;
use crate::error::QueueError;

fn processing_key(queue: &str, consumer: &str) -> String {
    format!("{queue}:processing:{consumer}")
}

/// Publishing half of the broker. Clone-cheap; the underlying connection
/// manager reconnects transparently.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = redis::Client::open(config.broker_url.as_str())
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(Self { client, publisher })
    }

    /// Publish a task envelope onto a named queue.
    pub async fn enqueue(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), QueueError> {
        let body =
            serde_json::to_string(envelope).map_err(|e| QueueError::Publish(e.to_string()))?;

        let mut conn = self.publisher.clone();
        conn.lpush::<_, _, ()>(queue, body).await?;

        debug!(queue, task = %envelope.task_name, retries = envelope.retries, "task enqueued");
        Ok(())
    }

    /// Open a dedicated consumer for a queue.
    ///
    /// Blocking reads get their own connection so they never stall the shared
    /// publishing connection.
    pub async fn consumer(
        &self,
        queue: &str,
        consumer_name: &str,
    ) -> Result<QueueConsumer, QueueError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(QueueConsumer {
            conn,
            queue: queue.to_string(),
            processing: processing_key(queue, consumer_name),
        })
    }
}

/// A message moved into the processing list, awaiting ack.
#[derive(Debug)]
pub struct Delivery {
    pub envelope: TaskEnvelope,
    raw: String,
}

/// Single-queue consumer with ack-late semantics.
pub struct QueueConsumer {
    conn: MultiplexedConnection,
    queue: String,
    processing: String,
}

impl QueueConsumer {
    /// Requeue everything left in this consumer's processing list.
    ///
    /// Called on startup: entries here belong to a previous incarnation that
    /// died mid-task, so they must be redelivered.
    pub async fn recover(&mut self) -> Result<usize, QueueError> {
        let pending: Vec<String> = self.conn.lrange(&self.processing, 0, -1).await?;
        let count = pending.len();

        for raw in pending {
            self.conn.rpush::<_, _, ()>(&self.queue, &raw).await?;
            self.conn.lrem::<_, _, ()>(&self.processing, 1, &raw).await?;
        }

        if count > 0 {
            info!(queue = %self.queue, count, "recovered interrupted tasks");
        }
        Ok(count)
    }

    /// Block up to `timeout` for the next task.
    ///
    /// An unparseable body is dropped (removed from the processing list);
    /// a poison message must not wedge the queue.
    pub async fn next(&mut self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let raw: Option<String> = self
            .conn
            .blmove(
                &self.queue,
                &self.processing,
                Direction::Right,
                Direction::Left,
                timeout.as_secs_f64(),
            )
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<TaskEnvelope>(&raw) {
            Ok(envelope) => Ok(Some(Delivery { envelope, raw })),
            Err(e) => {
                warn!(queue = %self.queue, error = %e, "dropping unparseable task body");
                self.conn.lrem::<_, _, ()>(&self.processing, 1, &raw).await?;
                Ok(None)
            }
        }
    }

    /// Acknowledge a finished task, removing it from the processing list.
    pub async fn ack(&mut self, delivery: &Delivery) -> Result<(), QueueError> {
        self.conn
            .lrem::<_, _, ()>(&self.processing, 1, &delivery.raw)
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))?;
        Ok(())
    }

    /// Return a task to the queue for immediate redelivery.
    pub async fn nack(&mut self, delivery: &Delivery) -> Result<(), QueueError> {
        self.conn.rpush::<_, _, ()>(&self.queue, &delivery.raw).await?;
        self.conn
            .lrem::<_, _, ()>(&self.processing, 1, &delivery.raw)
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))?;
        Ok(())
    }
}
