//! The per-message ingest pipeline.
//!
//! Every stage is wrapped: a bad message is logged and dropped, never
//! propagated, because the subscriber must stay alive and keep consuming. Liveness
//! updates and rule dispatch are best-effort because the sample itself is
//! already persisted by then.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info, warn};

use plantops_cache::Cache;
use plantops_core::telemetry::{humanize_key, metric_data_type, parse_topic, TelemetryPayload};
use plantops_queue::{EvaluateRules, RedisBroker, TaskEnvelope, QUEUE_RULE_ENGINE, TASK_EVALUATE_RULES};
use plantops_tsdb::{Point, TsdbClient, MEASUREMENT};

use crate::lookup;

pub struct IngestPipeline {
    pool: PgPool,
    cache: Cache,
    tsdb: TsdbClient,
    broker: RedisBroker,
}

impl IngestPipeline {
    pub fn new(pool: PgPool, cache: Cache, tsdb: TsdbClient, broker: RedisBroker) -> Self {
        Self {
            pool,
            cache,
            tsdb,
            broker,
        }
    }

    /// Process one broker message. Infallible by contract: all errors are
    /// logged with context and the message is dropped.
    pub async fn process_message(&self, topic: &str, payload: &[u8]) {
        // 1. Topic → (factory slug, device key).
        let (factory_slug, device_key) = match parse_topic(topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(topic, reason = "invalid_topic", error = %e, "dropping message");
                return;
            }
        };

        // 2. Payload validation.
        let data = match TelemetryPayload::parse(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!(topic, reason = "invalid_payload", error = %e, "dropping message");
                return;
            }
        };
        let timestamp = data.timestamp.unwrap_or_else(Utc::now);

        // 3. Tenant lookup; unknown tenants are dropped.
        let factory = match lookup::factory_by_slug(&self.cache, &self.pool, &factory_slug).await {
            Ok(Some(factory)) => factory,
            Ok(None) => {
                warn!(slug = %factory_slug, topic, reason = "unknown_factory", "dropping message");
                return;
            }
            Err(e) => {
                error!(slug = %factory_slug, error = %e, "factory lookup failed, dropping message");
                return;
            }
        };

        // 4. Device resolve-or-register.
        let device =
            match lookup::resolve_device(&self.cache, &self.pool, factory.id, &device_key).await {
                Ok(device) => device,
                Err(e) => {
                    error!(
                        factory_id = factory.id,
                        device_key = %device_key,
                        error = %e,
                        "device resolution failed, dropping message"
                    );
                    return;
                }
            };

        // 5. Parameter discovery (idempotent per key).
        self.discover_parameters(factory.id, device.id, &data).await;

        // 6. One point per metric into the time-series store. A write
        // failure loses this sample but must not stall the stream.
        let metrics = data.metrics_f64();
        let points: Vec<Point> = metrics
            .iter()
            .map(|(parameter, value)| {
                Point::new(MEASUREMENT)
                    .tag("factory_id", &factory.id.to_string())
                    .tag("device_id", &device.id.to_string())
                    .tag("parameter", parameter)
                    .field("value", *value)
                    .time(timestamp)
            })
            .collect();

        if let Err(e) = self.tsdb.write_batch(&points).await {
            error!(
                factory_id = factory.id,
                device_id = device.id,
                point_count = points.len(),
                error = %e,
                "time-series write failed"
            );
        }

        // 7. Device liveness (best-effort, never rewinds).
        if let Err(e) =
            plantops_db::repo::device::touch_last_seen(&self.pool, device.id, timestamp).await
        {
            warn!(device_id = device.id, error = %e, "last_seen update failed");
        }

        // 8. Rule evaluation hand-off (best-effort).
        let job = EvaluateRules {
            factory_id: factory.id,
            device_id: device.id,
            metrics,
            timestamp,
        };
        match TaskEnvelope::new(TASK_EVALUATE_RULES, &job) {
            Ok(envelope) => {
                if let Err(e) = self.broker.enqueue(QUEUE_RULE_ENGINE, &envelope).await {
                    warn!(factory_id = factory.id, device_id = device.id, error = %e, "rule dispatch failed");
                }
            }
            Err(e) => {
                warn!(factory_id = factory.id, error = %e, "rule dispatch failed");
            }
        }

        info!(
            factory_id = factory.id,
            device_id = device.id,
            factory_slug = %factory_slug,
            device_key = %device_key,
            metric_count = data.metrics.len(),
            "telemetry processed"
        );
    }

    /// Upsert a parameter row for every metric key; newly discovered
    /// channels are logged. Failures only cost metadata, not the sample.
    async fn discover_parameters(&self, factory_id: i64, device_id: i64, data: &TelemetryPayload) {
        for (key, value) in &data.metrics {
            let display_name = humanize_key(key);
            let data_type = metric_data_type(value);

            match plantops_db::repo::parameter::upsert(
                &self.pool,
                factory_id,
                device_id,
                key,
                &display_name,
                data_type,
            )
            .await
            {
                Ok(true) => {
                    info!(
                        factory_id,
                        device_id,
                        parameter = %key,
                        data_type,
                        "parameter discovered"
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        factory_id,
                        device_id,
                        parameter = %key,
                        error = %e,
                        "parameter upsert failed"
                    );
                }
            }
        }
    }
}
