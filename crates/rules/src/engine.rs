//! Per-job rule evaluation: schedule gate, cooldown gate, condition
//! evaluation, alert emission, notification hand-off.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::Duration;
use chrono_tz::Tz;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, warn};

use plantops_db::models::Rule;
use plantops_db::repo;
use plantops_db::DbError;
use plantops_queue::{
    EvaluateRules, QueueError, RedisBroker, SendNotifications, TaskEnvelope,
    QUEUE_NOTIFICATIONS, TASK_SEND_NOTIFICATIONS,
};

use crate::condition::{build_alert_message, evaluate, Condition};
use crate::schedule::is_scheduled;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct RuleEngine {
    pool: PgPool,
    broker: RedisBroker,
    default_timezone: String,
    /// Rules already warned about for malformed schedule config, so the
    /// fail-open path logs once per rule per process.
    warned_schedules: Mutex<HashSet<i64>>,
}

impl RuleEngine {
    pub fn new(pool: PgPool, broker: RedisBroker, default_timezone: String) -> Self {
        Self {
            pool,
            broker,
            default_timezone,
            warned_schedules: Mutex::new(HashSet::new()),
        }
    }

    /// Evaluate all active rules for the job's device against its metrics.
    ///
    /// Rules fire independently: a failure in one logs and moves on to the
    /// next. Only job-level failures (rule lookup) propagate to the retry
    /// layer.
    pub async fn evaluate_job(&self, job: &EvaluateRules) -> Result<(), EngineError> {
        let rules = repo::rule::active_for_device(&self.pool, job.factory_id, job.device_id).await?;
        let tz = self.tenant_timezone(job.factory_id).await;

        for rule in &rules {
            if let Err(e) = self.evaluate_rule(rule, job, tz).await {
                error!(
                    factory_id = job.factory_id,
                    device_id = job.device_id,
                    rule_id = rule.id,
                    error = %e,
                    "rule evaluation error"
                );
            }
        }

        Ok(())
    }

    async fn evaluate_rule(
        &self,
        rule: &Rule,
        job: &EvaluateRules,
        tz: Tz,
    ) -> Result<(), EngineError> {
        // Schedule gate; malformed config admits (fail-open), warned once.
        match is_scheduled(&rule.schedule_type, rule.schedule_config.as_ref(), job.timestamp, tz) {
            Ok(false) => return Ok(()),
            Ok(true) => {}
            Err(reason) => {
                let mut warned = self.warned_schedules.lock().unwrap();
                if warned.insert(rule.id) {
                    warn!(rule_id = rule.id, reason = %reason, "malformed schedule config, admitting");
                }
            }
        }

        // Cooldown gate.
        if let Some(last_triggered) =
            repo::alert::get_cooldown(&self.pool, rule.id, job.device_id).await?
        {
            if in_cooldown(last_triggered, job.timestamp, rule.cooldown_minutes) {
                return Ok(());
            }
        }

        // Condition evaluation; an unparseable tree evaluates to false.
        let condition: Condition = match serde_json::from_value(rule.conditions.clone()) {
            Ok(condition) => condition,
            Err(e) => {
                warn!(rule_id = rule.id, error = %e, "unparseable condition tree");
                return Ok(());
            }
        };
        if !evaluate(&condition, &job.metrics) {
            return Ok(());
        }

        // Emit: alert row (severity copied from the rule), cooldown upsert,
        // notification task.
        let message = build_alert_message(&rule.name, &condition, &job.metrics);
        let snapshot = serde_json::to_value(&job.metrics).unwrap_or_default();

        let alert_id = repo::alert::insert(
            &self.pool,
            job.factory_id,
            rule.id,
            job.device_id,
            job.timestamp,
            &rule.severity,
            &message,
            &snapshot,
        )
        .await?;

        repo::alert::upsert_cooldown(&self.pool, rule.id, job.device_id, job.timestamp).await?;

        let notification = SendNotifications {
            alert_id,
            channels: rule.channels(),
        };
        let envelope = TaskEnvelope::new(TASK_SEND_NOTIFICATIONS, &notification)?;
        self.broker.enqueue(QUEUE_NOTIFICATIONS, &envelope).await?;

        info!(
            factory_id = job.factory_id,
            device_id = job.device_id,
            rule_id = rule.id,
            alert_id,
            severity = %rule.severity,
            "alert triggered"
        );

        Ok(())
    }

    /// The tenant timezone, falling back to the configured default and then
    /// UTC; a bad timezone must not stop evaluation.
    async fn tenant_timezone(&self, factory_id: i64) -> Tz {
        let name = match repo::factory::get_by_id(&self.pool, factory_id).await {
            Ok(Some(factory)) => factory.timezone,
            Ok(None) | Err(_) => self.default_timezone.clone(),
        };

        Tz::from_str(&name).unwrap_or_else(|_| {
            warn!(timezone = %name, "unknown timezone, falling back to UTC");
            chrono_tz::UTC
        })
    }
}

/// True while a previous fire at `last_triggered` still suppresses alerts
/// at `timestamp`.
fn in_cooldown(
    last_triggered: chrono::DateTime<chrono::Utc>,
    timestamp: chrono::DateTime<chrono::Utc>,
    cooldown_minutes: i32,
) -> bool {
    timestamp - last_triggered < Duration::minutes(i64::from(cooldown_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn cooldown_suppresses_within_window() {
        let fired = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

        // 10 minutes later: still suppressed by a 15-minute cooldown.
        assert!(in_cooldown(fired, fired + Duration::minutes(10), 15));
        // 16 minutes later: admitted again.
        assert!(!in_cooldown(fired, fired + Duration::minutes(16), 15));
        // Exactly at the boundary: no longer suppressed.
        assert!(!in_cooldown(fired, fired + Duration::minutes(15), 15));
    }

    #[test]
    fn cooldown_tolerates_out_of_order_timestamps() {
        let fired = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        // A sample older than the last fire is still inside the window.
        assert!(in_cooldown(fired, fired - Duration::minutes(5), 15));
    }
}
