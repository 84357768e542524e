//! JSON task envelopes and typed task payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use plantops_core::types::NotificationChannels;

use crate::error::QueueError;

/// The wire format of a queued task: `{task_name, args, kwargs}` plus the
/// delivery attempt counter maintained by the retry wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Value,
    /// How many times this task has been retried (0 on first delivery).
    #[serde(default)]
    pub retries: u32,
}

impl TaskEnvelope {
    /// Wrap a typed payload as keyword arguments.
    pub fn new<T: Serialize>(task_name: &str, payload: &T) -> Result<Self, QueueError> {
        Ok(Self {
            task_name: task_name.to_string(),
            args: Vec::new(),
            kwargs: serde_json::to_value(payload).map_err(|e| QueueError::Parse(e.to_string()))?,
            retries: 0,
        })
    }

    /// Decode the keyword arguments back into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, QueueError> {
        serde_json::from_value(self.kwargs.clone()).map_err(|e| {
            QueueError::Parse(format!("task '{}' kwargs: {e}", self.task_name))
        })
    }

    /// Copy for redelivery with the attempt counter bumped.
    pub fn next_attempt(&self) -> Self {
        let mut next = self.clone();
        next.retries += 1;
        next
    }
}

// ── Task payloads ───────────────────────────────────────────────────

/// Rule evaluation for one telemetry sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRules {
    pub factory_id: i64,
    pub device_id: i64,
    pub metrics: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAnalyticsJob {
    pub job_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReport {
    pub report_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotifications {
    pub alert_id: i64,
    pub channels: NotificationChannels,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let payload = EvaluateRules {
            factory_id: 1,
            device_id: 42,
            metrics: BTreeMap::from([("voltage".to_string(), 231.4)]),
            timestamp: Utc::now(),
        };

        let envelope = TaskEnvelope::new(crate::TASK_EVALUATE_RULES, &payload).unwrap();
        let json = serde_json::to_string(&envelope).unwrap();
        let decoded: TaskEnvelope = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.task_name, "evaluate_rules");
        assert_eq!(decoded.retries, 0);

        let back: EvaluateRules = decoded.payload().unwrap();
        assert_eq!(back.device_id, 42);
        assert_eq!(back.metrics["voltage"], 231.4);
    }

    #[test]
    fn envelope_tolerates_missing_optional_fields() {
        let decoded: TaskEnvelope =
            serde_json::from_str(r#"{"task_name":"send_notifications","kwargs":{"alert_id":7,"channels":{"email":true}}}"#)
                .unwrap();

        assert!(decoded.args.is_empty());
        assert_eq!(decoded.retries, 0);

        let payload: SendNotifications = decoded.payload().unwrap();
        assert_eq!(payload.alert_id, 7);
        assert!(payload.channels.email);
        assert!(!payload.channels.whatsapp);
    }

    #[test]
    fn next_attempt_bumps_counter() {
        let envelope = TaskEnvelope::new(crate::TASK_RUN_ANALYTICS_JOB, &RunAnalyticsJob {
            job_id: Uuid::new_v4(),
        })
        .unwrap();

        assert_eq!(envelope.next_attempt().retries, 1);
        assert_eq!(envelope.next_attempt().next_attempt().retries, 2);
    }

    #[test]
    fn payload_type_mismatch_is_an_error() {
        let envelope = TaskEnvelope::new(crate::TASK_GENERATE_REPORT, &GenerateReport {
            report_id: Uuid::new_v4(),
        })
        .unwrap();

        let result: Result<EvaluateRules, _> = envelope.payload();
        assert!(result.is_err());
    }
}
