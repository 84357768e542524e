//! Telemetry payload schema and MQTT topic parsing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::CoreError;

/// Telemetry message published by a device.
///
/// `metrics` must be non-empty and every value numeric; anything else is
/// rejected at parse time so the ingest pipeline can drop the message early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPayload {
    /// Sample time (RFC 3339). Absent means "use server wall clock".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// parameter key → numeric reading
    pub metrics: BTreeMap<String, Number>,
}

impl TelemetryPayload {
    /// Parse and validate a raw MQTT payload.
    pub fn parse(payload: &[u8]) -> Result<Self, CoreError> {
        let parsed: TelemetryPayload = serde_json::from_slice(payload)
            .map_err(|e| CoreError::InvalidPayload(e.to_string()))?;

        if parsed.metrics.is_empty() {
            return Err(CoreError::InvalidPayload("metrics cannot be empty".into()));
        }

        Ok(parsed)
    }

    /// Metrics as plain floats, for condition evaluation and point building.
    pub fn metrics_f64(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
            .collect()
    }
}

/// Storage data type for a metric value: `"int"` for integral JSON numbers,
/// `"float"` otherwise.
pub fn metric_data_type(value: &Number) -> &'static str {
    if value.is_i64() || value.is_u64() {
        "int"
    } else {
        "float"
    }
}

/// Build a display name from a parameter key (`"voltage_l1"` → `"Voltage L1"`).
pub fn humanize_key(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse an MQTT topic into `(factory_slug, device_key)`.
///
/// Expected shape: `factories/<slug>/devices/<device_key>/telemetry`.
pub fn parse_topic(topic: &str) -> Result<(String, String), CoreError> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.len() != 5 {
        return Err(CoreError::InvalidTopic(format!(
            "expected 5 segments, got {}: {topic}",
            parts.len()
        )));
    }
    if parts[0] != "factories" {
        return Err(CoreError::InvalidTopic(format!(
            "expected 'factories' prefix, got '{}': {topic}",
            parts[0]
        )));
    }
    if parts[2] != "devices" {
        return Err(CoreError::InvalidTopic(format!(
            "expected 'devices' segment, got '{}': {topic}",
            parts[2]
        )));
    }
    if parts[4] != "telemetry" {
        return Err(CoreError::InvalidTopic(format!(
            "expected 'telemetry' suffix, got '{}': {topic}",
            parts[4]
        )));
    }

    Ok((parts[1].to_string(), parts[3].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_topic() {
        let (slug, key) = parse_topic("factories/vpc/devices/M01/telemetry").unwrap();
        assert_eq!(slug, "vpc");
        assert_eq!(key, "M01");
    }

    #[test]
    fn parse_topic_roundtrip() {
        for (slug, key) in [("vpc", "M01"), ("plant-7", "press_03"), ("a", "b")] {
            let topic = format!("factories/{slug}/devices/{key}/telemetry");
            assert_eq!(
                parse_topic(&topic).unwrap(),
                (slug.to_string(), key.to_string())
            );
        }
    }

    #[test]
    fn parse_topic_wrong_segment_count() {
        assert!(parse_topic("factories/vpc/devices/M01").is_err());
        assert!(parse_topic("factories/vpc/devices/M01/telemetry/extra").is_err());
    }

    #[test]
    fn parse_topic_wrong_segments() {
        assert!(parse_topic("plants/vpc/devices/M01/telemetry").is_err());
        assert!(parse_topic("factories/vpc/machines/M01/telemetry").is_err());
        assert!(parse_topic("factories/vpc/devices/M01/data").is_err());
    }

    #[test]
    fn parse_valid_payload() {
        let payload =
            br#"{"timestamp":"2026-03-01T10:00:00Z","metrics":{"voltage":231.4,"current":3.2}}"#;
        let parsed = TelemetryPayload::parse(payload).unwrap();
        assert_eq!(parsed.metrics.len(), 2);
        assert!(parsed.timestamp.is_some());
        assert_eq!(parsed.metrics_f64()["voltage"], 231.4);
    }

    #[test]
    fn parse_payload_without_timestamp() {
        let parsed = TelemetryPayload::parse(br#"{"metrics":{"torque":12.5}}"#).unwrap();
        assert!(parsed.timestamp.is_none());
    }

    #[test]
    fn reject_invalid_json() {
        assert!(TelemetryPayload::parse(b"not valid json {").is_err());
    }

    #[test]
    fn reject_empty_metrics() {
        assert!(TelemetryPayload::parse(br#"{"metrics":{}}"#).is_err());
    }

    #[test]
    fn reject_non_numeric_metric() {
        assert!(TelemetryPayload::parse(br#"{"metrics":{"voltage":"high"}}"#).is_err());
    }

    #[test]
    fn metric_data_type_detection() {
        let parsed =
            TelemetryPayload::parse(br#"{"metrics":{"cycles":42,"voltage":231.4}}"#).unwrap();
        assert_eq!(metric_data_type(&parsed.metrics["cycles"]), "int");
        assert_eq!(metric_data_type(&parsed.metrics["voltage"]), "float");
    }

    #[test]
    fn humanize_keys() {
        assert_eq!(humanize_key("voltage_l1"), "Voltage L1");
        assert_eq!(humanize_key("power"), "Power");
        assert_eq!(humanize_key("spindle_speed_rpm"), "Spindle Speed Rpm");
    }
}
