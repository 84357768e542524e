//! Notifier trait definition and shared error types.

use chrono::{DateTime, Utc};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Presentation context for one fired alert, joined with its rule and
/// device.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlertMessage {
    pub alert_id: i64,
    pub rule_name: String,
    pub device_name: String,
    pub severity: String,
    pub triggered_at: DateTime<Utc>,
    pub message: String,
    pub telemetry_snapshot: serde_json::Value,
}

impl AlertMessage {
    pub fn from_context(context: &plantops_db::models::AlertContext) -> Self {
        Self {
            alert_id: context.id,
            rule_name: context
                .rule_name
                .clone()
                .unwrap_or_else(|| "Unknown rule".to_string()),
            device_name: context
                .device_name
                .clone()
                .or_else(|| context.device_key.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            severity: context.severity.clone(),
            triggered_at: context.triggered_at,
            message: context.message.clone().unwrap_or_default(),
            telemetry_snapshot: context
                .telemetry_snapshot
                .clone()
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert to one recipient (an address in the channel's own
    /// addressing scheme: email address, phone number).
    async fn send(&self, recipient: &str, alert: &AlertMessage) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g. "email", "whatsapp").
    fn channel_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use plantops_db::models::AlertContext;

    #[test]
    fn alert_message_falls_back_to_device_key() {
        let context = AlertContext {
            id: 1,
            factory_id: 1,
            rule_id: 2,
            device_id: 3,
            triggered_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            severity: "high".to_string(),
            message: Some("[R] voltage (245) gt 240".to_string()),
            telemetry_snapshot: None,
            rule_name: Some("R".to_string()),
            device_name: None,
            device_key: Some("M01".to_string()),
        };

        let message = AlertMessage::from_context(&context);
        assert_eq!(message.device_name, "M01");
        assert_eq!(message.rule_name, "R");
        assert!(message.telemetry_snapshot.is_null());
    }
}
