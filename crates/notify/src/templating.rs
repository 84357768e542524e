//! Notification body templates (minijinja).

use minijinja::{context, Environment};

use crate::traits::{AlertMessage, NotifyError};

const EMAIL_BODY: &str = "\
PlantOps Alert Notification

Rule: {{ rule_name }}
Device: {{ device_name }}
Severity: {{ severity }}
Time: {{ triggered_at }}

{{ message }}

Telemetry Snapshot:
{{ snapshot }}

---
This is an automated alert from PlantOps.
";

const WHATSAPP_BODY: &str = "\
PlantOps Alert [{{ severity }}]
Rule: {{ rule_name }}
Device: {{ device_name }}
{{ message }}";

/// Subject line for alert emails.
pub fn email_subject(alert: &AlertMessage) -> String {
    format!(
        "[{}] PlantOps Alert - {}",
        alert.severity.to_uppercase(),
        alert.rule_name
    )
}

pub fn render_email_body(alert: &AlertMessage) -> Result<String, NotifyError> {
    render(EMAIL_BODY, alert)
}

pub fn render_whatsapp_body(alert: &AlertMessage) -> Result<String, NotifyError> {
    render(WHATSAPP_BODY, alert)
}

fn render(template: &str, alert: &AlertMessage) -> Result<String, NotifyError> {
    let mut env = Environment::new();
    env.add_template("body", template)
        .map_err(|e| NotifyError::Template(e.to_string()))?;

    env.get_template("body")
        .map_err(|e| NotifyError::Template(e.to_string()))?
        .render(context! {
            rule_name => alert.rule_name,
            device_name => alert.device_name,
            severity => alert.severity.to_uppercase(),
            triggered_at => alert.triggered_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            message => alert.message,
            snapshot => alert.telemetry_snapshot.to_string(),
        })
        .map_err(|e| NotifyError::Template(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn alert() -> AlertMessage {
        AlertMessage {
            alert_id: 9,
            rule_name: "High Voltage".to_string(),
            device_name: "Press 3".to_string(),
            severity: "critical".to_string(),
            triggered_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            message: "[High Voltage] voltage (245) gt 240".to_string(),
            telemetry_snapshot: serde_json::json!({"voltage": 245.0}),
        }
    }

    #[test]
    fn subject_carries_severity_and_rule() {
        assert_eq!(
            email_subject(&alert()),
            "[CRITICAL] PlantOps Alert - High Voltage"
        );
    }

    #[test]
    fn email_body_renders_all_fields() {
        let body = render_email_body(&alert()).unwrap();
        assert!(body.contains("Rule: High Voltage"));
        assert!(body.contains("Device: Press 3"));
        assert!(body.contains("Severity: CRITICAL"));
        assert!(body.contains("voltage (245) gt 240"));
        assert!(body.contains("245.0") || body.contains("245"));
    }

    #[test]
    fn whatsapp_body_is_compact() {
        let body = render_whatsapp_body(&alert()).unwrap();
        assert!(body.starts_with("PlantOps Alert [CRITICAL]"));
        assert!(body.contains("Press 3"));
        assert!(!body.contains("Telemetry Snapshot"));
    }
}
