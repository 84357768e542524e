//! Domain models mapped from Postgres rows.
//!
//! Enum-like columns (severity, statuses, scopes) are stored as TEXT and
//! surfaced as `String` fields; the typed enums below provide the canonical
//! value sets, parsing, and comparisons where logic depends on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use plantops_core::types::NotificationChannels;

// ── Enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "complete" => Some(JobStatus::Complete),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Rows in `pending` or `failed` may be deleted; `running` and
    /// `complete` may not.
    pub fn is_deletable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Anomaly,
    FailurePrediction,
    EnergyForecast,
    AiCopilot,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Anomaly => "anomaly",
            JobType::FailurePrediction => "failure_prediction",
            JobType::EnergyForecast => "energy_forecast",
            JobType::AiCopilot => "ai_copilot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "anomaly" => Some(JobType::Anomaly),
            "failure_prediction" => Some(JobType::FailurePrediction),
            "energy_forecast" => Some(JobType::EnergyForecast),
            "ai_copilot" => Some(JobType::AiCopilot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Excel,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "excel",
            ReportFormat::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(ReportFormat::Pdf),
            "excel" => Some(ReportFormat::Excel),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "xlsx",
            ReportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ReportFormat::Json => "application/json",
        }
    }
}

// ── Rows ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Factory {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: i64,
    pub factory_id: i64,
    pub device_key: String,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub region: Option<String>,
    pub api_key: Option<String>,
    pub is_active: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeviceParameter {
    pub id: i64,
    pub factory_id: i64,
    pub device_id: i64,
    pub parameter_key: String,
    pub display_name: Option<String>,
    pub unit: Option<String>,
    pub data_type: String,
    pub is_kpi_selected: bool,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rule {
    pub id: i64,
    pub factory_id: i64,
    pub name: String,
    pub description: Option<String>,
    /// "device" | "global"
    pub scope: String,
    /// Condition tree (see the rules crate for the schema).
    pub conditions: serde_json::Value,
    pub cooldown_minutes: i32,
    pub is_active: bool,
    /// "always" | "time_window" | "date_range"
    pub schedule_type: String,
    pub schedule_config: Option<serde_json::Value>,
    pub severity: String,
    pub notification_channels: Option<serde_json::Value>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn channels(&self) -> NotificationChannels {
        NotificationChannels::from_value(self.notification_channels.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Alert {
    pub id: i64,
    pub factory_id: i64,
    pub rule_id: i64,
    pub device_id: i64,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub severity: String,
    pub message: Option<String>,
    pub telemetry_snapshot: Option<serde_json::Value>,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
}

/// Alert joined with rule and device names for presentation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AlertContext {
    pub id: i64,
    pub factory_id: i64,
    pub rule_id: i64,
    pub device_id: i64,
    pub triggered_at: DateTime<Utc>,
    pub severity: String,
    pub message: Option<String>,
    pub telemetry_snapshot: Option<serde_json::Value>,
    pub rule_name: Option<String>,
    pub device_name: Option<String>,
    pub device_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub factory_id: i64,
    pub email: String,
    pub whatsapp_number: Option<String>,
    pub role: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AnalyticsJob {
    pub id: Uuid,
    pub factory_id: i64,
    pub created_by: Option<i64>,
    pub job_type: String,
    pub device_ids: serde_json::Value,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
    pub status: String,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsJob {
    pub fn device_id_list(&self) -> Vec<i64> {
        device_id_list(&self.device_ids)
    }

    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Report {
    pub id: Uuid,
    pub factory_id: i64,
    pub created_by: Option<i64>,
    pub title: Option<String>,
    pub device_ids: serde_json::Value,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
    pub format: String,
    pub include_analytics: bool,
    pub analytics_job_id: Option<Uuid>,
    pub status: String,
    pub file_url: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn device_id_list(&self) -> Vec<i64> {
        device_id_list(&self.device_ids)
    }

    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::parse(&self.status)
    }
}

fn device_id_list(value: &serde_json::Value) -> Vec<i64> {
    value
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_i64()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_roundtrip() {
        for s in ["low", "medium", "high", "critical"] {
            assert_eq!(Severity::parse(s).unwrap().as_str(), s);
        }
        assert!(Severity::parse("fatal").is_none());
    }

    #[test]
    fn job_status_deletability() {
        assert!(JobStatus::Pending.is_deletable());
        assert!(JobStatus::Failed.is_deletable());
        assert!(!JobStatus::Running.is_deletable());
        assert!(!JobStatus::Complete.is_deletable());
    }

    #[test]
    fn report_format_content_types() {
        assert_eq!(ReportFormat::Pdf.extension(), "pdf");
        assert_eq!(ReportFormat::Excel.extension(), "xlsx");
        assert_eq!(ReportFormat::Json.content_type(), "application/json");
    }

    #[test]
    fn device_id_list_parses_json_array() {
        assert_eq!(device_id_list(&serde_json::json!([1, 2, 3])), vec![1, 2, 3]);
        assert!(device_id_list(&serde_json::json!({})).is_empty());
    }
}
