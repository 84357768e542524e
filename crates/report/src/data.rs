//! Cross-store aggregation of everything a report renders.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use plantops_db::repo;
use plantops_db::DbError;
use plantops_tsdb::{TelemetryFrame, TsdbClient};

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub id: i64,
    pub device_key: String,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub region: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertInfo {
    pub id: i64,
    pub rule_id: i64,
    pub device_id: i64,
    pub triggered_at: DateTime<Utc>,
    pub severity: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AlertSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
    pub factory_id: i64,
    pub device_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub devices: Vec<DeviceInfo>,
    /// `device_<id>` → parameter → stats.
    pub telemetry_summary: BTreeMap<String, BTreeMap<String, StatsSummary>>,
    pub alerts: Vec<AlertInfo>,
    pub alert_summary: AlertSummary,
    pub report_metadata: ReportMetadata,
}

impl ReportData {
    /// Parameter stats for one device.
    pub fn device_stats(&self, device_id: i64) -> Option<&BTreeMap<String, StatsSummary>> {
        self.telemetry_summary.get(&format!("device_{device_id}"))
    }
}

/// Aggregate device metadata, telemetry statistics, and alert history for a
/// report window.
///
/// Device metadata failures propagate (the report is useless without them);
/// telemetry and alert fetch failures degrade to empty sections with a
/// warning, matching the rest of the pipeline's prefer-partial-output
/// stance.
pub async fn aggregate(
    pool: &PgPool,
    tsdb: &TsdbClient,
    factory_id: i64,
    device_ids: &[i64],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<ReportData, DbError> {
    info!(
        factory_id,
        device_count = device_ids.len(),
        start = %start,
        end = %end,
        "aggregating report data"
    );

    let mut devices = Vec::new();
    for &device_id in device_ids {
        if let Some(device) = repo::device::get_by_id(pool, factory_id, device_id).await? {
            devices.push(DeviceInfo {
                id: device.id,
                device_key: device.device_key,
                name: device.name,
                manufacturer: device.manufacturer,
                model: device.model,
                region: device.region,
                last_seen: device.last_seen,
            });
        }
    }

    let telemetry_summary = match tsdb.fetch_rows(factory_id, device_ids, start, end).await {
        Ok(rows) => summarize_telemetry(&TelemetryFrame::from_rows(rows), device_ids),
        Err(e) => {
            warn!(factory_id, error = %e, "telemetry aggregation failed, report proceeds without");
            BTreeMap::new()
        }
    };

    let (alerts, alert_summary) = match repo::alert::in_range(pool, factory_id, device_ids, start, end).await {
        Ok(rows) => {
            let mut summary = AlertSummary::default();
            let alerts: Vec<AlertInfo> = rows
                .into_iter()
                .map(|alert| {
                    match alert.severity.as_str() {
                        "critical" => summary.critical += 1,
                        "high" => summary.high += 1,
                        "medium" => summary.medium += 1,
                        "low" => summary.low += 1,
                        _ => {}
                    }
                    AlertInfo {
                        id: alert.id,
                        rule_id: alert.rule_id,
                        device_id: alert.device_id,
                        triggered_at: alert.triggered_at,
                        severity: alert.severity,
                        message: alert.message,
                    }
                })
                .collect();
            summary.total = summary.critical + summary.high + summary.medium + summary.low;
            (alerts, summary)
        }
        Err(e) => {
            warn!(factory_id, error = %e, "alert aggregation failed, report proceeds without");
            (Vec::new(), AlertSummary::default())
        }
    };

    let data = ReportData {
        report_metadata: ReportMetadata {
            generated_at: Utc::now(),
            date_range_start: start,
            date_range_end: end,
            factory_id,
            device_count: devices.len(),
        },
        devices,
        telemetry_summary,
        alerts,
        alert_summary,
    };

    info!(
        factory_id,
        device_count = data.devices.len(),
        alert_count = data.alert_summary.total,
        "report data complete"
    );

    Ok(data)
}

fn summarize_telemetry(
    frame: &TelemetryFrame,
    device_ids: &[i64],
) -> BTreeMap<String, BTreeMap<String, StatsSummary>> {
    let mut summary = BTreeMap::new();

    for &device_id in device_ids {
        let mut device_stats = BTreeMap::new();
        for parameter in frame.parameter_names() {
            if let Some(stats) = frame.column_stats(parameter, Some(device_id)) {
                device_stats.insert(
                    parameter.to_string(),
                    StatsSummary {
                        min: round2(stats.min),
                        max: round2(stats.max),
                        avg: round2(stats.avg),
                        count: stats.count,
                    },
                );
            }
        }
        if !device_stats.is_empty() {
            summary.insert(format!("device_{device_id}"), device_stats);
        }
    }

    summary
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use plantops_tsdb::TelemetryRow;

    #[test]
    fn telemetry_summary_groups_by_device() {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let frame = TelemetryFrame::from_rows(vec![
            TelemetryRow {
                timestamp: base,
                device_id: 1,
                parameter: "power".to_string(),
                value: 101.456,
            },
            TelemetryRow {
                timestamp: base + Duration::minutes(1),
                device_id: 1,
                parameter: "power".to_string(),
                value: 98.544,
            },
            TelemetryRow {
                timestamp: base,
                device_id: 2,
                parameter: "voltage".to_string(),
                value: 230.0,
            },
        ]);

        let summary = summarize_telemetry(&frame, &[1, 2, 3]);

        let d1 = &summary["device_1"]["power"];
        assert_eq!(d1.count, 2);
        assert_eq!(d1.avg, 100.0);
        assert_eq!(d1.min, 98.54);
        assert_eq!(d1.max, 101.46);

        assert!(summary["device_2"].contains_key("voltage"));
        assert!(!summary["device_2"].contains_key("power"));
        // Devices without data get no entry at all.
        assert!(!summary.contains_key("device_3"));
    }

    #[test]
    fn rounding_is_two_decimals() {
        assert_eq!(round2(1.005), 1.0);
        assert_eq!(round2(1.006), 1.01);
        assert_eq!(round2(-2.345), -2.35);
    }
}
