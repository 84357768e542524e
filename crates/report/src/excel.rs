//! Excel rendering: `Summary`, `Devices`, `Alerts`, `Telemetry`, and an
//! optional `Analytics` sheet.

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::Value;
use tracing::info;

use crate::data::ReportData;
use crate::RenderError;

const MAX_ANOMALY_ROWS: usize = 20;

pub fn generate(
    title: &str,
    data: &ReportData,
    analytics: Option<&Value>,
) -> Result<Vec<u8>, RenderError> {
    info!(title, "generating excel report");

    build(title, data, analytics).map_err(|e| RenderError::Excel(e.to_string()))
}

fn build(title: &str, data: &ReportData, analytics: Option<&Value>) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    // Summary sheet.
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        sheet.write_with_format(0, 0, title, &bold)?;

        let meta = &data.report_metadata;
        let rows: Vec<(&str, String)> = vec![
            ("Generated", meta.generated_at.format("%Y-%m-%d %H:%M").to_string()),
            (
                "Period",
                format!(
                    "{} to {}",
                    meta.date_range_start.format("%Y-%m-%d"),
                    meta.date_range_end.format("%Y-%m-%d")
                ),
            ),
            ("Total Devices", data.devices.len().to_string()),
            ("Total Alerts", data.alert_summary.total.to_string()),
            ("Critical Alerts", data.alert_summary.critical.to_string()),
            ("High Alerts", data.alert_summary.high.to_string()),
            ("Medium Alerts", data.alert_summary.medium.to_string()),
            ("Low Alerts", data.alert_summary.low.to_string()),
        ];
        for (i, (label, value)) in rows.iter().enumerate() {
            let row = 2 + i as u32;
            sheet.write_with_format(row, 0, *label, &bold)?;
            sheet.write(row, 1, value)?;
        }
    }

    // Devices sheet.
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Devices")?;
        for (col, header) in ["ID", "Key", "Name", "Manufacturer", "Model", "Region", "Last Seen"]
            .iter()
            .enumerate()
        {
            sheet.write_with_format(0, col as u16, *header, &bold)?;
        }
        for (i, device) in data.devices.iter().enumerate() {
            let row = 1 + i as u32;
            sheet.write(row, 0, device.id as f64)?;
            sheet.write(row, 1, device.device_key.as_str())?;
            sheet.write(row, 2, device.name.as_deref().unwrap_or(""))?;
            sheet.write(row, 3, device.manufacturer.as_deref().unwrap_or(""))?;
            sheet.write(row, 4, device.model.as_deref().unwrap_or(""))?;
            sheet.write(row, 5, device.region.as_deref().unwrap_or(""))?;
            sheet.write(
                row,
                6,
                device
                    .last_seen
                    .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            )?;
        }
    }

    // Alerts sheet.
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Alerts")?;
        for (col, header) in ["Time", "Severity", "Device ID", "Rule ID", "Message"]
            .iter()
            .enumerate()
        {
            sheet.write_with_format(0, col as u16, *header, &bold)?;
        }
        for (i, alert) in data.alerts.iter().enumerate() {
            let row = 1 + i as u32;
            sheet.write(row, 0, alert.triggered_at.format("%Y-%m-%d %H:%M").to_string())?;
            sheet.write(row, 1, alert.severity.to_uppercase())?;
            sheet.write(row, 2, alert.device_id as f64)?;
            sheet.write(row, 3, alert.rule_id as f64)?;
            sheet.write(row, 4, alert.message.as_deref().unwrap_or(""))?;
        }
    }

    // Telemetry sheet: one row per (device, parameter).
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Telemetry")?;
        for (col, header) in ["Device", "Parameter", "Min", "Max", "Average", "Samples"]
            .iter()
            .enumerate()
        {
            sheet.write_with_format(0, col as u16, *header, &bold)?;
        }

        let mut row = 1u32;
        for device in &data.devices {
            let Some(stats) = data.device_stats(device.id) else {
                continue;
            };
            for (parameter, s) in stats {
                sheet.write(row, 0, device.device_key.as_str())?;
                sheet.write(row, 1, parameter.as_str())?;
                sheet.write(row, 2, s.min)?;
                sheet.write(row, 3, s.max)?;
                sheet.write(row, 4, s.avg)?;
                sheet.write(row, 5, s.count as f64)?;
                row += 1;
            }
        }
    }

    // Optional analytics sheet.
    if let Some(analytics) = analytics {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Analytics")?;

        let mut row = 0u32;
        if let Some(summary) = analytics.get("summary").and_then(Value::as_str) {
            sheet.write_with_format(row, 0, "Summary", &bold)?;
            sheet.write(row, 1, summary)?;
            row += 2;
        }

        if let Some(anomalies) = analytics.get("anomalies").and_then(Value::as_array) {
            sheet.write_with_format(row, 0, "Timestamp", &bold)?;
            sheet.write_with_format(row, 1, "Device", &bold)?;
            sheet.write_with_format(row, 2, "Score", &bold)?;
            row += 1;

            for anomaly in anomalies.iter().take(MAX_ANOMALY_ROWS) {
                sheet.write(
                    row,
                    0,
                    anomaly.get("timestamp").and_then(Value::as_str).unwrap_or("-"),
                )?;
                sheet.write(
                    row,
                    1,
                    anomaly.get("device_id").and_then(Value::as_i64).unwrap_or(0) as f64,
                )?;
                sheet.write(
                    row,
                    2,
                    anomaly.get("score").and_then(Value::as_f64).unwrap_or(0.0),
                )?;
                row += 1;
            }
            row += 1;
        }

        if let Some(horizon) = analytics.get("horizon_days").and_then(Value::as_i64) {
            sheet.write_with_format(row, 0, "Forecast horizon (days)", &bold)?;
            sheet.write(row, 1, horizon as f64)?;
        }
    }

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AlertSummary, DeviceInfo, ReportMetadata, StatsSummary};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn sample_data() -> ReportData {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        ReportData {
            devices: vec![DeviceInfo {
                id: 1,
                device_key: "M01".to_string(),
                name: None,
                manufacturer: Some("Acme".to_string()),
                model: None,
                region: None,
                last_seen: None,
            }],
            telemetry_summary: BTreeMap::from([(
                "device_1".to_string(),
                BTreeMap::from([(
                    "voltage".to_string(),
                    StatsSummary {
                        min: 228.1,
                        max: 242.7,
                        avg: 231.9,
                        count: 1440,
                    },
                )]),
            )]),
            alerts: Vec::new(),
            alert_summary: AlertSummary::default(),
            report_metadata: ReportMetadata {
                generated_at: ts,
                date_range_start: ts,
                date_range_end: ts,
                factory_id: 1,
                device_count: 1,
            },
        }
    }

    #[test]
    fn renders_xlsx_container() {
        let bytes = generate("Weekly", &sample_data(), None).unwrap();
        // XLSX is a ZIP container.
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn renders_with_analytics_sheet() {
        let analytics = serde_json::json!({
            "summary": "ok",
            "anomalies": [{"timestamp": "t", "device_id": 1, "score": 0.9}],
            "horizon_days": 7
        });
        let bytes = generate("Weekly", &sample_data(), Some(&analytics)).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
