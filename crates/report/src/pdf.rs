//! PDF rendering via printpdf's built-in Helvetica fonts.
//!
//! A small cursor-based writer handles layout: headings, text lines, and
//! fixed-grid tables with automatic page breaks.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use serde_json::Value;
use tracing::info;

use crate::data::ReportData;
use crate::RenderError;

const PAGE_WIDTH: f64 = 210.0;
const PAGE_HEIGHT: f64 = 297.0;
const MARGIN: f64 = 20.0;
const LINE_HEIGHT: f64 = 6.5;
const MAX_ALERT_ROWS: usize = 100;
const MAX_ANOMALY_ROWS: usize = 20;

pub fn generate(
    title: &str,
    data: &ReportData,
    analytics: Option<&Value>,
) -> Result<Vec<u8>, RenderError> {
    info!(title, "generating pdf report");

    let mut writer = PdfWriter::new("Factory Operations Report")?;

    // Cover.
    writer.heading("Factory Operations Report");
    writer.blank();
    writer.subheading(title);
    writer.blank();
    let meta = &data.report_metadata;
    writer.text(&format!(
        "Generated: {}",
        meta.generated_at.format("%Y-%m-%d %H:%M")
    ));
    writer.text(&format!(
        "Period: {} to {}",
        meta.date_range_start.format("%Y-%m-%d"),
        meta.date_range_end.format("%Y-%m-%d")
    ));
    writer.text(&format!("Devices: {}", data.devices.len()));

    // Executive summary.
    writer.new_page();
    writer.subheading("Executive Summary");
    writer.blank();
    writer.table(
        &["Metric", "Value"],
        &[
            vec!["Total Devices".to_string(), data.devices.len().to_string()],
            vec!["Total Alerts".to_string(), data.alert_summary.total.to_string()],
            vec!["Critical Alerts".to_string(), data.alert_summary.critical.to_string()],
            vec!["High Alerts".to_string(), data.alert_summary.high.to_string()],
            vec!["Medium Alerts".to_string(), data.alert_summary.medium.to_string()],
            vec!["Low Alerts".to_string(), data.alert_summary.low.to_string()],
        ],
    );

    // Energy overview, for devices reporting power.
    let power_rows: Vec<Vec<String>> = data
        .devices
        .iter()
        .filter_map(|device| {
            let stats = data.device_stats(device.id)?.get("power")?;
            Some(vec![
                device.name.clone().unwrap_or_else(|| device.device_key.clone()),
                format!("{} W (avg)", stats.avg),
                format!("{} - {} W", stats.min, stats.max),
            ])
        })
        .collect();
    if !power_rows.is_empty() {
        writer.blank();
        writer.subheading("Energy Overview");
        writer.table(&["Device", "Average Power", "Power Range"], &power_rows);
    }

    // Per-device telemetry tables.
    writer.new_page();
    writer.subheading("Device Telemetry Summary");
    for device in &data.devices {
        writer.blank();
        writer.text(&format!(
            "{} ({})",
            device.name.as_deref().unwrap_or(&device.device_key),
            device.device_key
        ));

        match data.device_stats(device.id) {
            Some(stats) if !stats.is_empty() => {
                let rows: Vec<Vec<String>> = stats
                    .iter()
                    .map(|(parameter, s)| {
                        vec![
                            parameter.clone(),
                            s.min.to_string(),
                            s.max.to_string(),
                            s.avg.to_string(),
                            s.count.to_string(),
                        ]
                    })
                    .collect();
                writer.table(&["Parameter", "Min", "Max", "Average", "Samples"], &rows);
            }
            _ => writer.text("No telemetry data available for this period."),
        }
    }

    // Alerts log (latest first, capped).
    writer.new_page();
    writer.subheading("Alerts Log");
    writer.blank();
    if data.alerts.is_empty() {
        writer.text("No alerts recorded during this period.");
    } else {
        let rows: Vec<Vec<String>> = data
            .alerts
            .iter()
            .take(MAX_ALERT_ROWS)
            .map(|alert| {
                vec![
                    alert.triggered_at.format("%Y-%m-%d %H:%M").to_string(),
                    alert.severity.to_uppercase(),
                    alert.device_id.to_string(),
                    truncate(alert.message.as_deref().unwrap_or("-"), 60),
                ]
            })
            .collect();
        writer.table(&["Time", "Severity", "Device", "Message"], &rows);
    }

    // Optional analytics section.
    if let Some(analytics) = analytics {
        writer.new_page();
        writer.subheading("Analytics Results");
        writer.blank();

        if let Some(summary) = analytics.get("summary").and_then(Value::as_str) {
            writer.text(summary);
            writer.blank();
        }

        if let Some(anomalies) = analytics.get("anomalies").and_then(Value::as_array) {
            writer.text("Detected Anomalies");
            if anomalies.is_empty() {
                writer.text("No anomalies detected.");
            } else {
                let rows: Vec<Vec<String>> = anomalies
                    .iter()
                    .take(MAX_ANOMALY_ROWS)
                    .map(|anomaly| {
                        vec![
                            anomaly
                                .get("timestamp")
                                .and_then(Value::as_str)
                                .unwrap_or("-")
                                .chars()
                                .take(16)
                                .collect::<String>()
                                .replace('T', " "),
                            anomaly
                                .get("device_id")
                                .map(|d| d.to_string())
                                .unwrap_or_else(|| "-".to_string()),
                            format!("{:.3}", anomaly.get("score").and_then(Value::as_f64).unwrap_or(0.0)),
                        ]
                    })
                    .collect();
                writer.table(&["Timestamp", "Device", "Score"], &rows);
            }
        }

        if let Some(horizon) = analytics.get("horizon_days").and_then(Value::as_i64) {
            writer.blank();
            writer.text("Energy Forecast");
            writer.text(&format!("Forecast horizon: {horizon} days"));
        }
    }

    let bytes = writer.finish()?;
    info!(size_bytes = bytes.len(), "pdf generated");
    Ok(bytes)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

// ── Layout writer ───────────────────────────────────────────────────

struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    y: f64,
}

impl PdfWriter {
    fn new(doc_title: &str) -> Result<Self, RenderError> {
        let (doc, page, layer) =
            PdfDocument::new(doc_title, Mm(PAGE_WIDTH as f32), Mm(PAGE_HEIGHT as f32), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            font,
            font_bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH as f32), Mm(PAGE_HEIGHT as f32), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, lines: usize) {
        if self.y - lines as f64 * LINE_HEIGHT < MARGIN {
            self.new_page();
        }
    }

    fn heading(&mut self, text: &str) {
        self.ensure_space(2);
        self.layer
            .use_text(text, 22.0, Mm(MARGIN as f32), Mm(self.y as f32), &self.font_bold);
        self.y -= 2.0 * LINE_HEIGHT;
    }

    fn subheading(&mut self, text: &str) {
        self.ensure_space(2);
        self.layer
            .use_text(text, 15.0, Mm(MARGIN as f32), Mm(self.y as f32), &self.font_bold);
        self.y -= 1.5 * LINE_HEIGHT;
    }

    fn text(&mut self, text: &str) {
        self.ensure_space(1);
        self.layer
            .use_text(text, 10.0, Mm(MARGIN as f32), Mm(self.y as f32), &self.font);
        self.y -= LINE_HEIGHT;
    }

    fn blank(&mut self) {
        self.y -= LINE_HEIGHT / 2.0;
    }

    /// Fixed-grid table: columns share the printable width evenly.
    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        let width = (PAGE_WIDTH - 2.0 * MARGIN) / headers.len() as f64;

        self.ensure_space(2);
        for (i, header) in headers.iter().enumerate() {
            self.layer.use_text(
                *header,
                10.0,
                Mm((MARGIN + i as f64 * width) as f32),
                Mm(self.y as f32),
                &self.font_bold,
            );
        }
        self.y -= LINE_HEIGHT;

        for row in rows {
            self.ensure_space(1);
            for (i, cell) in row.iter().enumerate() {
                self.layer.use_text(
                    cell,
                    9.0,
                    Mm((MARGIN + i as f64 * width) as f32),
                    Mm(self.y as f32),
                    &self.font,
                );
            }
            self.y -= LINE_HEIGHT;
        }
    }

    fn finish(self) -> Result<Vec<u8>, RenderError> {
        self.doc
            .save_to_bytes()
            .map_err(|e| RenderError::Pdf(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AlertSummary, ReportMetadata};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn sample_data() -> ReportData {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        ReportData {
            devices: vec![crate::data::DeviceInfo {
                id: 1,
                device_key: "M01".to_string(),
                name: Some("Press".to_string()),
                manufacturer: None,
                model: None,
                region: None,
                last_seen: Some(ts),
            }],
            telemetry_summary: BTreeMap::from([(
                "device_1".to_string(),
                BTreeMap::from([(
                    "power".to_string(),
                    crate::data::StatsSummary {
                        min: 10.0,
                        max: 90.0,
                        avg: 50.0,
                        count: 12,
                    },
                )]),
            )]),
            alerts: vec![crate::data::AlertInfo {
                id: 1,
                rule_id: 2,
                device_id: 1,
                triggered_at: ts,
                severity: "high".to_string(),
                message: Some("[High Voltage] voltage (245) gt 240".to_string()),
            }],
            alert_summary: AlertSummary {
                high: 1,
                total: 1,
                ..Default::default()
            },
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
    fn renders_nonempty_pdf() {
        let bytes = generate("March Report", &sample_data(), None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn renders_analytics_section() {
        let analytics = serde_json::json!({
            "summary": "2 anomalies detected in 100 data points",
            "anomalies": [
                {"timestamp": "2026-03-01T10:00:00+00:00", "device_id": 1, "score": 0.82}
            ],
            "horizon_days": 7
        });
        let bytes = generate("March Report", &sample_data(), Some(&analytics)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn truncate_caps_length() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789abc", 10), "0123456789");
    }
}
