//! Copilot mode: run every model whose input preconditions hold and merge
//! the results.

use serde_json::{json, Map, Value};
use tracing::info;

use plantops_tsdb::TelemetryFrame;

use crate::models::{anomaly, failure, forecast, ModelError};

pub fn run(frame: &TelemetryFrame) -> Result<Value, ModelError> {
    let mut results = Map::new();

    if frame.row_count() >= 10 {
        results.insert("anomaly".to_string(), outcome(anomaly::run(frame)));
    }
    if frame.has_column("power") && frame.row_count() >= 24 {
        results.insert("forecast".to_string(), outcome(forecast::run(frame)));
    }
    if frame.row_count() >= 20 {
        results.insert("failure".to_string(), outcome(failure::run(frame)));
    }

    let summary_parts: Vec<String> = results
        .iter()
        .filter_map(|(name, result)| {
            result
                .get("summary")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    result
                        .get("error")
                        .and_then(Value::as_str)
                        .map(|e| format!("{name}: {e}"))
                })
        })
        .collect();

    let models_used: Vec<String> = results.keys().cloned().collect();
    info!(?models_used, data_points = frame.row_count(), "copilot run complete");

    Ok(json!({
        "mode": "ai_copilot",
        "models_used": models_used,
        "results": results,
        "summary": if summary_parts.is_empty() {
            "No models could be run on this dataset".to_string()
        } else {
            summary_parts.join(" | ")
        },
        "data_points": frame.row_count(),
    }))
}

/// Individual model failures are embedded, not propagated: copilot reports
/// whatever it could compute.
fn outcome(result: Result<Value, ModelError>) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => json!({ "error": e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use plantops_tsdb::TelemetryRow;

    fn frame(rows: i64, with_power: bool) -> TelemetryFrame {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut data = Vec::new();
        for h in 0..rows {
            let ts = base + Duration::hours(h);
            data.push(TelemetryRow {
                timestamp: ts,
                device_id: 1,
                parameter: "voltage".to_string(),
                value: 230.0 + (h % 5) as f64,
            });
            if with_power {
                data.push(TelemetryRow {
                    timestamp: ts,
                    device_id: 1,
                    parameter: "power".to_string(),
                    value: 700.0 + (h % 24) as f64 * 10.0,
                });
            }
        }
        TelemetryFrame::from_rows(data)
    }

    #[test]
    fn runs_all_models_when_preconditions_hold() {
        let result = run(&frame(48, true)).unwrap();
        let used = result["models_used"].as_array().unwrap();
        let names: Vec<&str> = used.iter().map(|v| v.as_str().unwrap()).collect();

        assert!(names.contains(&"anomaly"));
        assert!(names.contains(&"forecast"));
        assert!(names.contains(&"failure"));
        assert_eq!(result["mode"], "ai_copilot");
    }

    #[test]
    fn skips_forecast_without_power() {
        let result = run(&frame(48, false)).unwrap();
        let used = result["models_used"].as_array().unwrap();
        let names: Vec<&str> = used.iter().map(|v| v.as_str().unwrap()).collect();

        assert!(names.contains(&"anomaly"));
        assert!(!names.contains(&"forecast"));
    }

    #[test]
    fn tiny_dataset_runs_nothing() {
        let result = run(&frame(3, false)).unwrap();
        assert!(result["models_used"].as_array().unwrap().is_empty());
        assert_eq!(
            result["summary"].as_str().unwrap(),
            "No models could be run on this dataset"
        );
    }
}
