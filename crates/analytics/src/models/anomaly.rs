//! Isolation-forest anomaly detection over a telemetry window.

use serde_json::{json, Value};
use tracing::info;

use plantops_tsdb::TelemetryFrame;

use crate::features::matrix_from_frame;
use crate::forest::{flag_by_contamination, IsolationForest};
use crate::models::ModelError;

const MIN_ROWS: usize = 10;
const CONTAMINATION: f64 = 0.05;
const MAX_REPORTED: usize = 50;

pub fn run(frame: &TelemetryFrame) -> Result<Value, ModelError> {
    if frame.row_count() < MIN_ROWS {
        return Err(ModelError::Insufficient(format!(
            "Insufficient data for anomaly detection (minimum {MIN_ROWS} rows required)"
        )));
    }

    let matrix = matrix_from_frame(frame);
    if matrix.n_columns() == 0 {
        return Err(ModelError::Insufficient(
            "No numeric features available for anomaly detection".to_string(),
        ));
    }

    let forest = IsolationForest::fit(&matrix.rows);
    let scores = forest.scores(&matrix.rows);
    let flagged = flag_by_contamination(&scores, CONTAMINATION);

    // Most anomalous first, capped for the report payload.
    let mut anomalies: Vec<Value> = flagged
        .iter()
        .map(|&i| {
            json!({
                "device_id": frame.device_ids()[i],
                "timestamp": frame.timestamps()[i].to_rfc3339(),
                "score": scores[i],
                "affected_parameters": matrix.columns,
            })
        })
        .collect();
    anomalies.sort_by(|a, b| {
        let sa = a["score"].as_f64().unwrap_or(0.0);
        let sb = b["score"].as_f64().unwrap_or(0.0);
        sb.total_cmp(&sa)
    });
    anomalies.truncate(MAX_REPORTED);

    let anomaly_count = flagged.len();
    let result = json!({
        "anomaly_count": anomaly_count,
        "anomaly_score": anomaly_count as f64 / frame.row_count() as f64,
        "anomalies": anomalies,
        "summary": format!(
            "{anomaly_count} anomalies detected in {} data points",
            frame.row_count()
        ),
        "parameters_analyzed": matrix.columns,
    });

    info!(
        anomaly_count,
        total_rows = frame.row_count(),
        "anomaly detection complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use plantops_tsdb::TelemetryRow;

    fn frame_with_outlier(rows: usize) -> TelemetryFrame {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut data = Vec::new();
        for i in 0..rows {
            let value = if i == rows - 1 { 5000.0 } else { 230.0 + (i % 3) as f64 };
            data.push(TelemetryRow {
                timestamp: base + Duration::minutes(i as i64),
                device_id: 1,
                parameter: "voltage".to_string(),
                value,
            });
        }
        TelemetryFrame::from_rows(data)
    }

    #[test]
    fn rejects_small_input() {
        let frame = frame_with_outlier(5);
        assert!(matches!(run(&frame), Err(ModelError::Insufficient(_))));
    }

    #[test]
    fn detects_and_ranks_anomalies() {
        let frame = frame_with_outlier(100);
        let result = run(&frame).unwrap();

        let count = result["anomaly_count"].as_u64().unwrap();
        assert!(count >= 1);
        assert!(result["anomaly_score"].as_f64().unwrap() > 0.0);

        let anomalies = result["anomalies"].as_array().unwrap();
        assert_eq!(anomalies.len(), count as usize);

        // Sorted by score descending.
        let scores: Vec<f64> = anomalies
            .iter()
            .map(|a| a["score"].as_f64().unwrap())
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));

        // The planted outlier is the top hit.
        let top = &anomalies[0];
        assert_eq!(top["device_id"].as_i64().unwrap(), 1);
        assert_eq!(
            top["affected_parameters"].as_array().unwrap()[0],
            "voltage"
        );
    }

    #[test]
    fn report_fields_present() {
        let frame = frame_with_outlier(30);
        let result = run(&frame).unwrap();
        for key in ["anomaly_count", "anomaly_score", "anomalies", "summary", "parameters_analyzed"] {
            assert!(result.get(key).is_some(), "missing {key}");
        }
    }
}
