//! Failure-risk assessment from rolling-statistics features.

use serde_json::{json, Value};
use tracing::info;

use plantops_tsdb::TelemetryFrame;

use crate::features::{matrix_from_frame, rolling_features};
use crate::forest::{flag_by_contamination, IsolationForest};
use crate::models::ModelError;

const MIN_ROWS: usize = 20;
const ROLLING_WINDOW: usize = 10;
const CONTAMINATION: f64 = 0.10;

pub fn run(frame: &TelemetryFrame) -> Result<Value, ModelError> {
    if frame.row_count() < MIN_ROWS {
        return Err(ModelError::Insufficient(format!(
            "Insufficient data for failure prediction (minimum {MIN_ROWS} rows required)"
        )));
    }

    let matrix = matrix_from_frame(frame);
    if matrix.n_columns() == 0 {
        return Err(ModelError::Insufficient(
            "No numeric features available for failure prediction".to_string(),
        ));
    }

    // Rolling mean + std per column as a drift/instability proxy.
    let rolled = rolling_features(&matrix, ROLLING_WINDOW);

    let forest = IsolationForest::fit(&rolled.rows);
    let scores = forest.scores(&rolled.rows);
    let flagged = flag_by_contamination(&scores, CONTAMINATION);

    let failure_probability = flagged.len() as f64 / frame.row_count() as f64;
    let risk_level = if failure_probability < 0.1 {
        "low"
    } else if failure_probability < 0.25 {
        "medium"
    } else {
        "high"
    };

    let result = json!({
        "failure_probability": (failure_probability * 10_000.0).round() / 10_000.0,
        "risk_level": risk_level,
        "summary": format!(
            "Failure risk assessed as {risk_level} ({:.1}%)",
            failure_probability * 100.0
        ),
        "data_points_analyzed": frame.row_count(),
        "features_used": matrix.n_columns(),
    });

    info!(
        failure_probability,
        risk_level, "failure prediction complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use plantops_tsdb::TelemetryRow;

    fn stable_frame(rows: usize) -> TelemetryFrame {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let data = (0..rows)
            .map(|i| TelemetryRow {
                timestamp: base + Duration::minutes(i as i64),
                device_id: 1,
                parameter: "temperature".to_string(),
                value: 60.0 + (i % 2) as f64 * 0.1,
            })
            .collect();
        TelemetryFrame::from_rows(data)
    }

    #[test]
    fn rejects_small_input() {
        assert!(matches!(
            run(&stable_frame(10)),
            Err(ModelError::Insufficient(_))
        ));
    }

    #[test]
    fn probability_and_risk_level_consistent() {
        let result = run(&stable_frame(60)).unwrap();
        let probability = result["failure_probability"].as_f64().unwrap();
        let risk = result["risk_level"].as_str().unwrap();

        assert!((0.0..=1.0).contains(&probability));
        let expected = if probability < 0.1 {
            "low"
        } else if probability < 0.25 {
            "medium"
        } else {
            "high"
        };
        assert_eq!(risk, expected);
        assert_eq!(result["data_points_analyzed"].as_u64().unwrap(), 60);
    }

    #[test]
    fn contamination_bounds_probability() {
        // Flagging rounds contamination * n, so the probability stays near 10%.
        let result = run(&stable_frame(100)).unwrap();
        let probability = result["failure_probability"].as_f64().unwrap();
        assert!(probability <= 0.15, "probability {probability} too high");
    }
}
