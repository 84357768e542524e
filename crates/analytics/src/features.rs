//! Feature matrix construction from the wide telemetry frame.

use plantops_tsdb::TelemetryFrame;

/// A dense row-major feature matrix plus its column labels.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Build a matrix over every parameter column, filling missing cells with
/// the column median (columns with no values at all fill with zero).
pub fn matrix_from_frame(frame: &TelemetryFrame) -> FeatureMatrix {
    let columns: Vec<String> = frame
        .parameter_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let medians: Vec<f64> = columns
        .iter()
        .map(|c| frame.column_median(c).unwrap_or(0.0))
        .collect();

    let mut rows = vec![Vec::with_capacity(columns.len()); frame.row_count()];
    for (col_idx, name) in columns.iter().enumerate() {
        let column = frame.column(name).unwrap_or(&[]);
        for (row_idx, cell) in column.iter().enumerate() {
            rows[row_idx].push(cell.unwrap_or(medians[col_idx]));
        }
    }

    FeatureMatrix { columns, rows }
}

/// Rolling mean and standard deviation features (window of `window` rows,
/// minimum one observation) per input column, as used by failure prediction.
pub fn rolling_features(matrix: &FeatureMatrix, window: usize) -> FeatureMatrix {
    let n = matrix.n_rows();
    let mut columns = Vec::with_capacity(matrix.n_columns() * 2);
    for name in &matrix.columns {
        columns.push(format!("{name}_mean"));
        columns.push(format!("{name}_std"));
    }

    let mut rows = vec![Vec::with_capacity(columns.len()); n];
    for col_idx in 0..matrix.n_columns() {
        for row_idx in 0..n {
            let start = row_idx.saturating_sub(window - 1);
            let slice: Vec<f64> = (start..=row_idx)
                .map(|i| matrix.rows[i][col_idx])
                .collect();

            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            let std = if slice.len() < 2 {
                0.0
            } else {
                let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                    / (slice.len() - 1) as f64;
                var.sqrt()
            };

            rows[row_idx].push(mean);
            rows[row_idx].push(std);
        }
    }

    FeatureMatrix { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use plantops_tsdb::TelemetryRow;

    fn frame() -> TelemetryFrame {
        let mut rows = Vec::new();
        for minute in 0..4u32 {
            rows.push(TelemetryRow {
                timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap(),
                device_id: 1,
                parameter: "voltage".to_string(),
                value: 230.0 + f64::from(minute),
            });
        }
        // current only present on the first row: the rest median-fill.
        rows.push(TelemetryRow {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            device_id: 1,
            parameter: "current".to_string(),
            value: 3.0,
        });
        TelemetryFrame::from_rows(rows)
    }

    #[test]
    fn matrix_median_fills_missing_cells() {
        let matrix = matrix_from_frame(&frame());
        assert_eq!(matrix.columns, vec!["current", "voltage"]);
        assert_eq!(matrix.n_rows(), 4);
        // Missing current cells take the median of the only present value.
        assert_eq!(matrix.rows[1][0], 3.0);
        assert_eq!(matrix.rows[3][1], 233.0);
    }

    #[test]
    fn rolling_features_shape_and_values() {
        let matrix = FeatureMatrix {
            columns: vec!["v".to_string()],
            rows: vec![vec![1.0], vec![3.0], vec![5.0]],
        };
        let rolled = rolling_features(&matrix, 2);

        assert_eq!(rolled.columns, vec!["v_mean", "v_std"]);
        // First row: window of one → mean = value, std = 0.
        assert_eq!(rolled.rows[0], vec![1.0, 0.0]);
        // Second row: mean of [1, 3] = 2, sample std = sqrt(2).
        assert_eq!(rolled.rows[1][0], 2.0);
        assert!((rolled.rows[1][1] - 2.0_f64.sqrt()).abs() < 1e-12);
        // Third row windows [3, 5].
        assert_eq!(rolled.rows[2][0], 4.0);
    }
}
