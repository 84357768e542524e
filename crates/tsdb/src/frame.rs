//! Wide-format telemetry frame.
//!
//! Narrow `(timestamp, device_id, parameter, value)` rows are pivoted into a
//! table keyed by `(timestamp, device_id)` with one column per discovered
//! parameter. Duplicate cells are averaged; absent cells are `None`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// One raw point coming back from a time-series query.
#[derive(Debug, Clone)]
pub struct TelemetryRow {
    pub timestamp: DateTime<Utc>,
    pub device_id: i64,
    pub parameter: String,
    pub value: f64,
}

/// Summary statistics for one column (optionally restricted to one device).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TelemetryFrame {
    timestamps: Vec<DateTime<Utc>>,
    device_ids: Vec<i64>,
    columns: IndexMap<String, Vec<Option<f64>>>,
}

impl TelemetryFrame {
    /// Pivot narrow rows into wide format. Rows are ordered by
    /// `(timestamp, device_id)`; columns are ordered by parameter name.
    pub fn from_rows(rows: Vec<TelemetryRow>) -> Self {
        // (timestamp, device) → parameter → (sum, count) for duplicate averaging
        let mut cells: BTreeMap<(DateTime<Utc>, i64), BTreeMap<&str, (f64, usize)>> =
            BTreeMap::new();
        let mut parameters: BTreeSet<&str> = BTreeSet::new();

        for row in &rows {
            parameters.insert(&row.parameter);
            let entry = cells
                .entry((row.timestamp, row.device_id))
                .or_default()
                .entry(&row.parameter)
                .or_insert((0.0, 0));
            entry.0 += row.value;
            entry.1 += 1;
        }

        let mut frame = TelemetryFrame {
            timestamps: Vec::with_capacity(cells.len()),
            device_ids: Vec::with_capacity(cells.len()),
            columns: parameters
                .iter()
                .map(|p| (p.to_string(), Vec::with_capacity(cells.len())))
                .collect(),
        };

        for ((timestamp, device_id), params) in &cells {
            frame.timestamps.push(*timestamp);
            frame.device_ids.push(*device_id);
            for (name, column) in frame.columns.iter_mut() {
                column.push(
                    params
                        .get(name.as_str())
                        .map(|(sum, count)| sum / *count as f64),
                );
            }
        }

        frame
    }

    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn device_ids(&self) -> &[i64] {
        &self.device_ids
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Median of a column's present values (used for NaN-fill in models).
    pub fn column_median(&self, name: &str) -> Option<f64> {
        let mut values: Vec<f64> = self.columns.get(name)?.iter().flatten().copied().collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        Some(if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        })
    }

    /// Summary stats for a column, optionally restricted to one device.
    pub fn column_stats(&self, name: &str, device_id: Option<i64>) -> Option<ColumnStats> {
        let column = self.columns.get(name)?;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;

        for (i, value) in column.iter().enumerate() {
            if let Some(device_id) = device_id {
                if self.device_ids[i] != device_id {
                    continue;
                }
            }
            if let Some(v) = value {
                min = min.min(*v);
                max = max.max(*v);
                sum += v;
                count += 1;
            }
        }

        if count == 0 {
            return None;
        }

        Some(ColumnStats {
            min,
            max,
            avg: sum / count as f64,
            count,
        })
    }

    /// Row indices belonging to one device.
    pub fn rows_for_device(&self, device_id: i64) -> Vec<usize> {
        self.device_ids
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == device_id)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(minute: u32, device_id: i64, parameter: &str, value: f64) -> TelemetryRow {
        TelemetryRow {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap(),
            device_id,
            parameter: parameter.to_string(),
            value,
        }
    }

    #[test]
    fn pivots_to_wide_format() {
        let frame = TelemetryFrame::from_rows(vec![
            row(0, 1, "voltage", 230.0),
            row(0, 1, "current", 3.0),
            row(1, 1, "voltage", 232.0),
            row(0, 2, "voltage", 228.0),
        ]);

        assert_eq!(frame.row_count(), 3);
        assert_eq!(frame.parameter_names(), vec!["current", "voltage"]);

        // Rows are sorted by (timestamp, device_id).
        assert_eq!(frame.device_ids(), &[1, 2, 1]);
        assert_eq!(frame.column("voltage").unwrap(), &[Some(230.0), Some(228.0), Some(232.0)]);
        assert_eq!(frame.column("current").unwrap(), &[Some(3.0), None, None]);
    }

    #[test]
    fn averages_duplicate_cells() {
        let frame = TelemetryFrame::from_rows(vec![
            row(0, 1, "voltage", 230.0),
            row(0, 1, "voltage", 234.0),
        ]);

        assert_eq!(frame.row_count(), 1);
        assert_eq!(frame.column("voltage").unwrap(), &[Some(232.0)]);
    }

    #[test]
    fn median_ignores_missing_cells() {
        let frame = TelemetryFrame::from_rows(vec![
            row(0, 1, "voltage", 230.0),
            row(1, 1, "voltage", 240.0),
            row(2, 1, "current", 3.0),
        ]);

        assert_eq!(frame.column_median("voltage"), Some(235.0));
        assert_eq!(frame.column_median("current"), Some(3.0));
        assert_eq!(frame.column_median("power"), None);
    }

    #[test]
    fn stats_per_device() {
        let frame = TelemetryFrame::from_rows(vec![
            row(0, 1, "power", 100.0),
            row(1, 1, "power", 300.0),
            row(0, 2, "power", 50.0),
        ]);

        let all = frame.column_stats("power", None).unwrap();
        assert_eq!(all.count, 3);
        assert_eq!(all.min, 50.0);
        assert_eq!(all.max, 300.0);

        let device1 = frame.column_stats("power", Some(1)).unwrap();
        assert_eq!(device1.count, 2);
        assert_eq!(device1.avg, 200.0);

        assert!(frame.column_stats("power", Some(3)).is_none());
    }

    #[test]
    fn empty_frame() {
        let frame = TelemetryFrame::from_rows(Vec::new());
        assert!(frame.is_empty());
        assert!(frame.parameter_names().is_empty());
    }
}
