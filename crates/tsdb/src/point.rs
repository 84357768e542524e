//! Line-protocol point construction.

use chrono::{DateTime, Utc};

/// A single time-series point: one measurement, string tags, one float field.
#[derive(Debug, Clone)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, f64)>,
    timestamp: Option<DateTime<Utc>>,
}

impl Point {
    pub fn new(measurement: &str) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }

    pub fn field(mut self, key: &str, value: f64) -> Self {
        self.fields.push((key.to_string(), value));
        self
    }

    pub fn time(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Render as one line of InfluxDB line protocol (millisecond precision).
    pub fn to_line(&self) -> String {
        let mut line = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_tag(key));
            line.push('=');
            line.push_str(&escape_tag(value));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_tag(key));
            line.push('=');
            line.push_str(&value.to_string());
        }

        if let Some(ts) = self.timestamp {
            line.push(' ');
            line.push_str(&ts.timestamp_millis().to_string());
        }

        line
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

/// Render a batch as a newline-separated write body.
pub fn to_line_protocol(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_tags_field_and_timestamp() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let point = Point::new("device_metrics")
            .tag("factory_id", "1")
            .tag("device_id", "42")
            .tag("parameter", "voltage")
            .field("value", 231.4)
            .time(ts);

        assert_eq!(
            point.to_line(),
            format!(
                "device_metrics,factory_id=1,device_id=42,parameter=voltage value=231.4 {}",
                ts.timestamp_millis()
            )
        );
    }

    #[test]
    fn escapes_special_characters_in_tags() {
        let point = Point::new("device_metrics")
            .tag("parameter", "spindle speed")
            .field("value", 1.0);

        assert!(point.to_line().starts_with("device_metrics,parameter=spindle\\ speed "));
    }

    #[test]
    fn batch_joins_lines() {
        let a = Point::new("m").tag("t", "1").field("value", 1.0);
        let b = Point::new("m").tag("t", "2").field("value", 2.0);
        let body = to_line_protocol(&[a, b]);
        assert_eq!(body.lines().count(), 2);
    }
}
