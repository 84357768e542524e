//! InfluxDB v2 HTTP client: line-protocol writes and Flux queries.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use plantops_core::config::InfluxConfig;

use crate::error::TsdbError;
use crate::frame::TelemetryRow;
use crate::point::{to_line_protocol, Point};
use crate::MEASUREMENT;

#[derive(Clone)]
pub struct TsdbClient {
    http: reqwest::Client,
    url: String,
    token: String,
    org: String,
    bucket: String,
}

impl TsdbClient {
    pub fn new(config: &InfluxConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        }
    }

    /// Write a batch of points (millisecond precision).
    pub async fn write_batch(&self, points: &[Point]) -> Result<(), TsdbError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = to_line_protocol(points);
        let response = self
            .http
            .post(format!("{}/api/v2/write", self.url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TsdbError::WriteRejected { status, body });
        }

        debug!(point_count = points.len(), "time-series batch written");
        Ok(())
    }

    /// Run a Flux query and return the annotated-CSV response body.
    pub async fn query_raw(&self, flux: &str) -> Result<String, TsdbError> {
        let response = self
            .http
            .post(format!("{}/api/v2/query", self.url))
            .query(&[("org", self.org.as_str())])
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/csv")
            .json(&serde_json::json!({ "query": flux, "type": "flux" }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TsdbError::QueryFailed { status, body });
        }

        Ok(response.text().await?)
    }

    /// Fetch raw telemetry rows for a factory's devices inside `[start, end]`.
    pub async fn fetch_rows(
        &self,
        factory_id: i64,
        device_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TelemetryRow>, TsdbError> {
        if device_ids.is_empty() {
            return Ok(Vec::new());
        }

        let device_set = device_ids
            .iter()
            .map(|id| format!("\"{id}\""))
            .collect::<Vec<_>>()
            .join(", ");

        let flux = format!(
            r#"from(bucket: "{bucket}")
    |> range(start: {start}, stop: {end})
    |> filter(fn: (r) => r._measurement == "{measurement}")
    |> filter(fn: (r) => r.factory_id == "{factory_id}")
    |> filter(fn: (r) => contains(value: r.device_id, set: [{device_set}]))"#,
            bucket = self.bucket,
            start = start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end = end.to_rfc3339_opts(SecondsFormat::Secs, true),
            measurement = MEASUREMENT,
        );

        let csv = self.query_raw(&flux).await?;
        let rows = parse_query_csv(&csv)?;

        debug!(
            factory_id,
            device_count = device_ids.len(),
            row_count = rows.len(),
            "telemetry fetched"
        );

        Ok(rows)
    }
}

/// Parse the annotated CSV returned by the Flux endpoint into telemetry rows.
///
/// Annotation lines start with `#`; each table starts with a header row.
/// Rows missing any of the expected columns are skipped.
fn parse_query_csv(csv: &str) -> Result<Vec<TelemetryRow>, TsdbError> {
    let mut rows = Vec::new();
    let mut header: Option<CsvHeader> = None;

    for line in csv.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            // Blank line terminates a table; the next one starts with a header.
            header = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let fields = split_csv_line(line);
        match &header {
            None => header = CsvHeader::from_fields(&fields),
            Some(h) => {
                if let Some(row) = h.parse_row(&fields) {
                    rows.push(row);
                }
            }
        }
    }

    Ok(rows)
}

struct CsvHeader {
    time: usize,
    value: usize,
    device_id: usize,
    parameter: usize,
}

impl CsvHeader {
    fn from_fields(fields: &[String]) -> Option<Self> {
        let find = |name: &str| fields.iter().position(|f| f == name);
        Some(Self {
            time: find("_time")?,
            value: find("_value")?,
            device_id: find("device_id")?,
            parameter: find("parameter")?,
        })
    }

    fn parse_row(&self, fields: &[String]) -> Option<TelemetryRow> {
        let timestamp = fields
            .get(self.time)?
            .parse::<DateTime<Utc>>()
            .ok()?;
        let value = fields.get(self.value)?.parse::<f64>().ok()?;
        let device_id = fields.get(self.device_id)?.parse::<i64>().ok()?;
        let parameter = fields.get(self.parameter)?.clone();

        Some(TelemetryRow {
            timestamp,
            device_id,
            parameter,
            value,
        })
    }
}

/// Split one CSV line, honoring double-quoted fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
#datatype,string,long,dateTime:RFC3339,double,string,string,string,string\n\
#group,false,false,false,false,true,true,true,true\n\
#default,_result,,,,,,,\n\
,result,table,_time,_value,_field,_measurement,device_id,parameter\n\
,_result,0,2026-03-01T10:00:00Z,231.4,value,device_metrics,42,voltage\n\
,_result,0,2026-03-01T10:00:00Z,3.2,value,device_metrics,42,current\n\
\n\
,result,table,_time,_value,_field,_measurement,device_id,parameter\n\
,_result,1,2026-03-01T10:01:00Z,745.6,value,device_metrics,42,power\n";

    #[test]
    fn parses_annotated_csv_tables() {
        let rows = parse_query_csv(SAMPLE).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].parameter, "voltage");
        assert_eq!(rows[0].value, 231.4);
        assert_eq!(rows[0].device_id, 42);
        assert_eq!(rows[2].parameter, "power");
    }

    #[test]
    fn skips_rows_with_bad_values() {
        let csv = ",result,table,_time,_value,_field,_measurement,device_id,parameter\n\
                   ,_result,0,not-a-time,231.4,value,device_metrics,42,voltage\n";
        let rows = parse_query_csv(csv).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn splits_quoted_fields() {
        let fields = split_csv_line(r#"a,"b,c",d"#);
        assert_eq!(fields, vec!["a", "b,c", "d"]);
    }

    #[test]
    fn splits_escaped_quotes() {
        let fields = split_csv_line(r#""he said ""hi""",x"#);
        assert_eq!(fields, vec![r#"he said "hi""#, "x"]);
    }
}
