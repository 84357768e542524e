//! Per-rule scheduling windows, evaluated in the tenant timezone.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// Check whether a rule admits evaluation at `timestamp`.
///
/// Returns `Err` with a reason when the schedule config is malformed; the
/// caller admits evaluation in that case (fail-open) so alerting never
/// silently breaks on bad config.
pub fn is_scheduled(
    schedule_type: &str,
    config: Option<&Value>,
    timestamp: DateTime<Utc>,
    tz: Tz,
) -> Result<bool, String> {
    match schedule_type {
        "always" => Ok(true),
        "time_window" => time_window(config, timestamp, tz),
        "date_range" => date_range(config, timestamp, tz),
        // Unknown schedule types admit, matching the fail-open policy.
        _ => Ok(true),
    }
}

fn time_window(config: Option<&Value>, timestamp: DateTime<Utc>, tz: Tz) -> Result<bool, String> {
    let config = config
        .and_then(Value::as_object)
        .ok_or_else(|| "time_window schedule without config".to_string())?;

    let start = parse_time(config.get("start_time"), "start_time")?;
    let end = parse_time(config.get("end_time"), "end_time")?;

    // 1 = Monday … 7 = Sunday; absent means every day.
    let days: Vec<i64> = match config.get("days") {
        None => (1..=7).collect(),
        Some(value) => value
            .as_array()
            .map(|arr| arr.iter().filter_map(Value::as_i64).collect())
            .ok_or_else(|| "days is not an array".to_string())?,
    };

    let local = timestamp.with_timezone(&tz);
    let day_ok = days.contains(&i64::from(chrono::Datelike::weekday(&local).number_from_monday()));
    let time = local.time();

    Ok(day_ok && start <= time && time <= end)
}

fn date_range(config: Option<&Value>, timestamp: DateTime<Utc>, tz: Tz) -> Result<bool, String> {
    let config = config
        .and_then(Value::as_object)
        .ok_or_else(|| "date_range schedule without config".to_string())?;

    let start = parse_date(config.get("start_date"), "start_date")?;
    let end = parse_date(config.get("end_date"), "end_date")?;

    let local_date = timestamp.with_timezone(&tz).date_naive();
    Ok(start <= local_date && local_date <= end)
}

fn parse_time(value: Option<&Value>, field: &str) -> Result<NaiveTime, String> {
    let raw = value
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing {field}"))?;
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|e| format!("bad {field} '{raw}': {e}"))
}

fn parse_date(value: Option<&Value>, field: &str) -> Result<NaiveDate, String> {
    let raw = value
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing {field}"))?;

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    // Also accept a full timestamp and take its date part.
    raw.parse::<DateTime<Utc>>()
        .map(|dt| dt.date_naive())
        .map_err(|e| format!("bad {field} '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn utc() -> Tz {
        chrono_tz::UTC
    }

    // 2026-03-02 is a Monday.
    fn monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    #[test]
    fn always_admits() {
        assert_eq!(is_scheduled("always", None, monday_at(3, 0), utc()), Ok(true));
    }

    #[test]
    fn time_window_hours() {
        let config = serde_json::json!({"start_time": "08:00", "end_time": "17:00"});

        assert_eq!(
            is_scheduled("time_window", Some(&config), monday_at(9, 30), utc()),
            Ok(true)
        );
        assert_eq!(
            is_scheduled("time_window", Some(&config), monday_at(7, 59), utc()),
            Ok(false)
        );
        // Bounds are inclusive.
        assert_eq!(
            is_scheduled("time_window", Some(&config), monday_at(17, 0), utc()),
            Ok(true)
        );
    }

    #[test]
    fn time_window_weekdays() {
        let config = serde_json::json!({
            "start_time": "00:00", "end_time": "23:59", "days": [1, 2, 3, 4, 5]
        });

        assert_eq!(
            is_scheduled("time_window", Some(&config), monday_at(12, 0), utc()),
            Ok(true)
        );
        // 2026-03-01 is a Sunday.
        let sunday = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            is_scheduled("time_window", Some(&config), sunday, utc()),
            Ok(false)
        );
    }

    #[test]
    fn time_window_respects_tenant_timezone() {
        let config = serde_json::json!({"start_time": "08:00", "end_time": "17:00"});
        let manila: Tz = "Asia/Manila".parse().unwrap();

        // 02:00 UTC is 10:00 in Manila (UTC+8): inside the window there,
        // outside it in UTC.
        let ts = monday_at(2, 0);
        assert_eq!(is_scheduled("time_window", Some(&config), ts, manila), Ok(true));
        assert_eq!(is_scheduled("time_window", Some(&config), ts, utc()), Ok(false));
    }

    #[test]
    fn date_range_inclusive() {
        let config = serde_json::json!({"start_date": "2026-03-01", "end_date": "2026-03-31"});

        assert_eq!(
            is_scheduled("date_range", Some(&config), monday_at(12, 0), utc()),
            Ok(true)
        );

        let april = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(
            is_scheduled("date_range", Some(&config), april, utc()),
            Ok(false)
        );
    }

    #[test]
    fn malformed_config_reports_error() {
        assert!(is_scheduled("time_window", None, monday_at(9, 0), utc()).is_err());

        let bad = serde_json::json!({"start_time": "8am", "end_time": "17:00"});
        assert!(is_scheduled("time_window", Some(&bad), monday_at(9, 0), utc()).is_err());

        let missing = serde_json::json!({"start_date": "2026-03-01"});
        assert!(is_scheduled("date_range", Some(&missing), monday_at(9, 0), utc()).is_err());
    }

    #[test]
    fn unknown_schedule_type_admits() {
        assert_eq!(
            is_scheduled("lunar_phase", None, monday_at(9, 0), utc()),
            Ok(true)
        );
    }
}
