//! Alert history and per-(rule, device) cooldown rows.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::error::DbError;
use crate::models::{Alert, AlertContext};

const COLUMNS: &str = "id, factory_id, rule_id, device_id, triggered_at, resolved_at, \
                       severity, message, telemetry_snapshot, notification_sent, created_at";

/// Insert a fired alert; severity is the value copied from the rule at
/// firing time, so later rule edits do not mutate history.
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    pool: &PgPool,
    factory_id: i64,
    rule_id: i64,
    device_id: i64,
    triggered_at: DateTime<Utc>,
    severity: &str,
    message: &str,
    telemetry_snapshot: &serde_json::Value,
) -> Result<i64, DbError> {
    let row = sqlx::query(
        "INSERT INTO alerts
             (factory_id, rule_id, device_id, triggered_at, severity, message,
              telemetry_snapshot, notification_sent, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, NOW())
         RETURNING id",
    )
    .bind(factory_id)
    .bind(rule_id)
    .bind(device_id)
    .bind(triggered_at)
    .bind(severity)
    .bind(message)
    .bind(telemetry_snapshot)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

pub async fn get_by_id(
    pool: &PgPool,
    factory_id: i64,
    alert_id: i64,
) -> Result<Option<Alert>, DbError> {
    let alert = sqlx::query_as::<_, Alert>(&format!(
        "SELECT {COLUMNS} FROM alerts WHERE factory_id = $1 AND id = $2"
    ))
    .bind(factory_id)
    .bind(alert_id)
    .fetch_optional(pool)
    .await?;

    Ok(alert)
}

/// Paginated alert history with optional device / severity / resolution /
/// time-range filters, newest first.
#[allow(clippy::too_many_arguments)]
pub async fn list(
    pool: &PgPool,
    factory_id: i64,
    device_id: Option<i64>,
    severity: Option<&str>,
    resolved: Option<bool>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Alert>, i64), DbError> {
    const FILTER: &str = "factory_id = $1
           AND ($2::bigint IS NULL OR device_id = $2)
           AND ($3::text IS NULL OR severity = $3)
           AND ($4::boolean IS NULL OR (resolved_at IS NOT NULL) = $4)
           AND ($5::timestamptz IS NULL OR triggered_at >= $5)
           AND ($6::timestamptz IS NULL OR triggered_at <= $6)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM alerts WHERE {FILTER}"))
        .bind(factory_id)
        .bind(device_id)
        .bind(severity)
        .bind(resolved)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

    let alerts = sqlx::query_as::<_, Alert>(&format!(
        "SELECT {COLUMNS} FROM alerts
         WHERE {FILTER}
         ORDER BY triggered_at DESC
         OFFSET $7 LIMIT $8"
    ))
    .bind(factory_id)
    .bind(device_id)
    .bind(severity)
    .bind(resolved)
    .bind(start)
    .bind(end)
    .bind((page - 1) * per_page)
    .bind(per_page)
    .fetch_all(pool)
    .await?;

    Ok((alerts, total))
}

/// Count of active (unresolved) alerts for a factory. "Active" means
/// `resolved_at IS NULL`; dashboard counts standardize on this definition.
pub async fn active_count(pool: &PgPool, factory_id: i64) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM alerts WHERE factory_id = $1 AND resolved_at IS NULL",
    )
    .bind(factory_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Active-alert counts grouped by severity.
pub async fn severity_counts(
    pool: &PgPool,
    factory_id: i64,
) -> Result<Vec<(String, i64)>, DbError> {
    let counts = sqlx::query_as::<_, (String, i64)>(
        "SELECT severity, COUNT(*) FROM alerts
         WHERE factory_id = $1 AND resolved_at IS NULL
         GROUP BY severity",
    )
    .bind(factory_id)
    .fetch_all(pool)
    .await?;

    Ok(counts)
}

/// Mark an alert resolved. Idempotent: re-resolving keeps the original
/// resolution time. Returns the resolution timestamp, or `None` when the
/// alert does not exist in this factory.
pub async fn resolve(
    pool: &PgPool,
    factory_id: i64,
    alert_id: i64,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let row = sqlx::query(
        "UPDATE alerts
         SET resolved_at = COALESCE(resolved_at, NOW())
         WHERE factory_id = $1 AND id = $2
         RETURNING resolved_at",
    )
    .bind(factory_id)
    .bind(alert_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("resolved_at")))
}

/// Last trigger time for `(rule_id, device_id)`, if the rule has ever fired
/// for that device.
pub async fn get_cooldown(
    pool: &PgPool,
    rule_id: i64,
    device_id: i64,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let row = sqlx::query(
        "SELECT last_triggered FROM rule_cooldowns WHERE rule_id = $1 AND device_id = $2",
    )
    .bind(rule_id)
    .bind(device_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("last_triggered")))
}

/// Record a fire time, creating the cooldown row on first trigger.
pub async fn upsert_cooldown(
    pool: &PgPool,
    rule_id: i64,
    device_id: i64,
    triggered_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO rule_cooldowns (rule_id, device_id, last_triggered)
         VALUES ($1, $2, $3)
         ON CONFLICT (rule_id, device_id)
         DO UPDATE SET last_triggered = EXCLUDED.last_triggered",
    )
    .bind(rule_id)
    .bind(device_id)
    .bind(triggered_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Alerts triggered inside `[start, end]` for the given devices, newest first.
pub async fn in_range(
    pool: &PgPool,
    factory_id: i64,
    device_ids: &[i64],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Alert>, DbError> {
    let alerts = sqlx::query_as::<_, Alert>(&format!(
        "SELECT {COLUMNS} FROM alerts
         WHERE factory_id = $1
           AND device_id = ANY($2)
           AND triggered_at >= $3
           AND triggered_at <= $4
         ORDER BY triggered_at DESC"
    ))
    .bind(factory_id)
    .bind(device_ids)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(alerts)
}

/// Load an alert joined with its rule and device names for presentation.
pub async fn get_context(pool: &PgPool, alert_id: i64) -> Result<Option<AlertContext>, DbError> {
    let alert = sqlx::query_as::<_, AlertContext>(
        "SELECT a.id, a.factory_id, a.rule_id, a.device_id, a.triggered_at,
                a.severity, a.message, a.telemetry_snapshot,
                r.name AS rule_name, d.name AS device_name, d.device_key AS device_key
         FROM alerts a
         LEFT JOIN rules r ON r.id = a.rule_id
         LEFT JOIN devices d ON d.id = a.device_id
         WHERE a.id = $1",
    )
    .bind(alert_id)
    .fetch_optional(pool)
    .await?;

    Ok(alert)
}

pub async fn mark_notification_sent(pool: &PgPool, alert_id: i64) -> Result<(), DbError> {
    sqlx::query("UPDATE alerts SET notification_sent = TRUE WHERE id = $1")
        .bind(alert_id)
        .execute(pool)
        .await?;

    Ok(())
}
