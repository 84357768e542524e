//! Measurement channel ("parameter") discovery.

use sqlx::{PgPool, Row};

use crate::error::DbError;

/// Idempotent parameter upsert, safe to call on every message.
///
/// Returns `true` when the row was newly inserted. The unique
/// `(device_id, parameter_key)` index makes this safe under concurrent
/// writers; conflicts only bump `updated_at`.
pub async fn upsert(
    pool: &PgPool,
    factory_id: i64,
    device_id: i64,
    parameter_key: &str,
    display_name: &str,
    data_type: &str,
) -> Result<bool, DbError> {
    let row = sqlx::query(
        "INSERT INTO device_parameters
             (factory_id, device_id, parameter_key, display_name, data_type,
              is_kpi_selected, discovered_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, TRUE, NOW(), NOW())
         ON CONFLICT (device_id, parameter_key)
         DO UPDATE SET updated_at = NOW()
         RETURNING (xmax = 0) AS inserted",
    )
    .bind(factory_id)
    .bind(device_id)
    .bind(parameter_key)
    .bind(display_name)
    .bind(data_type)
    .fetch_one(pool)
    .await?;

    Ok(row.get("inserted"))
}
