//! Device lookups, auto-registration, and liveness updates.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::error::DbError;
use crate::models::Device;

const COLUMNS: &str = "id, factory_id, device_key, name, manufacturer, model, region, \
                       api_key, is_active, last_seen, created_at, updated_at";

pub async fn get_by_key(
    pool: &PgPool,
    factory_id: i64,
    device_key: &str,
) -> Result<Option<Device>, DbError> {
    let device = sqlx::query_as::<_, Device>(&format!(
        "SELECT {COLUMNS} FROM devices WHERE factory_id = $1 AND device_key = $2"
    ))
    .bind(factory_id)
    .bind(device_key)
    .fetch_optional(pool)
    .await?;

    Ok(device)
}

pub async fn get_by_id(
    pool: &PgPool,
    factory_id: i64,
    device_id: i64,
) -> Result<Option<Device>, DbError> {
    let device = sqlx::query_as::<_, Device>(&format!(
        "SELECT {COLUMNS} FROM devices WHERE factory_id = $1 AND id = $2"
    ))
    .bind(factory_id)
    .bind(device_id)
    .fetch_optional(pool)
    .await?;

    Ok(device)
}

/// Auto-register a device seen for the first time on the ingest path.
///
/// Safe under concurrent writers: the unique `(factory_id, device_key)` index
/// makes the insert a no-op on conflict, and the loser falls back to a read.
pub async fn get_or_create(
    pool: &PgPool,
    factory_id: i64,
    device_key: &str,
) -> Result<Device, DbError> {
    if let Some(device) = get_by_key(pool, factory_id, device_key).await? {
        return Ok(device);
    }

    let inserted = sqlx::query_as::<_, Device>(&format!(
        "INSERT INTO devices (factory_id, device_key, is_active)
         VALUES ($1, $2, TRUE)
         ON CONFLICT (factory_id, device_key) DO NOTHING
         RETURNING {COLUMNS}"
    ))
    .bind(factory_id)
    .bind(device_key)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(device) => {
            info!(
                factory_id,
                device_id = device.id,
                device_key,
                "device auto-registered"
            );
            Ok(device)
        }
        // Lost the race: another writer inserted it first.
        None => get_by_key(pool, factory_id, device_key)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("device {factory_id}/{device_key}"))),
    }
}

/// Advance `last_seen` to `seen_at` without ever rewinding it.
///
/// Out-of-order messages leave the column unchanged; concurrent updates are
/// last-writer-wins on equal timestamps, which is acceptable.
pub async fn touch_last_seen(
    pool: &PgPool,
    device_id: i64,
    seen_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE devices
         SET last_seen = GREATEST(COALESCE(last_seen, $2), $2), updated_at = NOW()
         WHERE id = $1",
    )
    .bind(device_id)
    .bind(seen_at)
    .execute(pool)
    .await?;

    Ok(())
}
