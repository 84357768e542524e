//! Report records; same lifecycle contract as analytics jobs.

use chrono::{DateTime, Utc};
use sqlx::types::Uuid;
use sqlx::PgPool;
use tracing::info;

use crate::error::DbError;
use crate::models::Report;

const COLUMNS: &str = "id, factory_id, created_by, title, device_ids, date_range_start, \
                       date_range_end, format, include_analytics, analytics_job_id, status, \
                       file_url, file_size_bytes, error_message, started_at, completed_at, \
                       expires_at, created_at";

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    report_id: Uuid,
    factory_id: i64,
    created_by: Option<i64>,
    title: Option<&str>,
    device_ids: &[i64],
    date_range_start: DateTime<Utc>,
    date_range_end: DateTime<Utc>,
    format: &str,
    include_analytics: bool,
    analytics_job_id: Option<Uuid>,
    expires_at: DateTime<Utc>,
) -> Result<Report, DbError> {
    let report = sqlx::query_as::<_, Report>(&format!(
        "INSERT INTO reports
             (id, factory_id, created_by, title, device_ids, date_range_start,
              date_range_end, format, include_analytics, analytics_job_id,
              status, expires_at, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11, NOW())
         RETURNING {COLUMNS}"
    ))
    .bind(report_id)
    .bind(factory_id)
    .bind(created_by)
    .bind(title)
    .bind(serde_json::json!(device_ids))
    .bind(date_range_start)
    .bind(date_range_end)
    .bind(format)
    .bind(include_analytics)
    .bind(analytics_job_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(report)
}

pub async fn get(
    pool: &PgPool,
    factory_id: i64,
    report_id: Uuid,
) -> Result<Option<Report>, DbError> {
    let report = sqlx::query_as::<_, Report>(&format!(
        "SELECT {COLUMNS} FROM reports WHERE factory_id = $1 AND id = $2"
    ))
    .bind(factory_id)
    .bind(report_id)
    .fetch_optional(pool)
    .await?;

    Ok(report)
}

/// Queue-side load by opaque id (see `job::get_for_worker`).
pub async fn get_for_worker(pool: &PgPool, report_id: Uuid) -> Result<Option<Report>, DbError> {
    let report = sqlx::query_as::<_, Report>(&format!(
        "SELECT {COLUMNS} FROM reports WHERE id = $1"
    ))
    .bind(report_id)
    .fetch_optional(pool)
    .await?;

    Ok(report)
}

pub async fn list(
    pool: &PgPool,
    factory_id: i64,
    status: Option<&str>,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Report>, i64), DbError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reports
         WHERE factory_id = $1 AND ($2::text IS NULL OR status = $2)",
    )
    .bind(factory_id)
    .bind(status)
    .fetch_one(pool)
    .await?;

    let reports = sqlx::query_as::<_, Report>(&format!(
        "SELECT {COLUMNS} FROM reports
         WHERE factory_id = $1 AND ($2::text IS NULL OR status = $2)
         ORDER BY created_at DESC
         OFFSET $3 LIMIT $4"
    ))
    .bind(factory_id)
    .bind(status)
    .bind((page - 1) * per_page)
    .bind(per_page)
    .fetch_all(pool)
    .await?;

    Ok((reports, total))
}

pub async fn mark_running(pool: &PgPool, report_id: Uuid) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE reports
         SET status = 'running', started_at = COALESCE(started_at, NOW())
         WHERE id = $1",
    )
    .bind(report_id)
    .execute(pool)
    .await?;

    info!(report_id = %report_id, status = "running", "report status updated");
    Ok(())
}

pub async fn mark_complete(
    pool: &PgPool,
    report_id: Uuid,
    file_url: &str,
    file_size_bytes: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE reports
         SET status = 'complete', completed_at = NOW(), file_url = $2, file_size_bytes = $3
         WHERE id = $1",
    )
    .bind(report_id)
    .bind(file_url)
    .bind(file_size_bytes)
    .execute(pool)
    .await?;

    info!(report_id = %report_id, status = "complete", "report status updated");
    Ok(())
}

pub async fn mark_failed(
    pool: &PgPool,
    report_id: Uuid,
    error_message: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE reports
         SET status = 'failed', completed_at = NOW(), error_message = $2
         WHERE id = $1",
    )
    .bind(report_id)
    .bind(error_message)
    .execute(pool)
    .await?;

    info!(report_id = %report_id, status = "failed", "report status updated");
    Ok(())
}

/// Delete a report while it is still deletable (`pending` or `failed`).
pub async fn delete(pool: &PgPool, factory_id: i64, report_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "DELETE FROM reports
         WHERE factory_id = $1 AND id = $2 AND status IN ('pending', 'failed')",
    )
    .bind(factory_id)
    .bind(report_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
