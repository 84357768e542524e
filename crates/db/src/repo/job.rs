//! Analytics job records and their lifecycle transitions.
//!
//! Status moves `pending → running → (complete | failed)`; the worker owns
//! every transition after creation.

use chrono::{DateTime, Utc};
use sqlx::types::Uuid;
use sqlx::PgPool;
use tracing::info;

use crate::error::DbError;
use crate::models::AnalyticsJob;

const COLUMNS: &str = "id, factory_id, created_by, job_type, device_ids, date_range_start, \
                       date_range_end, status, result_url, error_message, started_at, \
                       completed_at, created_at";

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    job_id: Uuid,
    factory_id: i64,
    created_by: Option<i64>,
    job_type: &str,
    device_ids: &[i64],
    date_range_start: DateTime<Utc>,
    date_range_end: DateTime<Utc>,
) -> Result<AnalyticsJob, DbError> {
    let job = sqlx::query_as::<_, AnalyticsJob>(&format!(
        "INSERT INTO analytics_jobs
             (id, factory_id, created_by, job_type, device_ids,
              date_range_start, date_range_end, status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', NOW())
         RETURNING {COLUMNS}"
    ))
    .bind(job_id)
    .bind(factory_id)
    .bind(created_by)
    .bind(job_type)
    .bind(serde_json::json!(device_ids))
    .bind(date_range_start)
    .bind(date_range_end)
    .fetch_one(pool)
    .await?;

    Ok(job)
}

pub async fn get(
    pool: &PgPool,
    factory_id: i64,
    job_id: Uuid,
) -> Result<Option<AnalyticsJob>, DbError> {
    let job = sqlx::query_as::<_, AnalyticsJob>(&format!(
        "SELECT {COLUMNS} FROM analytics_jobs WHERE factory_id = $1 AND id = $2"
    ))
    .bind(factory_id)
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

/// Queue-side load: the task payload carries only the opaque job id, so this
/// is the one read without an explicit tenant filter.
pub async fn get_for_worker(pool: &PgPool, job_id: Uuid) -> Result<Option<AnalyticsJob>, DbError> {
    let job = sqlx::query_as::<_, AnalyticsJob>(&format!(
        "SELECT {COLUMNS} FROM analytics_jobs WHERE id = $1"
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

pub async fn list(
    pool: &PgPool,
    factory_id: i64,
    status: Option<&str>,
    job_type: Option<&str>,
    page: i64,
    per_page: i64,
) -> Result<(Vec<AnalyticsJob>, i64), DbError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM analytics_jobs
         WHERE factory_id = $1
           AND ($2::text IS NULL OR status = $2)
           AND ($3::text IS NULL OR job_type = $3)",
    )
    .bind(factory_id)
    .bind(status)
    .bind(job_type)
    .fetch_one(pool)
    .await?;

    let jobs = sqlx::query_as::<_, AnalyticsJob>(&format!(
        "SELECT {COLUMNS} FROM analytics_jobs
         WHERE factory_id = $1
           AND ($2::text IS NULL OR status = $2)
           AND ($3::text IS NULL OR job_type = $3)
         ORDER BY created_at DESC
         OFFSET $4 LIMIT $5"
    ))
    .bind(factory_id)
    .bind(status)
    .bind(job_type)
    .bind((page - 1) * per_page)
    .bind(per_page)
    .fetch_all(pool)
    .await?;

    Ok((jobs, total))
}

pub async fn mark_running(pool: &PgPool, job_id: Uuid) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE analytics_jobs
         SET status = 'running', started_at = COALESCE(started_at, NOW())
         WHERE id = $1",
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    info!(job_id = %job_id, status = "running", "analytics job status updated");
    Ok(())
}

pub async fn mark_complete(pool: &PgPool, job_id: Uuid, result_url: &str) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE analytics_jobs
         SET status = 'complete', completed_at = NOW(), result_url = $2
         WHERE id = $1",
    )
    .bind(job_id)
    .bind(result_url)
    .execute(pool)
    .await?;

    info!(job_id = %job_id, status = "complete", "analytics job status updated");
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, job_id: Uuid, error_message: &str) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE analytics_jobs
         SET status = 'failed', completed_at = NOW(), error_message = $2
         WHERE id = $1",
    )
    .bind(job_id)
    .bind(error_message)
    .execute(pool)
    .await?;

    info!(job_id = %job_id, status = "failed", "analytics job status updated");
    Ok(())
}

/// Delete a job while it is still deletable (`pending` or `failed`).
/// Returns `false` when the row was absent or already running/complete.
pub async fn delete(pool: &PgPool, factory_id: i64, job_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "DELETE FROM analytics_jobs
         WHERE factory_id = $1 AND id = $2 AND status IN ('pending', 'failed')",
    )
    .bind(factory_id)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
