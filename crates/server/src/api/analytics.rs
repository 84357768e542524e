//! Analytics job endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use plantops_db::models::{AnalyticsJob, JobStatus, JobType};
use plantops_db::repo;
use plantops_queue::{RunAnalyticsJob, TaskEnvelope, QUEUE_ANALYTICS, TASK_RUN_ANALYTICS_JOB};

use crate::state::AppState;

use super::common::{clamp_pagination, ApiError, ApiResult, TenantContext};

#[derive(Debug, Deserialize)]
pub struct AnalyticsJobCreate {
    pub job_type: String,
    pub device_ids: Vec<i64>,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub status: Option<String>,
    pub job_type: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// POST /api/v1/analytics/jobs — create a job and dispatch it. Returns 202
/// immediately; the job runs asynchronously.
pub async fn create(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Json(body): Json<AnalyticsJobCreate>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let Some(job_type) = JobType::parse(&body.job_type) else {
        return Err(ApiError::bad_request(format!(
            "invalid job_type '{}'",
            body.job_type
        )));
    };

    if body.date_range_end <= body.date_range_start {
        return Err(ApiError::bad_request(
            "date_range_end must be after date_range_start",
        ));
    }

    if body.device_ids.is_empty() {
        return Err(ApiError::bad_request("at least one device must be selected"));
    }

    let job_id = Uuid::new_v4();
    repo::job::create(
        &state.pool,
        job_id,
        tenant.factory_id,
        tenant.user_id,
        job_type.as_str(),
        &body.device_ids,
        body.date_range_start,
        body.date_range_end,
    )
    .await
    .map_err(ApiError::internal)?;

    let envelope = TaskEnvelope::new(TASK_RUN_ANALYTICS_JOB, &RunAnalyticsJob { job_id })
        .map_err(ApiError::internal)?;
    state
        .broker
        .enqueue(QUEUE_ANALYTICS, &envelope)
        .await
        .map_err(ApiError::internal)?;

    tracing::info!(
        job_id = %job_id,
        factory_id = tenant.factory_id,
        job_type = job_type.as_str(),
        "analytics job dispatched"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "job_id": job_id,
            "status": JobStatus::Pending.as_str(),
        })),
    ))
}

/// GET /api/v1/analytics/jobs — list with optional status / type filters.
pub async fn list(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(ref status) = query.status {
        if JobStatus::parse(status).is_none() {
            return Err(ApiError::bad_request(format!("invalid status '{status}'")));
        }
    }
    if let Some(ref job_type) = query.job_type {
        if JobType::parse(job_type).is_none() {
            return Err(ApiError::bad_request(format!(
                "invalid job_type '{job_type}'"
            )));
        }
    }

    let (page, per_page) = clamp_pagination(query.page, query.per_page);
    let (jobs, total) = repo::job::list(
        &state.pool,
        tenant.factory_id,
        query.status.as_deref(),
        query.job_type.as_deref(),
        page,
        per_page,
    )
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(serde_json::json!({
        "data": jobs,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

/// GET /api/v1/analytics/jobs/{id} — status poll. `result_url` appears once
/// complete, `error_message` once failed.
pub async fn get(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<AnalyticsJob>> {
    let job = repo::job::get(&state.pool, tenant.factory_id, job_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("job"))?;

    Ok(Json(job))
}

/// DELETE /api/v1/analytics/jobs/{id} — cancel. Only `pending` and `failed`
/// jobs are deletable; anything else is 400.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Path(job_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let job = repo::job::get(&state.pool, tenant.factory_id, job_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("job"))?;

    let deletable = job.status().is_some_and(|s| s.is_deletable());
    if !deletable {
        return Err(ApiError::bad_request(format!(
            "cannot delete job with status '{}'; only pending or failed jobs can be deleted",
            job.status
        )));
    }

    let deleted = repo::job::delete(&state.pool, tenant.factory_id, job_id)
        .await
        .map_err(ApiError::internal)?;
    if !deleted {
        // Raced with the worker picking it up.
        return Err(ApiError::bad_request("job is no longer deletable"));
    }

    tracing::info!(job_id = %job_id, factory_id = tenant.factory_id, "analytics job cancelled");
    Ok(StatusCode::NO_CONTENT)
}
