//! Report endpoints, including the presigned-URL download redirect.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use plantops_db::models::{JobStatus, Report, ReportFormat};
use plantops_db::repo;
use plantops_queue::{GenerateReport, TaskEnvelope, QUEUE_REPORTING, TASK_GENERATE_REPORT};

use crate::state::AppState;

use super::common::{clamp_pagination, ApiError, ApiResult, TenantContext};

/// Default artifact retention.
const EXPIRY_DAYS: i64 = 90;

#[derive(Debug, Deserialize)]
pub struct ReportCreate {
    pub title: Option<String>,
    pub device_ids: Vec<i64>,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
    pub format: String,
    #[serde(default)]
    pub include_analytics: bool,
    pub analytics_job_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// POST /api/v1/reports — create a report row and dispatch generation.
pub async fn create(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Json(body): Json<ReportCreate>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let Some(format) = ReportFormat::parse(&body.format) else {
        return Err(ApiError::bad_request(format!(
            "invalid format '{}'",
            body.format
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

    let report_id = Uuid::new_v4();
    repo::report::create(
        &state.pool,
        report_id,
        tenant.factory_id,
        tenant.user_id,
        body.title.as_deref(),
        &body.device_ids,
        body.date_range_start,
        body.date_range_end,
        format.as_str(),
        body.include_analytics,
        body.analytics_job_id,
        Utc::now() + Duration::days(EXPIRY_DAYS),
    )
    .await
    .map_err(ApiError::internal)?;

    let envelope = TaskEnvelope::new(TASK_GENERATE_REPORT, &GenerateReport { report_id })
        .map_err(ApiError::internal)?;
    state
        .broker
        .enqueue(QUEUE_REPORTING, &envelope)
        .await
        .map_err(ApiError::internal)?;

    tracing::info!(
        report_id = %report_id,
        factory_id = tenant.factory_id,
        format = format.as_str(),
        "report dispatched"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "report_id": report_id,
            "status": JobStatus::Pending.as_str(),
        })),
    ))
}

/// GET /api/v1/reports — list with optional status filter.
pub async fn list(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(ref status) = query.status {
        if JobStatus::parse(status).is_none() {
            return Err(ApiError::bad_request(format!("invalid status '{status}'")));
        }
    }

    let (page, per_page) = clamp_pagination(query.page, query.per_page);
    let (reports, total) = repo::report::list(
        &state.pool,
        tenant.factory_id,
        query.status.as_deref(),
        page,
        per_page,
    )
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(serde_json::json!({
        "data": reports,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

/// GET /api/v1/reports/{id} — status poll.
pub async fn get(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Path(report_id): Path<Uuid>,
) -> ApiResult<Json<Report>> {
    let report = repo::report::get(&state.pool, tenant.factory_id, report_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("report"))?;

    Ok(Json(report))
}

/// GET /api/v1/reports/{id}/download — 302 to the presigned artifact URL
/// once complete; 400 with the current status before that.
pub async fn download(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Path(report_id): Path<Uuid>,
) -> ApiResult<Response> {
    let report = repo::report::get(&state.pool, tenant.factory_id, report_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("report"))?;

    match (report.status(), report.file_url) {
        (Some(JobStatus::Complete), Some(url)) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
        }
        _ => Err(ApiError::bad_request(format!(
            "report is not ready for download (status '{}')",
            report.status
        ))),
    }
}

/// DELETE /api/v1/reports/{id} — cancel while `pending` or `failed`.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Path(report_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let report = repo::report::get(&state.pool, tenant.factory_id, report_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("report"))?;

    let deletable = report.status().is_some_and(|s| s.is_deletable());
    if !deletable {
        return Err(ApiError::bad_request(format!(
            "cannot delete report with status '{}'; only pending or failed reports can be deleted",
            report.status
        )));
    }

    let deleted = repo::report::delete(&state.pool, tenant.factory_id, report_id)
        .await
        .map_err(ApiError::internal)?;
    if !deleted {
        return Err(ApiError::bad_request("report is no longer deletable"));
    }

    tracing::info!(report_id = %report_id, factory_id = tenant.factory_id, "report cancelled");
    Ok(StatusCode::NO_CONTENT)
}
