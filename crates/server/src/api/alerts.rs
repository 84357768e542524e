//! Alert history endpoints: filtered listing, detail, the dashboard
//! summary, and resolution.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use plantops_db::models::{Alert, Severity};
use plantops_db::repo;

use crate::state::AppState;

use super::common::{clamp_pagination, ApiError, ApiResult, TenantContext};

#[derive(Debug, Deserialize)]
pub struct AlertListQuery {
    pub device_id: Option<i64>,
    pub severity: Option<String>,
    pub resolved: Option<bool>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// GET /api/v1/alerts — list with device / severity / resolution /
/// time-range filters.
pub async fn list(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Query(query): Query<AlertListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(ref severity) = query.severity {
        if Severity::parse(severity).is_none() {
            return Err(ApiError::bad_request(format!(
                "invalid severity '{severity}'"
            )));
        }
    }

    let (page, per_page) = clamp_pagination(query.page, query.per_page);
    let (alerts, total) = repo::alert::list(
        &state.pool,
        tenant.factory_id,
        query.device_id,
        query.severity.as_deref(),
        query.resolved,
        query.start,
        query.end,
        page,
        per_page,
    )
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(serde_json::json!({
        "data": alerts,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

/// GET /api/v1/alerts/summary — active-alert count (`resolved_at IS NULL`)
/// plus per-severity counts for the dashboard.
pub async fn summary(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
) -> ApiResult<Json<serde_json::Value>> {
    let active = repo::alert::active_count(&state.pool, tenant.factory_id)
        .await
        .map_err(ApiError::internal)?;
    let counts = repo::alert::severity_counts(&state.pool, tenant.factory_id)
        .await
        .map_err(ApiError::internal)?;

    let mut by_severity = serde_json::Map::new();
    for severity in ["critical", "high", "medium", "low"] {
        let count = counts
            .iter()
            .find(|(s, _)| s == severity)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        by_severity.insert(severity.to_string(), count.into());
    }

    Ok(Json(serde_json::json!({
        "active": active,
        "by_severity": by_severity,
    })))
}

/// GET /api/v1/alerts/{id} — alert detail.
pub async fn get(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Path(alert_id): Path<i64>,
) -> ApiResult<Json<Alert>> {
    let alert = repo::alert::get_by_id(&state.pool, tenant.factory_id, alert_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("alert"))?;

    Ok(Json(alert))
}

/// PATCH /api/v1/alerts/{id}/resolve — mark an alert resolved. Idempotent;
/// the first resolution time sticks.
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    tenant: TenantContext,
    Path(alert_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let resolved_at = repo::alert::resolve(&state.pool, tenant.factory_id, alert_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("alert"))?;

    tracing::info!(alert_id, factory_id = tenant.factory_id, "alert resolved");

    Ok(Json(serde_json::json!({
        "id": alert_id,
        "resolved_at": resolved_at,
    })))
}
