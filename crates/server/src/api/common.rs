//! Shared handler plumbing: error responses, tenant extraction, pagination.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub type ApiResult<T> = Result<T, ApiError>;

/// A status code plus a JSON `{"detail": …}` body.
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: format!("{what} not found"),
        }
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "internal error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

/// Caller identity injected by the upstream auth layer.
///
/// `X-Factory-Id` is mandatory; `X-User-Id` is recorded as the creator when
/// present.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub factory_id: i64,
    pub user_id: Option<i64>,
}

impl<S: Send + Sync> FromRequestParts<S> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let factory_id = parts
            .headers
            .get("x-factory-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or(ApiError {
                status: StatusCode::UNAUTHORIZED,
                detail: "missing or invalid X-Factory-Id header".to_string(),
            })?;

        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        Ok(TenantContext {
            factory_id,
            user_id,
        })
    }
}

/// Normalize list pagination: page ≥ 1, per_page in [1, 100], defaults
/// (1, 20).
pub fn clamp_pagination(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    (
        page.unwrap_or(1).max(1),
        per_page.unwrap_or(20).clamp(1, 100),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_bounds() {
        assert_eq!(clamp_pagination(None, None), (1, 20));
        assert_eq!(clamp_pagination(Some(0), Some(1000)), (1, 100));
        assert_eq!(clamp_pagination(Some(3), Some(25)), (3, 25));
    }
}
