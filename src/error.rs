/*
 * Responsibility
 * - Application-wide AppError
 * - IntoResponse (HTTP status + JSON error body in the shape the frontend already parses: `message` + `code`)
 * - Upstream transport failures keep their own `{"error": ...}` body
 */
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::services::upstream::ProxyError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: &'static str,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },

    /// API callers: 401 JSON.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Browser navigation: redirect to the login location.
    #[error("login required")]
    LoginRedirect { location: String },

    #[error("forbidden")]
    Forbidden,

    #[error("csrf token mismatch")]
    CsrfMismatch,

    #[error("upstream unreachable: {0}")]
    Upstream(String),

    #[error("internal server error")]
    Internal,
}

/// Status used for CSRF mismatches ("page expired").
pub fn csrf_mismatch_status() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::FORBIDDEN)
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Unauthenticated.".into(),
            ),
            AppError::LoginRedirect { location } => {
                return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
            }
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "This action is unauthorized.".into(),
            ),
            AppError::CsrfMismatch => (
                csrf_mismatch_status(),
                "CSRF_TOKEN_MISMATCH",
                "CSRF token mismatch.".into(),
            ),
            AppError::Upstream(message) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response();
            }
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
            ),
        };

        (status, Json(ErrorResponse { message, code })).into_response()
    }
}

impl From<ProxyError> for AppError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::InvalidTarget => AppError::bad_request("INVALID_PROXY_PATH", e.to_string()),
            ProxyError::Transport(_) => AppError::Upstream(e.to_string()),
            ProxyError::Client(_) => AppError::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_is_machine_readable() {
        let response = AppError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Unauthenticated.", "code": "UNAUTHENTICATED" })
        );
    }

    #[tokio::test]
    async fn csrf_mismatch_uses_419() {
        let response = AppError::CsrfMismatch.into_response();
        assert_eq!(response.status().as_u16(), 419);
    }

    #[tokio::test]
    async fn forbidden_carries_no_detail() {
        let response = AppError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "This action is unauthorized.", "code": "FORBIDDEN" })
        );
    }

    #[tokio::test]
    async fn login_redirect_points_at_location() {
        let response = AppError::LoginRedirect {
            location: "/login".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
    }

    #[tokio::test]
    async fn upstream_failure_reports_reason_under_error_key() {
        let response = AppError::Upstream("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({ "error": "connection refused" }));
    }
}
