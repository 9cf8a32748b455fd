/*
 * Responsibility
 * - App-wide AppError definition
 * - IntoResponse implementation (HTTP status / JSON error body)
 * - Uniform conversion from the module errors (authz, roles, cache)
 *
 * Notes
 * - Denials and authentication failures respond with generic bodies; the
 *   interesting detail (tried permissions, resolver errors) is logged by
 *   the layer that produced it, never echoed to the caller.
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::authz::{AuthzError, PermissionError};
use crate::services::cache::CacheError;
use crate::services::roles::ResolutionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponseBody {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = ErrorResponseBody {
            error: ErrorBody {
                code,
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthzError> for AppError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::NotAuthenticated { .. } => AppError::Unauthorized,
            // Authority/cache trouble denies the request (fail closed),
            // surfaced as an authorization failure rather than a 500 that
            // would suggest the caller did something wrong.
            AuthzError::Authority(err) => {
                tracing::warn!(error = %err, "authorization authority failure");
                AppError::Unauthorized
            }
            AuthzError::Cache(err) => {
                tracing::error!(error = %err, "authorization cache failure");
                AppError::Internal
            }
            // Querying before load is a wiring bug, not a client error.
            AuthzError::NotLoaded => {
                tracing::error!("permission query before authorization data was loaded");
                AppError::Internal
            }
        }
    }
}

impl From<PermissionError> for AppError {
    fn from(e: PermissionError) -> Self {
        match e {
            // Already logged with the tried list at the denial site.
            PermissionError::Denied { .. } => AppError::Forbidden,
            PermissionError::Authz(err) => err.into(),
        }
    }
}

impl From<ResolutionError> for AppError {
    fn from(e: ResolutionError) -> Self {
        // Role resolution failure fails the whole authorization check for
        // the request; there is no "grant nothing" fallback.
        tracing::warn!(error = %e, "role resolution failed");
        AppError::Unauthorized
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        tracing::error!(error = %e, "cache failure");
        AppError::Internal
    }
}
