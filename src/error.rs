use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Request-path error taxonomy.
///
/// `NotFound` deliberately covers unknown, expired, and tombstoned
/// identifiers alike so callers cannot probe for deleted content.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("identifier allocation retries exhausted")]
    AllocationExhausted,

    #[error("paste store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
        }
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        match err {
            ApiError::RateLimited { .. } => {
                Self::new("rate_limit_exceeded", "Request rate limit exceeded", 429)
            }
            ApiError::Validation(msg) => Self::new("validation_error", msg, 422),
            ApiError::NotFound => Self::new("not_found", "Not Found", 404),
            ApiError::Forbidden => Self::new("forbidden", "Forbidden", 403),
            // Infrastructure faults surface as a generic server error;
            // details stay in the logs.
            ApiError::AllocationExhausted | ApiError::StoreUnavailable(_) => {
                Self::new("internal_error", "Internal server error", 500)
            }
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::AllocationExhausted | ApiError::StoreUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::AllocationExhausted => {
                tracing::error!("identifier allocation retries exhausted");
            }
            ApiError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "paste store unavailable");
            }
            _ => {}
        }

        let status = self.status_code();
        let body = ErrorResponse::from_api_error(&self);
        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimited { retry_after } = self {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::RateLimited {
                retry_after: Duration::from_secs(3)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::AllocationExhausted.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_infrastructure_faults_do_not_leak_details() {
        let body = ErrorResponse::from_api_error(&ApiError::StoreUnavailable(
            "redis://10.0.0.5 connection refused".to_string(),
        ));
        assert_eq!(body.code, 500);
        assert!(!body.message.contains("redis"));
    }

    #[test]
    fn test_retry_after_header_present() {
        let response = ApiError::RateLimited {
            retry_after: Duration::from_secs(42),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );
    }
}
