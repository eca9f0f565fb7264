//! Maps the shared error taxonomy onto HTTP responses (§4.9).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use conclave_core::ConclaveError;
use serde_json::json;

pub struct ApiError(pub ConclaveError);

impl From<ConclaveError> for ApiError {
    fn from(err: ConclaveError) -> Self {
        Self(err)
    }
}

impl From<conclave_sessions::SessionError> for ApiError {
    fn from(err: conclave_sessions::SessionError) -> Self {
        Self(err.into())
    }
}

impl From<conclave_store::StoreError> for ApiError {
    fn from(err: conclave_store::StoreError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({"error": self.0.to_string(), "code": self.0.code()}));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err: ApiError = ConclaveError::NotFound("session x".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err: ApiError = ConclaveError::RateLimited { retry_after_ms: 500 }.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn session_busy_maps_through_to_409() {
        let err: ApiError = conclave_sessions::SessionError::BranchBusy(7).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
