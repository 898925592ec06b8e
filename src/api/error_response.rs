//! HTTP error responses
//!
//! Domain errors become a status code from [`ToHttpStatus`] and an [`ApiError`]
//! JSON body.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, "API request failed");
        }

        let api_error: ApiError = self.into();
        (status_code, Json(api_error)).into_response()
    }
}

/// Request rejected before reaching the job manager
pub(crate) fn bad_request(code: &str, message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ApiError::new(code, message))).into_response()
}
