//! Mapping from pipeline errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ragapi_core::{ErrorKind, RagError};
use serde_json::json;

/// Message returned when the request body is not the expected JSON.
pub const INVALID_DATA_MESSAGE: &str = "Invalid data parameter";

/// An error that renders as `{"error": ..., "kind": ...}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    /// The body could not be parsed, or lacked the `data` field.
    InvalidBody,
    Pipeline(RagError),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        ApiError::Pipeline(err)
    }
}

/// Status code for an error of the given kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Embedding | ErrorKind::Generation => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage | ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidBody => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": INVALID_DATA_MESSAGE, "kind": ErrorKind::Validation })),
            )
                .into_response(),
            ApiError::Pipeline(err) => {
                let kind = err.kind();
                (status_for(kind), Json(json!({ "error": err.to_string(), "kind": kind })))
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ragapi_core::Stage;

    use super::*;

    #[test]
    fn every_kind_has_the_documented_status() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Embedding), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Generation), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Storage), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::Timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(ErrorKind::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::Config), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn pipeline_error_response_uses_error_status() {
        let err = RagError::Timeout { stage: Stage::Generation, timeout: Duration::from_secs(3) };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn invalid_body_is_bad_request() {
        assert_eq!(ApiError::InvalidBody.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
