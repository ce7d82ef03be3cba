//! The client-facing error format.

use crate::common::*;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// A request failure reported to the client as `{"error": "..."}`.
///
/// Every failure along the prediction chain maps to status 400 with a
/// human-readable message; backtraces never cross the HTTP boundary.
#[derive(Debug, Clone)]
pub struct ApiError {
    message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!("request failed: {}", message);
        Self { message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            error: &'a str,
        }

        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: &self.message,
            }),
        )
            .into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}
