//! HTTP rendering of [`RelayError`].

use crate::error::RelayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error body: `{"error": "<kind>", "detail": "<message>"}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::EmptyDocument
            | RelayError::UnsupportedContentType { .. }
            | RelayError::InvalidDocumentFormat { .. } => StatusCode::BAD_REQUEST,
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::NotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::ProviderError { .. } => StatusCode::BAD_GATEWAY,
            RelayError::ProviderTimeout { .. } | RelayError::RequestTimeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            RelayError::IncompleteResult { .. }
            | RelayError::TemporaryResource { .. }
            | RelayError::InvalidConfig(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{} ({}): {}", status, self.kind(), self);
        } else {
            tracing::debug!("{} ({}): {}", status, self.kind(), self);
        }

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}
