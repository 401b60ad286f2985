// Gateway-facing error taxonomy and its HTTP disposition, mirroring the
// error-to-status mapping the upstream completions route uses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("missing credential: no Authorization bearer token or x-api-key header")]
    AuthMissing,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },
    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),
}

impl From<gateway_core::CoreError> for GatewayError {
    fn from(err: gateway_core::CoreError) -> Self {
        GatewayError::MalformedRequest(err.to_string())
    }
}

fn map_to_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::AuthMissing => StatusCode::UNAUTHORIZED,
        GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        GatewayError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        GatewayError::UpstreamStatus { status, .. } => *status,
        GatewayError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Forward the upstream body verbatim; for gateway-originated errors
        // wrap a structured message.
        if let GatewayError::UpstreamStatus { status, body } = &self {
            return (*status, body.clone()).into_response();
        }

        let status = map_to_status(&self);
        (status, Json(json!({ "error": { "message": self.to_string() } }))).into_response()
    }
}
