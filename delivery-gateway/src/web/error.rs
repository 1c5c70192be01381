//! Mapping of gateway errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::service::{GatewayError, InputError};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl GatewayError {
    /// Status code and machine-readable code for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        let code = match self {
            GatewayError::Input(InputError::MissingBody) => "MISSING_BODY",
            GatewayError::Input(InputError::InvalidBody(_)) => "INVALID_BODY",
            GatewayError::Input(InputError::MissingKey) => "MISSING_KEY",
            GatewayError::Input(InputError::ExchangeUnresolved) => "EXCHANGE_UNRESOLVED",
            GatewayError::Broker(_) => "BROKER_ERROR",
        };

        // Callers get a 400 for broker failures too; the broker's reason is in the body.
        (StatusCode::BAD_REQUEST, code)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let message = self.to_string();

        warn!(
            code = code,
            status = status.as_u16(),
            message = %message,
            "request_rejected"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}
