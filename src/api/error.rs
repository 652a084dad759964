use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::error::GatewayError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub msg: String,
    /// Hex encoded rejection reason from the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            reason: None,
        }
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Decode(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::Rejected { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Connection(_) | GatewayError::MissingCostModels | GatewayError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let reason = match &self {
            GatewayError::Rejected { reason } => Some(hex::encode(reason)),
            _ => None,
        };
        let body = ErrorBody {
            msg: self.to_string(),
            reason,
        };

        (status, Json(body)).into_response()
    }
}
