use crate::config::ValidationError;
use crate::upstream::UpstreamError;
use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that stop the gateway from starting or serving
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}

/// Everything a route handler can answer with besides a success envelope.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request was rejected before any upstream call.
    #[error("{error}")]
    InvalidInput {
        error: String,
        details: Option<String>,
    },

    #[error("Method not allowed")]
    MethodNotAllowed {
        /// Usage hint for routes that only take one method.
        message: Option<String>,
        example_request: Option<Value>,
    },

    #[error("Not found")]
    NotFound,

    #[error("{source}")]
    Upstream {
        status: StatusCode,
        source: UpstreamError,
    },
}

impl ApiError {
    pub fn invalid_input(error: impl Into<String>) -> Self {
        ApiError::InvalidInput {
            error: error.into(),
            details: None,
        }
    }

    pub fn validation(details: impl Into<String>) -> Self {
        ApiError::InvalidInput {
            error: "Validation error".into(),
            details: Some(details.into()),
        }
    }

    pub fn method_not_allowed() -> Self {
        ApiError::MethodNotAllowed {
            message: None,
            example_request: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Upstream { status, .. } => *status,
        }
    }
}

/// `{ error, details?, status? }`, plus `message`/`example_request` on 405s.
#[derive(Serialize, Default)]
struct ErrorEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    example_request: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::InvalidInput { error, details } => ErrorEnvelope {
                error: Some(error),
                details: details.map(Value::String),
                ..Default::default()
            },
            ApiError::MethodNotAllowed {
                message,
                example_request,
            } => ErrorEnvelope {
                error: Some("Method not allowed".into()),
                message,
                example_request,
                ..Default::default()
            },
            ApiError::NotFound => ErrorEnvelope {
                error: Some("Not found".into()),
                ..Default::default()
            },
            ApiError::Upstream { source, .. } => ErrorEnvelope {
                error: Some(source.summary().into()),
                details: Some(source.details()).filter(|details| !details.is_null()),
                status: source.upstream_status().map(|status| status.as_u16()),
                ..Default::default()
            },
        };

        (status, Json(body)).into_response()
    }
}
