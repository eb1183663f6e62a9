//! Query failures as HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::{ForwardError, ResolveError};
use crate::metrics;
use crate::routing::MalformedQuery;

/// Every way a `/query` request can fail, as seen by the caller.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The inbound payload is unusable; nothing was resolved or forwarded.
    #[error(transparent)]
    MalformedInput(#[from] MalformedQuery),

    /// No usable mapping for the identifier.
    #[error("invalid {field}")]
    ResolutionFailure {
        /// Identifier field name, echoed in the message.
        field: String,
        /// Status configured for this failure.
        status: StatusCode,
    },

    /// The Mapping Store failed or timed out.
    #[error("mapping store unavailable: {0}")]
    StoreUnavailable(String),

    /// The downstream call failed.
    #[error(transparent)]
    DownstreamFailure(#[from] ForwardError),
}

impl QueryError {
    /// Classify a resolver error.
    pub fn from_resolve(err: ResolveError, field: &str, status: StatusCode) -> Self {
        match err {
            ResolveError::TargetNotResolvable { .. } => Self::ResolutionFailure {
                field: field.to_string(),
                status,
            },
            ResolveError::Store(e) => Self::StoreUnavailable(e.to_string()),
            timeout @ ResolveError::Timeout { .. } => Self::StoreUnavailable(timeout.to_string()),
        }
    }

    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::ResolutionFailure { status, .. } => *status,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DownstreamFailure(ForwardError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::DownstreamFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::ResolutionFailure { .. } => "target_not_resolvable",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::DownstreamFailure(_) => "downstream_failure",
        }
    }

    /// Message safe to show the caller. Store details and downstream
    /// addresses stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::MalformedInput(e) => e.to_string(),
            Self::ResolutionFailure { .. } => self.to_string(),
            Self::StoreUnavailable(_) => "mapping store unavailable".to_string(),
            Self::DownstreamFailure(e) => match e {
                ForwardError::InvalidUrl { .. } => "downstream address is invalid".to_string(),
                ForwardError::Unreachable { .. } => "downstream service unreachable".to_string(),
                ForwardError::Timeout { .. } => "downstream service timed out".to_string(),
                ForwardError::Status { status, .. } => {
                    format!("downstream service returned HTTP {}", status.as_u16())
                }
                ForwardError::InvalidJson { .. } => {
                    "downstream service returned a non-JSON body".to_string()
                }
            },
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        match &self {
            Self::MalformedInput(_) => metrics::inc_malformed_queries(),
            Self::StoreUnavailable(detail) => error!(detail = %detail, "Mapping store unavailable"),
            _ => {}
        }

        json_error(self.status(), self.code(), self.public_message())
    }
}

/// JSON error body: `{"error": <code>, "message": <text>}`.
pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
