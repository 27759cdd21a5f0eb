//! Unified error handling for the AIGis library.
//!
//! Uses [`thiserror`] to define a single error enum that covers all failure
//! modes: request parsing, route matching, transform steps, upstream dispatch,
//! configuration loading, and the audit log. Library code returns
//! [`Result<T>`] which aliases `std::result::Result<T, AigisError>`.
//!
//! The binary (`main.rs`) uses [`anyhow`] for top-level error propagation.
//! Every variant maps to an outgoing HTTP status via [`AigisError::status_code`]
//! and to a stable kind string via [`AigisError::kind`] (used in the audit log).

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Unified error type for the AIGis library.
#[derive(Debug, Error)]
pub enum AigisError {
    /// Client body was not parseable as JSON where JSON was required.
    #[error("invalid request body: {0}")]
    BadRequestBody(String),

    /// The route engine found no route for the request body.
    #[error("no route matched the request")]
    NoRoute,

    /// A transform pipeline step failed (template compile/render, invalid
    /// output JSON, field write failure).
    #[error("transform {step} failed: {message}")]
    TransformFailed { step: String, message: String },

    /// A custom scanner rule carried an invalid regex.
    #[error("invalid scanner rule `{name}`: {source}")]
    InvalidRule {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// A route matcher carried an invalid regex (construction-time).
    #[error("invalid matcher regex for route {route_id}, path {json_path}: {source}")]
    InvalidMatcher {
        route_id: String,
        json_path: String,
        #[source]
        source: regex::Error,
    },

    /// Upstream answered 401.
    #[error("upstream unauthorized: {0}")]
    UpstreamUnauthorized(String),

    /// Upstream answered 429.
    #[error("upstream rate limit exceeded: {0}")]
    UpstreamRateLimited(String),

    /// Upstream answered 400.
    #[error("upstream bad request: {0}")]
    UpstreamBadRequest(String),

    /// Upstream answered any other non-2xx status.
    #[error("upstream HTTP {status}: {message}")]
    UpstreamError { status: u16, message: String },

    /// Network error or timeout while reaching the upstream.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Client disconnected or the request deadline passed.
    #[error("request cancelled")]
    Cancelled,

    /// Streaming responses are reserved but not implemented.
    #[error("streaming is not implemented")]
    StreamingUnsupported,

    /// TOML configuration parsing error.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error (config read, template write).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audit database error.
    #[error("audit log error: {0}")]
    Audit(#[from] rusqlite::Error),
}

/// Convenience type alias for `std::result::Result<T, AigisError>`.
pub type Result<T> = std::result::Result<T, AigisError>;

impl AigisError {
    /// Map this error to the HTTP status returned to the gateway client.
    pub fn status_code(&self) -> u16 {
        match self {
            AigisError::BadRequestBody(_) => 400,
            AigisError::NoRoute => 404,
            AigisError::TransformFailed { .. } => 500,
            AigisError::UpstreamUnauthorized(_)
            | AigisError::UpstreamRateLimited(_)
            | AigisError::UpstreamBadRequest(_)
            | AigisError::UpstreamError { .. }
            | AigisError::UpstreamUnreachable(_) => 502,
            // The client is gone; 499 is only ever seen in logs.
            AigisError::Cancelled => 499,
            AigisError::StreamingUnsupported => 501,
            _ => 500,
        }
    }

    /// Stable kind string for the audit log and structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            AigisError::BadRequestBody(_) => "bad-request-body",
            AigisError::NoRoute => "no-route",
            AigisError::TransformFailed { .. } => "transform-failed",
            AigisError::InvalidRule { .. } => "invalid-rule",
            AigisError::InvalidMatcher { .. } => "invalid-matcher",
            AigisError::UpstreamUnauthorized(_) => "upstream-unauthorized",
            AigisError::UpstreamRateLimited(_) => "upstream-rate-limited",
            AigisError::UpstreamBadRequest(_) => "upstream-bad-request",
            AigisError::UpstreamError { .. } => "upstream-error",
            AigisError::UpstreamUnreachable(_) => "upstream-unreachable",
            AigisError::Cancelled => "cancelled",
            AigisError::StreamingUnsupported => "streaming-unsupported",
            AigisError::ConfigParse(_) => "config-parse-error",
            AigisError::Json(_) => "json-error",
            AigisError::Io(_) => "io-error",
            AigisError::Audit(_) => "audit-error",
        }
    }
}

impl IntoResponse for AigisError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        Response::builder()
            .status(status)
            .header("content-type", "text/plain; charset=utf-8")
            .body(Body::from(self.to_string()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}
