//! Error taxonomy for the gateway.
//!
//! `ProxyError` is what a single upstream call can produce, `ApiError` is
//! what the dispatcher renders into an error envelope, and `ConfigError`
//! covers startup-time configuration problems.

use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;
use thiserror::Error;

/// Generic message returned for every internal fault.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Coarse classification of a failed upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    UpstreamError,
    Timeout,
    InternalError,
}

/// Failure of a single forwarded call.
///
/// Messages name the node and the cause. The node credential never
/// appears in any variant.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Node {node_id} not found")]
    NodeNotFound { node_id: String },

    #[error("Failed to connect to node {node_id}: {reason}")]
    Upstream { node_id: String, reason: String },

    #[error("timeout after {}s waiting for node {node_id}", .timeout.as_secs_f64())]
    Timeout { node_id: String, timeout: Duration },

    #[error("internal error while proxying to node {node_id}: {reason}")]
    Internal { node_id: String, reason: String },
}

impl ProxyError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProxyError::NodeNotFound { .. } => FailureKind::NotFound,
            ProxyError::Upstream { .. } => FailureKind::UpstreamError,
            ProxyError::Timeout { .. } => FailureKind::Timeout,
            ProxyError::Internal { .. } => FailureKind::InternalError,
        }
    }

    pub fn node_id(&self) -> &str {
        match self {
            ProxyError::NodeNotFound { node_id }
            | ProxyError::Upstream { node_id, .. }
            | ProxyError::Timeout { node_id, .. }
            | ProxyError::Internal { node_id, .. } => node_id,
        }
    }
}

/// Anything the dispatcher can turn into an error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Node ID is required")]
    MissingNodeId,

    #[error("Not found")]
    RouteNotFound,

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// The payload is logged, never returned to the caller.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingNodeId => StatusCode::BAD_REQUEST,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Proxy(err) => match err.kind() {
                FailureKind::NotFound => StatusCode::NOT_FOUND,
                FailureKind::UpstreamError | FailureKind::Timeout => StatusCode::BAD_GATEWAY,
                FailureKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the envelope's `error` field.
    ///
    /// Internal faults collapse to [`INTERNAL_ERROR_MESSAGE`].
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            ApiError::Proxy(err) if err.kind() == FailureKind::InternalError => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("node configuration is not a valid JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("node {id} has an invalid definition: {source}")]
    InvalidNode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read node configuration from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request timeout must be at least one second")]
    InvalidTimeout,
}
