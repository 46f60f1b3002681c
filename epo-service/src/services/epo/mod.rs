//! Upstream patent search abstractions.
//!
//! The forwarder only knows the [`PatentSearch`] trait; [`OpsClient`] talks to
//! EPO Open Patent Services and [`MockPatentSearch`] answers in-process.

pub mod mock;
pub mod ops;
pub mod token;

use async_trait::async_trait;
use axum::body::Bytes;
use service_core::error::AppError;
use thiserror::Error;

pub use mock::MockPatentSearch;
pub use ops::OpsClient;
pub use token::{AccessToken, TokenCache};

/// Content type assumed when the upstream does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Error type for upstream search operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("EPO request timed out: {0}")]
    Timeout(String),

    #[error("Failed to reach EPO: {0}")]
    Network(String),

    #[error("EPO returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("EPO returned a malformed payload: {0}")]
    MalformedPayload(String),

    #[error("EPO authentication failed: {0}")]
    Authentication(String),
}

impl UpstreamError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Network(_) => "network",
            UpstreamError::Status { .. } => "status",
            UpstreamError::MalformedPayload(_) => "malformed",
            UpstreamError::Authentication(_) => "auth",
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(err.to_string())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout(msg) => AppError::GatewayTimeout(msg),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Upstream search result, relayed to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamPayload {
    pub body: Bytes,
    pub content_type: String,
}

impl UpstreamPayload {
    /// Accept `body` only if it is well-formed JSON. The original bytes are
    /// kept; the parsed value is discarded.
    pub fn json(body: Bytes, content_type: Option<String>) -> Result<Self, UpstreamError> {
        serde_json::from_slice::<serde::de::IgnoredAny>(&body)
            .map_err(|e| UpstreamError::MalformedPayload(e.to_string()))?;

        Ok(Self {
            body,
            content_type: content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        })
    }
}

/// A backend that can run one patent search.
#[async_trait]
pub trait PatentSearch: Send + Sync {
    /// Run `query` upstream, tagging the outbound call with `request_id`.
    async fn search(
        &self,
        query: &str,
        request_id: Option<&str>,
    ) -> Result<UpstreamPayload, UpstreamError>;

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}
