//! Errors specific to talking to an upstream registry.

use forge_core::ForgeError;
use thiserror::Error;

/// Errors specific to the upstream registry client.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Configured upstream URL is unusable
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport-level failure
    #[error("upstream request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with an unexpected status
    #[error("upstream returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Upstream does not have the requested resource
    #[error("upstream resource not found: {resource}")]
    NotFound { resource: String },

    /// Upstream body could not be decoded
    #[error("invalid upstream response from {url}: {source}")]
    InvalidResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for upstream operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

impl From<ProxyError> for ForgeError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::InvalidUrl { .. } | ProxyError::Client(_) => {
                Self::Configuration(err.to_string())
            }
            ProxyError::NotFound { resource } => Self::module_not_found(resource),
            ProxyError::Request { .. }
            | ProxyError::Status { .. }
            | ProxyError::InvalidResponse { .. } => Self::backend_unavailable("proxy", err),
        }
    }
}
