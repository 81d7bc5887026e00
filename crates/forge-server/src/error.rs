use forge_core::ForgeError;
use serde::Serialize;
use thiserror::Error;

/// Failures reported to a client of the stdio protocol.
///
/// Forge errors keep their kind; everything the service rejects before
/// reaching the federation is an `InvalidRequest`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error(transparent)]
    Forge(#[from] ForgeError),
}

impl ServiceError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::UnknownMethod(_) => "invalid_request",
            Self::Forge(e) => e.kind(),
        }
    }

    /// HTTP-style status code for the error.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::UnknownMethod(_) => 400,
            Self::Forge(ForgeError::ModuleNotFound { .. }) => 404,
            Self::Forge(ForgeError::BackendUnavailable { .. }) => 502,
            Self::Forge(_) => 500,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            status: self.status(),
            message: self.to_string(),
        }
    }
}

/// The `error` member of a response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub status: u16,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
