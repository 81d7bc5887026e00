use std::path::PathBuf;
use thiserror::Error;

/// Core error types for forge-mux.
///
/// Every backend and forge reports failures through this enum. The variants
/// follow the recovery semantics the federation relies on: `ModuleNotFound`
/// means "try the next forge", everything else propagates.
///
/// # Examples
///
/// ```
/// use forge_core::error::{ForgeError, Result};
///
/// fn lookup(name: &str) -> Result<()> {
///     Err(ForgeError::module_not_found(name))
/// }
///
/// let err = lookup("puppetlabs/apache").unwrap_err();
/// assert!(err.is_not_found());
/// ```
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("module not found: {module}")]
    ModuleNotFound { module: String },

    #[error("backend unavailable ({backend}): {source}")]
    BackendUnavailable {
        backend: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("malformed artifact {}: {reason}", path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    /// Creates a `ModuleNotFound` error for the given module description.
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            module: module.into(),
        }
    }

    /// Creates a `BackendUnavailable` error from any error type.
    pub fn backend_unavailable(
        backend: impl Into<String>,
        error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            source: error.into(),
        }
    }

    /// Creates a `MalformedArtifact` error.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for `ModuleNotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. })
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModuleNotFound { .. } => "module_not_found",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::MalformedArtifact { .. } | Self::Json(_) => "malformed_artifact",
            Self::Configuration(_) => "configuration",
            Self::Io(_) => "io",
        }
    }
}

/// Convenience type alias for `Result<T, ForgeError>`.
pub type Result<T> = std::result::Result<T, ForgeError>;
