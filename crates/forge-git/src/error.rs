//! Errors specific to serving modules from git tags.

use forge_core::ForgeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors specific to the git tag backend.
#[derive(Error, Debug)]
pub enum GitError {
    /// The git executable could not be started
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    /// git exited unsuccessfully
    #[error("git {command} failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Configured tag pattern is not a valid regex
    #[error("invalid tag pattern '{pattern}': {source}")]
    InvalidTagPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configured path is not a git repository
    #[error("not a git repository: {}", path.display())]
    NotARepository { path: PathBuf },

    /// Unpacking or repacking a tag's tree failed
    #[error("failed to repack tag {tag}: {source}")]
    Repack {
        tag: String,
        #[source]
        source: ForgeError,
    },
}

/// Result type alias for git operations.
pub type Result<T> = std::result::Result<T, GitError>;

impl From<GitError> for ForgeError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::InvalidTagPattern { .. } | GitError::NotARepository { .. } => {
                Self::Configuration(err.to_string())
            }
            GitError::Repack { source, .. } => source,
            GitError::Spawn(_) | GitError::CommandFailed { .. } => {
                Self::backend_unavailable("git", err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failure_is_backend_unavailable() {
        let err: ForgeError = GitError::CommandFailed {
            command: "tag --list".into(),
            status: "exit status: 128".into(),
            stderr: "fatal: not a git repository".into(),
        }
        .into();
        assert!(matches!(err, ForgeError::BackendUnavailable { .. }));
        assert!(err.to_string().contains("not a git repository"));
    }

    #[test]
    fn test_setup_errors_are_configuration() {
        let err: ForgeError = GitError::NotARepository {
            path: PathBuf::from("/tmp/nope"),
        }
        .into();
        assert!(matches!(err, ForgeError::Configuration(_)));

        let source = regex::Regex::new("(").unwrap_err();
        let err: ForgeError = GitError::InvalidTagPattern {
            pattern: "(".into(),
            source,
        }
        .into();
        assert!(matches!(err, ForgeError::Configuration(_)));
    }

    #[test]
    fn test_repack_unwraps_inner_error() {
        let err: ForgeError = GitError::Repack {
            tag: "v1.0.0".into(),
            source: ForgeError::malformed("v1.0.0", "truncated"),
        }
        .into();
        assert!(matches!(err, ForgeError::MalformedArtifact { .. }));
    }
}
