//! The storage-medium contract behind a non-federated forge.

use crate::error::Result;
use crate::types::ReleaseMetadata;
use async_trait::async_trait;
use bytes::Bytes;

/// Checksum reported when a backend cannot cheaply hash an artifact.
pub const PLACEHOLDER_CONTENT_HASH: &str = "00000000000000000000000000000000";

/// Raw per-version metadata and artifact bytes for one storage medium.
///
/// Implementations: archive directories, source trees, git tags and the
/// remote registry client. [`ForgeAbstract`](crate::ForgeAbstract) builds
/// search, merged metadata and dependency graphs on top of any of them.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use forge_core::{Backend, ReleaseMetadata, Result};
///
/// struct Empty;
///
/// #[async_trait]
/// impl Backend for Empty {
///     fn describe(&self) -> String {
///         "empty".into()
///     }
///
///     async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>> {
///         Ok(vec![])
///     }
///
///     async fn get_metadata(&self, _author: &str, _name: &str) -> Result<Vec<ReleaseMetadata>> {
///         Ok(vec![])
///     }
///
///     async fn get_module_artifact(
///         &self,
///         _author: &str,
///         _name: &str,
///         _version: &str,
///     ) -> Result<Option<Bytes>> {
///         Ok(None)
///     }
/// }
/// ```
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short human-readable label used in logs and errors.
    fn describe(&self) -> String;

    /// Every release this backend knows about.
    async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>>;

    /// Releases of one module; empty if the module is unknown.
    async fn get_metadata(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>>;

    /// Artifact bytes for one release, `None` if this backend does not have it.
    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<Bytes>>;

    /// Best-effort checksum of an artifact.
    async fn get_content_hash(&self, _author: &str, _name: &str, _version: &str) -> Result<String> {
        Ok(PLACEHOLDER_CONTENT_HASH.to_string())
    }

    /// Drops any memoized state so the next call re-reads the medium.
    fn clear_cache(&self) {}
}
