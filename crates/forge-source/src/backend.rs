//! Backend serving the single module checked out in a source directory.

use async_trait::async_trait;
use bytes::Bytes;
use forge_core::archive::{SyntheticEntry, pack_blocking};
use forge_core::manifest::{
    METADATA_FILE, MODULEFILE, parse_metadata_json, parse_modulefile_metadata,
    render_metadata_json,
};
use forge_core::{Backend, ForgeError, ReleaseMetadata, Result, TtlCache};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default lifetime of the parsed manifest.
pub const DEFAULT_SOURCE_TTL: Duration = Duration::from_millis(500);

const README_FILES: &[&str] = &["README.md", "README.markdown"];

/// Which manifest format the metadata was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestKind {
    MetadataJson,
    Modulefile,
}

#[derive(Debug, Clone)]
struct SourceModule {
    metadata: ReleaseMetadata,
    kind: ManifestKind,
}

/// Serves one module straight from its source directory.
///
/// Metadata comes from `metadata.json`, or from a `Modulefile` when there is
/// none. Parsed metadata is kept for a short TTL so a burst of requests
/// parses once while edits still show up quickly. Artifacts are packed on
/// request.
pub struct SourceTreeBackend {
    root: PathBuf,
    cache: TtlCache<(), SourceModule>,
}

impl SourceTreeBackend {
    /// Creates a backend over `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ForgeError::Configuration(format!(
                "module source directory does not exist: {}",
                root.display()
            )));
        }
        Ok(Self {
            root,
            cache: TtlCache::new(ttl),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn module(&self) -> Result<SourceModule> {
        self.cache.try_get((), || read_module(&self.root)).await
    }

    /// The module's metadata, or nothing when the manifest is unusable.
    async fn release(&self) -> Option<SourceModule> {
        match self.module().await {
            Ok(module) => Some(module),
            Err(e) => {
                tracing::warn!(
                    source = %self.root.display(),
                    error = %e,
                    "cannot read module manifest"
                );
                None
            }
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn read_module(root: &Path) -> Result<SourceModule> {
    let metadata_path = root.join(METADATA_FILE);
    let modulefile_path = root.join(MODULEFILE);

    let (mut metadata, kind) = if let Some(data) = read_optional(&metadata_path).await? {
        (
            parse_metadata_json(&data, &metadata_path)?,
            ManifestKind::MetadataJson,
        )
    } else if let Some(data) = read_optional(&modulefile_path).await? {
        let content = String::from_utf8_lossy(&data);
        (
            parse_modulefile_metadata(&content, &modulefile_path)?,
            ManifestKind::Modulefile,
        )
    } else {
        return Err(ForgeError::malformed(
            root,
            format!("neither {METADATA_FILE} nor {MODULEFILE} found"),
        ));
    };

    for readme in README_FILES {
        if let Some(data) = read_optional(&root.join(readme)).await? {
            metadata.readme = Some(String::from_utf8_lossy(&data).into_owned());
            break;
        }
    }

    tracing::debug!(
        source = %root.display(),
        module = %metadata.full_name(),
        version = %metadata.version,
        "parsed module source"
    );
    Ok(SourceModule { metadata, kind })
}

#[async_trait]
impl Backend for SourceTreeBackend {
    fn describe(&self) -> String {
        format!("source:{}", self.root.display())
    }

    async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>> {
        Ok(self.release().await.map(|m| m.metadata).into_iter().collect())
    }

    async fn get_metadata(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>> {
        Ok(self
            .release()
            .await
            .map(|m| m.metadata)
            .filter(|m| m.author == author && m.name == name)
            .into_iter()
            .collect())
    }

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<Bytes>> {
        let Some(module) = self.release().await else {
            return Ok(None);
        };
        let metadata = &module.metadata;
        if metadata.author != author || metadata.name != name || metadata.version != version {
            return Ok(None);
        }

        let extra = match module.kind {
            ManifestKind::MetadataJson => Vec::new(),
            ManifestKind::Modulefile => vec![SyntheticEntry::new(
                METADATA_FILE,
                render_metadata_json(metadata)?,
            )],
        };
        let root_name = format!("{}-{}", metadata.identity().dashed_name(), version);
        let data = pack_blocking(self.root.clone(), root_name, extra).await?;
        Ok(Some(data))
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::archive::{METADATA_ENTRY, list_entries, read_entry};
    use std::io::Cursor;

    const MODULEFILE_CONTENT: &str = "name 'acme-widget'\nversion '0.3.0'\nsummary 'Widgets'\n\
                                      dependency 'acme/base', '>= 1.0.0'\n";

    fn modulefile_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MODULEFILE), MODULEFILE_CONTENT).unwrap();
        std::fs::create_dir_all(dir.path().join("manifests")).unwrap();
        std::fs::write(dir.path().join("manifests/init.pp"), "class widget {}\n").unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        dir
    }

    #[test]
    fn test_missing_directory_is_configuration_error() {
        let result = SourceTreeBackend::new("/nonexistent/forge/source", DEFAULT_SOURCE_TTL);
        assert!(matches!(result, Err(ForgeError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_metadata_from_modulefile() {
        let dir = modulefile_fixture();
        let backend = SourceTreeBackend::new(dir.path(), DEFAULT_SOURCE_TTL).unwrap();

        let releases = backend.get_metadata("acme", "widget").await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].version, "0.3.0");
        assert_eq!(releases[0].dependencies[0].name, "acme/base");

        assert!(backend.get_metadata("acme", "other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_json_preferred() {
        let dir = modulefile_fixture();
        std::fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"name":"acme-widget","version":"0.4.0"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "# Widget\n").unwrap();

        let backend = SourceTreeBackend::new(dir.path(), DEFAULT_SOURCE_TTL).unwrap();
        let releases = backend.get_all_metadata().await.unwrap();
        assert_eq!(releases[0].version, "0.4.0");
        assert_eq!(releases[0].readme.as_deref(), Some("# Widget\n"));
    }

    #[tokio::test]
    async fn test_missing_manifest_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SourceTreeBackend::new(dir.path(), DEFAULT_SOURCE_TTL).unwrap();
        assert!(backend.get_all_metadata().await.unwrap().is_empty());
        assert!(
            backend
                .get_module_artifact("acme", "widget", "0.3.0")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_artifact_injects_generated_metadata() {
        let dir = modulefile_fixture();
        let backend = SourceTreeBackend::new(dir.path(), DEFAULT_SOURCE_TTL).unwrap();

        let data = backend
            .get_module_artifact("acme", "widget", "0.3.0")
            .await
            .unwrap()
            .unwrap();

        let names = list_entries(Cursor::new(data.clone())).unwrap();
        assert!(names.iter().all(|n| n.starts_with("acme-widget-0.3.0")));
        assert!(names.iter().all(|n| !n.contains(".git")));
        assert!(names.iter().any(|n| n == "acme-widget-0.3.0/manifests/init.pp"));

        let manifest = read_entry(Cursor::new(data), &METADATA_ENTRY, Path::new("mem")).unwrap();
        let parsed = parse_metadata_json(&manifest, "mem").unwrap();
        assert_eq!(parsed.full_name(), "acme/widget");
        assert_eq!(parsed.version, "0.3.0");
    }

    #[tokio::test]
    async fn test_artifact_other_version_not_found() {
        let dir = modulefile_fixture();
        let backend = SourceTreeBackend::new(dir.path(), DEFAULT_SOURCE_TTL).unwrap();
        assert!(
            backend
                .get_module_artifact("acme", "widget", "9.9.9")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_edits_visible_after_ttl() {
        let dir = modulefile_fixture();
        let backend = SourceTreeBackend::new(dir.path(), Duration::from_millis(20)).unwrap();
        assert_eq!(backend.get_all_metadata().await.unwrap()[0].version, "0.3.0");

        std::fs::write(
            dir.path().join(MODULEFILE),
            MODULEFILE_CONTENT.replace("0.3.0", "0.3.1"),
        )
        .unwrap();
        // Still cached.
        assert_eq!(backend.get_all_metadata().await.unwrap()[0].version, "0.3.0");

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(backend.get_all_metadata().await.unwrap()[0].version, "0.3.1");
    }

    #[tokio::test]
    async fn test_clear_cache_rereads() {
        let dir = modulefile_fixture();
        let backend = SourceTreeBackend::new(dir.path(), Duration::from_secs(60)).unwrap();
        assert_eq!(backend.get_all_metadata().await.unwrap()[0].version, "0.3.0");

        std::fs::write(
            dir.path().join(MODULEFILE),
            MODULEFILE_CONTENT.replace("0.3.0", "0.4.0"),
        )
        .unwrap();
        backend.clear_cache();
        assert_eq!(backend.get_all_metadata().await.unwrap()[0].version, "0.4.0");
    }
}
