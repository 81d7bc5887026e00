//! Backend serving one module's releases from the tags of a git repository.

use crate::error::{GitError, Result};
use crate::repository::GitRepository;
use async_trait::async_trait;
use bytes::Bytes;
use forge_core::archive::{SyntheticEntry, pack, unpack_tar};
use forge_core::manifest::{
    METADATA_FILE, MODULEFILE, parse_metadata_json, parse_modulefile_metadata,
    render_metadata_json,
};
use forge_core::{Backend, ForgeError, ReleaseMetadata, TtlCache};
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Tags considered when no pattern is configured: anything version-like.
pub const DEFAULT_TAG_PATTERN: &str = r"^v?[0-9]+(\.[0-9]+)*.*$";

/// Manifest reads in flight while indexing tags.
const MANIFEST_CONCURRENCY: usize = 8;

/// Cache lifetimes for git lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitCacheSettings {
    /// How long the tag list is reused.
    pub tags_ttl: Duration,
    /// How long a tag's parsed manifest is reused.
    pub manifest_ttl: Duration,
}

impl Default for GitCacheSettings {
    fn default() -> Self {
        Self {
            tags_ttl: Duration::from_secs(5),
            manifest_ttl: Duration::from_secs(10),
        }
    }
}

/// Tag ↔ version mapping for the tags that carry a manifest.
#[derive(Debug, Default, Clone)]
pub struct TagIndex {
    releases: Vec<(String, ReleaseMetadata)>,
    by_version: HashMap<String, usize>,
    by_tag: HashMap<String, usize>,
}

impl TagIndex {
    fn insert(&mut self, tag: String, metadata: ReleaseMetadata) {
        if self.by_version.contains_key(&metadata.version) {
            tracing::warn!(
                tag = %tag,
                version = %metadata.version,
                "version already declared by another tag, ignoring"
            );
            return;
        }
        let position = self.releases.len();
        self.by_version.insert(metadata.version.clone(), position);
        self.by_tag.insert(tag.clone(), position);
        self.releases.push((tag, metadata));
    }

    pub fn tag_for(&self, version: &str) -> Option<&str> {
        self.by_version
            .get(version)
            .map(|&i| self.releases[i].0.as_str())
    }

    pub fn version_for(&self, tag: &str) -> Option<&str> {
        self.by_tag
            .get(tag)
            .map(|&i| self.releases[i].1.version.as_str())
    }

    pub fn releases(&self) -> impl Iterator<Item = &ReleaseMetadata> {
        self.releases.iter().map(|(_, metadata)| metadata)
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

/// Serves the module declared in a repository, one release per tag.
///
/// Tags matching the pattern are listed, each tag's `metadata.json` (or
/// `Modulefile`) is read with `git show`, and the declared version becomes
/// that tag's release. Artifacts are built from `git archive` output with a
/// generated `metadata.json` injected. The tag list and per-tag manifests
/// are cached with independent short TTLs.
pub struct VcsTagBackend {
    repository: GitRepository,
    tag_pattern: Regex,
    tags: TtlCache<(), Arc<Vec<String>>>,
    manifests: TtlCache<String, Option<ReleaseMetadata>>,
}

impl VcsTagBackend {
    pub fn new(
        repository: impl Into<PathBuf>,
        tag_pattern: &str,
        settings: GitCacheSettings,
    ) -> Result<Self> {
        let tag_pattern = Regex::new(tag_pattern).map_err(|source| GitError::InvalidTagPattern {
            pattern: tag_pattern.to_string(),
            source,
        })?;
        Ok(Self {
            repository: GitRepository::open(repository)?,
            tag_pattern,
            tags: TtlCache::new(settings.tags_ttl),
            manifests: TtlCache::new(settings.manifest_ttl),
        })
    }

    /// Tags matching the configured pattern.
    async fn matching_tags(&self) -> Result<Arc<Vec<String>>> {
        self.tags
            .try_get((), || async {
                let tags = self.repository.tags().await?;
                let matching: Vec<String> = tags
                    .into_iter()
                    .filter(|tag| self.tag_pattern.is_match(tag))
                    .collect();
                tracing::debug!(
                    repository = %self.repository.path().display(),
                    tags = matching.len(),
                    "refreshed tag list"
                );
                Ok::<_, GitError>(Arc::new(matching))
            })
            .await
    }

    /// Parsed manifest of one tag, `None` when the tag has no usable manifest.
    async fn manifest(&self, tag: &str) -> Result<Option<ReleaseMetadata>> {
        self.manifests
            .try_get(tag.to_string(), || self.read_manifest(tag))
            .await
    }

    async fn read_manifest(&self, tag: &str) -> Result<Option<ReleaseMetadata>> {
        let files = self.repository.root_files(tag).await?;
        let origin = PathBuf::from(format!("{tag}:"));

        let parsed = if files.iter().any(|f| f == METADATA_FILE) {
            let data = self.repository.show(tag, METADATA_FILE).await?;
            parse_metadata_json(&data, origin.join(METADATA_FILE))
        } else if files.iter().any(|f| f == MODULEFILE) {
            let data = self.repository.show(tag, MODULEFILE).await?;
            parse_modulefile_metadata(&String::from_utf8_lossy(&data), origin.join(MODULEFILE))
        } else {
            return Ok(None);
        };

        match parsed {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "skipping tag with malformed manifest");
                Ok(None)
            }
        }
    }

    /// Builds the tag index from the cached tag list and manifests.
    pub async fn index(&self) -> Result<TagIndex> {
        let tags = self.matching_tags().await?;
        let manifests: Vec<(String, Result<Option<ReleaseMetadata>>)> =
            stream::iter(tags.iter().cloned())
                .map(|tag| async move {
                    let manifest = self.manifest(&tag).await;
                    (tag, manifest)
                })
                .buffered(MANIFEST_CONCURRENCY)
                .collect()
                .await;

        let mut index = TagIndex::default();
        for (tag, manifest) in manifests {
            if let Some(metadata) = manifest? {
                index.insert(tag, metadata);
            }
        }
        Ok(index)
    }

    /// Packs `tag`'s tree under `root_name` with `metadata` injected.
    async fn build_artifact(
        &self,
        tag: &str,
        root_name: String,
        metadata: &ReleaseMetadata,
    ) -> Result<Bytes> {
        let tar = self.repository.archive(tag).await?;
        let generated = render_metadata_json(metadata).map_err(|source| GitError::Repack {
            tag: tag.to_string(),
            source,
        })?;

        let packed = tokio::task::spawn_blocking(move || -> forge_core::Result<Bytes> {
            let checkout = tempfile::tempdir()?;
            unpack_tar(Cursor::new(tar), checkout.path())?;
            // The generated manifest replaces whatever the tag carried.
            let existing = checkout.path().join(METADATA_FILE);
            if existing.exists() {
                std::fs::remove_file(existing)?;
            }
            pack(
                checkout.path(),
                &root_name,
                &[SyntheticEntry::new(METADATA_FILE, generated)],
            )
        })
        .await
        .map_err(|e| ForgeError::Io(std::io::Error::other(e)))
        .and_then(|result| result);

        packed.map_err(|source| GitError::Repack {
            tag: tag.to_string(),
            source,
        })
    }

    pub fn repository(&self) -> &GitRepository {
        &self.repository
    }
}

#[async_trait]
impl Backend for VcsTagBackend {
    fn describe(&self) -> String {
        format!("git:{}", self.repository.path().display())
    }

    async fn get_all_metadata(&self) -> forge_core::Result<Vec<ReleaseMetadata>> {
        Ok(self.index().await?.releases().cloned().collect())
    }

    async fn get_metadata(
        &self,
        author: &str,
        name: &str,
    ) -> forge_core::Result<Vec<ReleaseMetadata>> {
        Ok(self
            .index()
            .await?
            .releases()
            .filter(|r| r.author == author && r.name == name)
            .cloned()
            .collect())
    }

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> forge_core::Result<Option<Bytes>> {
        let index = self.index().await?;
        let Some(tag) = index.tag_for(version) else {
            return Ok(None);
        };
        let Some(metadata) = index
            .releases()
            .find(|r| r.version == version && r.author == author && r.name == name)
        else {
            return Ok(None);
        };

        let root_name = format!("{}-{}", metadata.identity().dashed_name(), version);
        Ok(Some(self.build_artifact(tag, root_name, metadata).await?))
    }

    fn clear_cache(&self) {
        self.tags.clear();
        self.manifests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::archive::{METADATA_ENTRY, list_entries, read_entry};
    use std::path::Path;
    use std::process::Command;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=Forge Test", "-c", "user.email=forge@example.com"])
            .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .unwrap();
        assert!(
            status.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&status.stderr)
        );
    }

    fn commit_and_tag(dir: &Path, message: &str, tag: &str) {
        git(dir, &["add", "-A"]);
        git(dir, &["commit", "-q", "-m", message]);
        git(dir, &["tag", tag]);
    }

    /// Repository with tags: v0.0.1 (no manifest), v1.0.0 (Modulefile),
    /// v1.1.0 (metadata.json), docs (not version-like).
    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();
        git(path, &["init", "-q"]);

        std::fs::write(path.join("README.md"), "# Widget\n").unwrap();
        commit_and_tag(path, "initial", "v0.0.1");

        std::fs::write(
            path.join("Modulefile"),
            "name 'acme-widget'\nversion '1.0.0'\ndependency 'acme/base', '>= 1.0.0'\n",
        )
        .unwrap();
        std::fs::create_dir_all(path.join("manifests")).unwrap();
        std::fs::write(path.join("manifests/init.pp"), "class widget {}\n").unwrap();
        commit_and_tag(path, "modulefile", "v1.0.0");

        std::fs::write(
            path.join("metadata.json"),
            r#"{"name":"acme-widget","version":"1.1.0","summary":"Widgets"}"#,
        )
        .unwrap();
        commit_and_tag(path, "metadata", "v1.1.0");
        git(path, &["tag", "docs"]);
        dir
    }

    fn backend(dir: &Path) -> VcsTagBackend {
        VcsTagBackend::new(dir, DEFAULT_TAG_PATTERN, GitCacheSettings::default()).unwrap()
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let result = VcsTagBackend::new(dir.path(), "(", GitCacheSettings::default());
        assert!(matches!(result, Err(GitError::InvalidTagPattern { .. })));
    }

    #[test]
    fn test_default_pattern() {
        let pattern = Regex::new(DEFAULT_TAG_PATTERN).unwrap();
        assert!(pattern.is_match("v1.0.0"));
        assert!(pattern.is_match("2.3"));
        assert!(pattern.is_match("1.0.0-rc1"));
        assert!(!pattern.is_match("docs"));
        assert!(!pattern.is_match("release-1.0"));
    }

    #[tokio::test]
    async fn test_index_maps_tags_and_versions() {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }
        let dir = fixture();
        let index = backend(dir.path()).index().await.unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.tag_for("1.0.0"), Some("v1.0.0"));
        assert_eq!(index.tag_for("1.1.0"), Some("v1.1.0"));
        assert_eq!(index.version_for("v1.1.0"), Some("1.1.0"));
        assert_eq!(index.version_for("v0.0.1"), None);
        assert_eq!(index.version_for("docs"), None);
    }

    #[tokio::test]
    async fn test_metadata_per_tag() {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }
        let dir = fixture();
        let backend = backend(dir.path());
        let mut releases = backend.get_metadata("acme", "widget").await.unwrap();
        releases.sort_by(|a, b| a.version.cmp(&b.version));

        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].dependencies[0].name, "acme/base");
        assert_eq!(releases[1].summary.as_deref(), Some("Widgets"));
    }

    #[tokio::test]
    async fn test_artifact_from_tag() {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }
        let dir = fixture();
        let backend = backend(dir.path());
        let data = backend
            .get_module_artifact("acme", "widget", "1.0.0")
            .await
            .unwrap()
            .unwrap();

        let names = list_entries(Cursor::new(data.clone())).unwrap();
        assert!(names.iter().any(|n| n == "acme-widget-1.0.0/manifests/init.pp"));
        assert!(names.iter().any(|n| n == "acme-widget-1.0.0/Modulefile"));
        assert_eq!(
            names.iter().filter(|n| n.ends_with("metadata.json")).count(),
            1
        );

        let manifest = read_entry(Cursor::new(data), &METADATA_ENTRY, Path::new("mem")).unwrap();
        let parsed = parse_metadata_json(&manifest, "mem").unwrap();
        assert_eq!(parsed.version, "1.0.0");
        assert_eq!(parsed.dependencies[0].name, "acme/base");

        assert!(
            backend
                .get_module_artifact("acme", "widget", "3.0.0")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            backend
                .get_module_artifact("other", "widget", "1.0.0")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_tag_list_cached_until_cleared() {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }
        let dir = fixture();
        let backend = backend(dir.path());
        assert_eq!(backend.index().await.unwrap().len(), 2);

        std::fs::write(
            dir.path().join("metadata.json"),
            r#"{"name":"acme-widget","version":"1.2.0"}"#,
        )
        .unwrap();
        commit_and_tag(dir.path(), "bump", "v1.2.0");

        assert_eq!(backend.index().await.unwrap().len(), 2);
        backend.clear_cache();
        assert_eq!(backend.index().await.unwrap().len(), 3);
    }
}
