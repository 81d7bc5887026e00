//! A forge in front of a remote registry, with layered caches.

use crate::remote::{RemoteRegistryBackend, to_release};
use async_trait::async_trait;
use forge_core::{
    Artifact, Backend, DEFAULT_QUERY_TTL, DependencyGraph, Forge, ForgeError, ModuleIdentity,
    ModuleMetadata, PersistentCache, ReleaseMetadata, Result, SearchResult, TtlCache,
};
use std::path::PathBuf;
use std::time::Duration;

type ModuleKey = (String, String);
type ReleasesKey = (String, String, Option<String>);

/// Remote registry forge with a query cache and a download cache.
///
/// Search, metadata and release lookups are memoized in memory for a short
/// TTL. Downloaded artifacts are stored on disk under
/// `author-name-version.tar.gz` and never fetched again.
///
/// Dependency graphs advertise local `/modules/<archive>` paths in their
/// `file` fields.
pub struct CachingRemoteBackend {
    remote: RemoteRegistryBackend,
    searches: TtlCache<String, Vec<SearchResult>>,
    modules: TtlCache<ModuleKey, Option<ModuleMetadata>>,
    releases: TtlCache<ReleasesKey, DependencyGraph>,
    downloads: PersistentCache,
}

impl CachingRemoteBackend {
    pub fn new(
        remote: RemoteRegistryBackend,
        cache_dir: impl Into<PathBuf>,
        query_ttl: Duration,
    ) -> Result<Self> {
        Ok(Self {
            remote,
            searches: TtlCache::new(query_ttl),
            modules: TtlCache::new(query_ttl),
            releases: TtlCache::new(query_ttl),
            downloads: PersistentCache::new(cache_dir)?,
        })
    }

    /// Builds a caching forge with the default query TTL.
    pub fn with_default_ttl(
        remote: RemoteRegistryBackend,
        cache_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        Self::new(remote, cache_dir, DEFAULT_QUERY_TTL)
    }

    pub const fn remote(&self) -> &RemoteRegistryBackend {
        &self.remote
    }

    /// Upstream release graph, memoized; `file` fields are upstream paths.
    async fn cached_releases(
        &self,
        author: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<DependencyGraph> {
        let key = (
            author.to_string(),
            name.to_string(),
            version.map(String::from),
        );
        Ok(self
            .releases
            .try_get(key, || self.remote.releases(author, name, version))
            .await?)
    }
}

/// Points every `file` at the local download path.
fn localize_files(mut graph: DependencyGraph) -> DependencyGraph {
    for (full_name, versions) in &mut graph {
        let Some(identity) = ModuleIdentity::parse(full_name) else {
            continue;
        };
        for version in versions {
            version.file = identity.file_uri(&version.version);
        }
    }
    graph
}

#[async_trait]
impl Forge for CachingRemoteBackend {
    fn describe(&self) -> String {
        self.remote.describe()
    }

    async fn search_modules(&self, query: &str) -> Result<Vec<SearchResult>> {
        Ok(self
            .searches
            .try_get(query.to_string(), || self.remote.search(query))
            .await?)
    }

    async fn get_module_metadata(&self, author: &str, name: &str) -> Result<ModuleMetadata> {
        let key = (author.to_string(), name.to_string());
        self.modules
            .try_get(key, || self.remote.module(author, name))
            .await?
            .ok_or_else(|| ForgeError::module_not_found(format!("{author}/{name}")))
    }

    async fn get_module_metadata_with_dependencies(
        &self,
        author: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<DependencyGraph> {
        let graph = self.cached_releases(author, name, version).await?;
        let root = ModuleIdentity::new(author, name).full_name();
        if !graph.contains_key(&root) {
            return Err(ForgeError::module_not_found(root));
        }
        Ok(localize_files(graph))
    }

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<Artifact> {
        let identity = ModuleIdentity::new(author, name);
        let file_name = identity.archive_name(version);
        let not_found = || ForgeError::module_not_found(format!("{identity}@{version}"));

        // Names that cannot be a cache file cannot be a module either.
        if self.downloads.path_for(&file_name).is_err() {
            return Err(not_found());
        }

        let data = self
            .downloads
            .get(&file_name, || async {
                let graph = self.cached_releases(author, name, Some(version)).await?;
                let file = graph
                    .get(&identity.full_name())
                    .and_then(|versions| versions.iter().find(|v| v.version == version))
                    .map(|v| v.file.clone())
                    .ok_or_else(not_found)?;
                tracing::info!(
                    module = %identity,
                    version,
                    file = %file,
                    "downloading from upstream"
                );
                Ok(self.remote.download(&file).await?)
            })
            .await?;

        Ok(Artifact { file_name, data })
    }

    async fn get_releases(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>> {
        let identity = ModuleIdentity::new(author, name);
        let mut graph = self.cached_releases(author, name, None).await?;
        let mut releases: Vec<ReleaseMetadata> = graph
            .remove(&identity.full_name())
            .unwrap_or_default()
            .into_iter()
            .map(|v| to_release(&identity, v))
            .collect();
        forge_core::sort_by_version(&mut releases, |r| r.version.as_str());
        Ok(releases)
    }

    async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>> {
        self.remote.get_all_metadata().await
    }

    async fn clear_caches(&self) -> Result<()> {
        self.searches.clear();
        self.modules.clear();
        self.releases.clear();
        self.downloads.clear().await
    }
}
