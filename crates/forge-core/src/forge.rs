//! The query surface every forge exposes, and the generic engine that
//! implements it over a [`Backend`].

use crate::backend::Backend;
use crate::error::{ForgeError, Result};
use crate::merge::{deep_merge_metadata, merge_search_results};
use crate::types::{
    Artifact, DependencyGraph, DependencyVersion, ModuleIdentity, ModuleMetadata, ReleaseMetadata,
    SearchResult,
};
use crate::version::{TolerantVersion, sort_by_version};
use crate::version_matcher::VersionConstraint;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};

/// Default number of modules resolved concurrently during graph traversal.
pub const DEFAULT_DEPENDENCY_WORKERS: usize = 8;

/// A queryable source of module metadata and artifacts.
///
/// Implemented by [`ForgeAbstract`] over a single backend, by the caching
/// proxy forge, and by [`Federation`](crate::Federation), which combines
/// any number of forges.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Short label used in logs.
    fn describe(&self) -> String;

    /// Modules whose name or author contains `query` (everything when empty).
    async fn search_modules(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// Merged information for one module.
    async fn get_module_metadata(&self, author: &str, name: &str) -> Result<ModuleMetadata>;

    /// The module's versions and the transitive closure of its dependencies.
    ///
    /// With `version`, the root's versions are restricted to those matching
    /// it and the graph is pruned to what those versions reference.
    async fn get_module_metadata_with_dependencies(
        &self,
        author: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<DependencyGraph>;

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<Artifact>;

    /// Releases of one module, ascending by version.
    async fn get_releases(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>>;

    async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>>;

    /// Drops memoized state.
    async fn clear_caches(&self) -> Result<()>;
}

/// Generic forge engine over one backend.
///
/// # Examples
///
/// ```no_run
/// use forge_core::{Backend, Forge, ForgeAbstract};
///
/// async fn newest<B: Backend>(backend: B) -> forge_core::Result<Option<String>> {
///     let forge = ForgeAbstract::new(backend).with_workers(4);
///     let info = forge.get_module_metadata("puppetlabs", "apache").await?;
///     Ok(info.releases.last().map(|r| r.version.clone()))
/// }
/// ```
pub struct ForgeAbstract<B> {
    backend: B,
    workers: usize,
}

impl<B: Backend> ForgeAbstract<B> {
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            workers: DEFAULT_DEPENDENCY_WORKERS,
        }
    }

    /// Sets the number of modules resolved concurrently (at least one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Releases of one module sorted ascending.
    async fn sorted_releases(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>> {
        let mut releases = self.backend.get_metadata(author, name).await?;
        sort_by_version(&mut releases, |r| r.version.as_str());
        Ok(releases)
    }

    /// Dependency-graph entries for one `author/name`.
    ///
    /// Names that do not parse as an identity have no versions.
    async fn versions_of(&self, full_name: &str) -> Result<Vec<DependencyVersion>> {
        let Some(identity) = ModuleIdentity::parse(full_name) else {
            tracing::debug!(module = %full_name, "dependency name is not an author/name pair");
            return Ok(Vec::new());
        };
        let releases = self
            .sorted_releases(identity.author(), identity.name())
            .await?;
        Ok(releases.iter().map(ReleaseMetadata::to_version).collect())
    }

    /// Unpruned transitive closure from `root`.
    ///
    /// Each frontier of unseen names is resolved concurrently; results are
    /// inserted by this task alone, so every key is written once.
    async fn collect_dependencies(&self, root: String) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        let mut frontier = vec![root];

        while !frontier.is_empty() {
            let resolved: Vec<(String, Result<Vec<DependencyVersion>>)> = stream::iter(frontier)
                .map(|full_name| async move {
                    let versions = self.versions_of(&full_name).await;
                    (full_name, versions)
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;

            let mut next = BTreeSet::new();
            for (full_name, versions) in resolved {
                let versions = versions?;
                for version in &versions {
                    next.extend(version.dependency_names().map(String::from));
                }
                graph.insert(full_name, versions);
            }

            frontier = next
                .into_iter()
                .filter(|name| !graph.contains_key(name))
                .collect();
        }

        Ok(graph)
    }
}

/// Restricts the root's versions to `constraint` and keeps only the modules
/// those versions name as dependencies.
fn prune_to_version(graph: &mut DependencyGraph, root: &str, constraint: &VersionConstraint) {
    let root_versions = graph.remove(root).unwrap_or_default();
    let kept: Vec<DependencyVersion> = root_versions
        .into_iter()
        .filter(|v| constraint.matches(&v.version))
        .collect();

    let referenced: HashSet<&str> = kept.iter().flat_map(|v| v.dependency_names()).collect();
    graph.retain(|name, _| referenced.contains(name.as_str()));
    graph.insert(root.to_string(), kept);
}

#[async_trait]
impl<B: Backend> Forge for ForgeAbstract<B> {
    fn describe(&self) -> String {
        self.backend.describe()
    }

    async fn search_modules(&self, query: &str) -> Result<Vec<SearchResult>> {
        let mut matches: Vec<ReleaseMetadata> = self
            .backend
            .get_all_metadata()
            .await?
            .into_iter()
            .filter(|r| query.is_empty() || r.name.contains(query) || r.author.contains(query))
            .collect();

        // Newest release first, so its fields win the merge.
        matches.sort_by_cached_key(|r| Reverse(TolerantVersion::parse(&r.version)));

        Ok(merge_search_results(
            matches.iter().map(ReleaseMetadata::to_search_result).collect(),
        ))
    }

    async fn get_module_metadata(&self, author: &str, name: &str) -> Result<ModuleMetadata> {
        let releases = self.sorted_releases(author, name).await?;
        deep_merge_metadata(releases.iter().map(ReleaseMetadata::to_info))
            .ok_or_else(|| ForgeError::module_not_found(format!("{author}/{name}")))
    }

    async fn get_module_metadata_with_dependencies(
        &self,
        author: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<DependencyGraph> {
        let root = ModuleIdentity::new(author, name).full_name();
        let mut graph = self.collect_dependencies(root.clone()).await?;

        if graph.get(&root).is_none_or(Vec::is_empty) {
            return Err(ForgeError::module_not_found(root));
        }

        if let Some(version) = version {
            prune_to_version(&mut graph, &root, &VersionConstraint::parse(version));
        }

        tracing::debug!(module = %root, modules = graph.len(), "collected dependency graph");
        Ok(graph)
    }

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<Artifact> {
        let identity = ModuleIdentity::new(author, name);
        match self
            .backend
            .get_module_artifact(author, name, version)
            .await?
        {
            Some(data) => Ok(Artifact {
                file_name: identity.archive_name(version),
                data,
            }),
            None => Err(ForgeError::module_not_found(format!(
                "{}@{version}",
                identity.full_name()
            ))),
        }
    }

    async fn get_releases(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>> {
        self.sorted_releases(author, name).await
    }

    async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>> {
        self.backend.get_all_metadata().await
    }

    async fn clear_caches(&self) -> Result<()> {
        self.backend.clear_cache();
        Ok(())
    }
}
