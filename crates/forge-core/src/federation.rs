//! Many forges behind one logical forge.
//!
//! Sub-forges are queried concurrently where results are combined, and in
//! configured order where the first success wins. `ModuleNotFound` from a
//! sub-forge means "try the others"; any other error propagates at once.

use crate::error::{ForgeError, Result};
use crate::forge::Forge;
use crate::merge::{deep_merge_metadata, merge_dependency_graphs, merge_search_results, unique_by};
use crate::types::{Artifact, DependencyGraph, ModuleMetadata, ReleaseMetadata, SearchResult};
use crate::version::sort_by_version;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

/// Ordered list of forges queried as one.
///
/// The list is fixed once serving starts; [`push`](Self::push) is for
/// assembly.
#[derive(Clone, Default)]
pub struct Federation {
    forges: Vec<Arc<dyn Forge>>,
}

impl Federation {
    pub fn new(forges: Vec<Arc<dyn Forge>>) -> Self {
        Self { forges }
    }

    pub fn push(&mut self, forge: Arc<dyn Forge>) {
        self.forges.push(forge);
    }

    pub fn len(&self) -> usize {
        self.forges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forges.is_empty()
    }

    pub fn forges(&self) -> &[Arc<dyn Forge>] {
        &self.forges
    }

    /// Keeps successful results in forge order, skipping not-found ones.
    ///
    /// Fails on the first other error.
    fn collect_found<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
        let mut found = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(value) => found.push(value),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl Forge for Federation {
    fn describe(&self) -> String {
        let members: Vec<String> = self.forges.iter().map(|f| f.describe()).collect();
        format!("federation[{}]", members.join(", "))
    }

    async fn search_modules(&self, query: &str) -> Result<Vec<SearchResult>> {
        let results = join_all(self.forges.iter().map(|f| f.search_modules(query))).await;
        let found = Self::collect_found(results)?;
        Ok(merge_search_results(found.into_iter().flatten().collect()))
    }

    async fn get_module_metadata(&self, author: &str, name: &str) -> Result<ModuleMetadata> {
        let results = join_all(
            self.forges
                .iter()
                .map(|f| f.get_module_metadata(author, name)),
        )
        .await;
        let found = Self::collect_found(results)?;

        let mut merged = deep_merge_metadata(found)
            .ok_or_else(|| ForgeError::module_not_found(format!("{author}/{name}")))?;
        merged.releases = unique_by(merged.releases, |r| r.version.clone());
        Ok(merged)
    }

    async fn get_module_metadata_with_dependencies(
        &self,
        author: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<DependencyGraph> {
        let results = join_all(
            self.forges
                .iter()
                .map(|f| f.get_module_metadata_with_dependencies(author, name, version)),
        )
        .await;
        let found = Self::collect_found(results)?;

        if found.is_empty() {
            return Err(ForgeError::module_not_found(format!("{author}/{name}")));
        }
        Ok(merge_dependency_graphs(found))
    }

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<Artifact> {
        for forge in &self.forges {
            match forge.get_module_artifact(author, name, version).await {
                Ok(artifact) => return Ok(artifact),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(forge = %forge.describe(), "artifact not found, trying next");
                }
                Err(e) => return Err(e),
            }
        }
        Err(ForgeError::module_not_found(format!(
            "{author}/{name}@{version}"
        )))
    }

    async fn get_releases(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>> {
        let results = join_all(self.forges.iter().map(|f| f.get_releases(author, name))).await;
        let found = Self::collect_found(results)?;
        let mut releases = unique_by(found.into_iter().flatten().collect(), |r| {
            r.version.clone()
        });
        sort_by_version(&mut releases, |r| r.version.as_str());
        Ok(releases)
    }

    async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>> {
        let results = join_all(self.forges.iter().map(|f| f.get_all_metadata())).await;
        let found = Self::collect_found(results)?;
        Ok(found.into_iter().flatten().collect())
    }

    async fn clear_caches(&self) -> Result<()> {
        let results = join_all(self.forges.iter().map(|f| f.clear_caches())).await;
        results.into_iter().collect()
    }
}
