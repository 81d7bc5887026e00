//! In-memory backend shared by the engine and federation tests.

use crate::backend::Backend;
use crate::error::{ForgeError, Result};
use crate::types::{Dependency, ReleaseMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) fn release(full_name: &str, version: &str, deps: &[(&str, &str)]) -> ReleaseMetadata {
    let (author, name) = full_name.split_once('/').unwrap();
    ReleaseMetadata {
        author: author.into(),
        name: name.into(),
        version: version.into(),
        summary: Some(format!("{name} {version}")),
        dependencies: deps
            .iter()
            .map(|(dep, req)| Dependency::new(*dep, Some((*req).to_string())))
            .collect(),
        ..Default::default()
    }
}

#[derive(Default)]
pub(crate) struct MemoryBackend {
    pub(crate) releases: Vec<ReleaseMetadata>,
    pub(crate) fail: bool,
    pub(crate) metadata_calls: AtomicUsize,
}

impl MemoryBackend {
    pub(crate) fn new(releases: Vec<ReleaseMetadata>) -> Self {
        Self {
            releases,
            ..Default::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(ForgeError::backend_unavailable("memory", "backend is down"));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn describe(&self) -> String {
        "memory".into()
    }

    async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>> {
        self.check()?;
        Ok(self.releases.clone())
    }

    async fn get_metadata(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>> {
        self.check()?;
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .releases
            .iter()
            .filter(|r| r.author == author && r.name == name)
            .cloned()
            .collect())
    }

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<Bytes>> {
        self.check()?;
        Ok(self
            .releases
            .iter()
            .find(|r| r.author == author && r.name == name && r.version == version)
            .map(|r| Bytes::from(format!("{}@{}", r.full_name(), r.version))))
    }
}
