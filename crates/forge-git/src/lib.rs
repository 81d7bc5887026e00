//! Git tag support for forge-mux.
//!
//! Serves one module from a git repository, one release per version tag,
//! by driving the `git` executable.

mod backend;
pub mod error;
mod repository;

pub use backend::{DEFAULT_TAG_PATTERN, GitCacheSettings, TagIndex, VcsTagBackend};
pub use error::{GitError, Result};
pub use repository::GitRepository;

use forge_core::{ForgeAbstract, ForgeFactory, parse_params};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration tag for this forge type.
pub const FORGE_TYPE: &str = "git";

/// Parameters of a `git` forge entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitParams {
    pub repository: PathBuf,
    #[serde(default = "default_tag_pattern")]
    pub tag_pattern: String,
}

fn default_tag_pattern() -> String {
    DEFAULT_TAG_PATTERN.to_string()
}

/// Registers the `git` constructor.
pub fn register(factory: &ForgeFactory, settings: GitCacheSettings, dependency_workers: usize) {
    factory.register(FORGE_TYPE, move |params| {
        let params: GitParams = parse_params(FORGE_TYPE, params)?;
        let backend = VcsTagBackend::new(params.repository, &params.tag_pattern, settings)?;
        Ok(Arc::new(
            ForgeAbstract::new(backend).with_workers(dependency_workers),
        ))
    });
}
