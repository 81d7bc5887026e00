//! Directory-of-archives support for forge-mux.
//!
//! Serves modules from a directory of pre-built
//! `author-name-version.tar.gz` files.

mod backend;

pub use backend::ArchiveDirectoryBackend;

use forge_core::{ForgeAbstract, ForgeFactory, parse_params};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration tag for this forge type.
pub const FORGE_TYPE: &str = "directory";

/// Parameters of a `directory` forge entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryParams {
    pub path: PathBuf,
}

/// Registers the `directory` constructor.
pub fn register(factory: &ForgeFactory, dependency_workers: usize) {
    factory.register(FORGE_TYPE, move |params| {
        let params: DirectoryParams = parse_params(FORGE_TYPE, params)?;
        let backend = ArchiveDirectoryBackend::new(params.path)?;
        Ok(Arc::new(
            ForgeAbstract::new(backend).with_workers(dependency_workers),
        ))
    });
}
