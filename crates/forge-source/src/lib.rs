//! Source-tree support for forge-mux.
//!
//! Serves one module directly from its working directory, packing the
//! artifact on demand.

mod backend;

pub use backend::{DEFAULT_SOURCE_TTL, SourceTreeBackend};

use forge_core::{ForgeAbstract, ForgeFactory, parse_params};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration tag for this forge type.
pub const FORGE_TYPE: &str = "source";

/// Parameters of a `source` forge entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceParams {
    pub path: PathBuf,
}

/// Registers the `source` constructor.
pub fn register(factory: &ForgeFactory, metadata_ttl: Duration, dependency_workers: usize) {
    factory.register(FORGE_TYPE, move |params| {
        let params: SourceParams = parse_params(FORGE_TYPE, params)?;
        let backend = SourceTreeBackend::new(params.path, metadata_ttl)?;
        Ok(Arc::new(
            ForgeAbstract::new(backend).with_workers(dependency_workers),
        ))
    });
}
