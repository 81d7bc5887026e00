//! Remote registry support for forge-mux.
//!
//! [`RemoteRegistryBackend`] speaks the upstream registry's read protocol;
//! [`CachingRemoteBackend`] puts an in-memory query cache and an on-disk
//! download cache in front of it and serves as a forge.

mod caching;
pub mod error;
mod remote;

pub use caching::CachingRemoteBackend;
pub use error::{ProxyError, Result};
pub use remote::RemoteRegistryBackend;

use forge_core::{ForgeFactory, parse_params};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration tag for this forge type.
pub const FORGE_TYPE: &str = "proxy";

/// Parameters of a `proxy` forge entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyParams {
    /// Upstream registry base URL.
    pub url: String,
    /// Directory for downloaded artifacts.
    pub cache_dir: PathBuf,
}

/// Registers the `proxy` constructor.
pub fn register(factory: &ForgeFactory, query_ttl: Duration) {
    factory.register(FORGE_TYPE, move |params| {
        let params: ProxyParams = parse_params(FORGE_TYPE, params)?;
        let remote = RemoteRegistryBackend::new(&params.url)?;
        Ok(Arc::new(CachingRemoteBackend::new(
            remote,
            params.cache_dir,
            query_ttl,
        )?))
    });
}
