//! Core abstractions for forge-mux.
//!
//! forge-mux presents one query surface over several kinds of module
//! storage (archive directories, source trees, git repositories and remote
//! registries) and resolves a module's versions, transitive dependency
//! graph and downloadable artifact on demand.
//!
//! # Architecture
//!
//! forge-core defines:
//! - **Traits**: [`Backend`] (one storage medium) and [`Forge`] (the query
//!   surface)
//! - **Engines**: [`ForgeAbstract`] (a forge over any backend) and
//!   [`Federation`] (many forges as one)
//! - **Caches**: [`TtlCache`] for query results, [`PersistentCache`] for
//!   artifact bytes
//! - **Formats**: tolerant version ordering, constraint matching,
//!   `metadata.json`/`Modulefile` manifests and `.tar.gz` packing
//! - **Error Types**: the [`ForgeError`] taxonomy shared by every crate
//!
//! # Examples
//!
//! ```no_run
//! use forge_core::{Federation, Forge};
//! use std::sync::Arc;
//!
//! # async fn run(local: Arc<dyn Forge>, upstream: Arc<dyn Forge>) -> forge_core::Result<()> {
//! let federation = Federation::new(vec![local, upstream]);
//! for result in federation.search_modules("apache").await? {
//!     println!("{} {}", result.full_name, result.version);
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod backend;
pub mod cache;
pub mod error;
pub mod factory;
pub mod federation;
pub mod forge;
pub mod manifest;
pub mod merge;
pub mod types;
pub mod version;
pub mod version_matcher;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use backend::{Backend, PLACEHOLDER_CONTENT_HASH};
pub use cache::{DEFAULT_QUERY_TTL, PersistentCache, TtlCache};
pub use error::{ForgeError, Result};
pub use factory::{ForgeConstructor, ForgeFactory, parse_params};
pub use federation::Federation;
pub use forge::{DEFAULT_DEPENDENCY_WORKERS, Forge, ForgeAbstract};
pub use types::{
    Artifact, Dependency, DependencyGraph, DependencyVersion, ModuleIdentity, ModuleMetadata,
    ReleaseMetadata, ReleaseRef, SearchResult,
};
pub use version::{TolerantVersion, compare_versions, max_version, sort_by_version};
pub use version_matcher::VersionConstraint;
