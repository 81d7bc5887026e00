//! Upstream registry client.
//!
//! Speaks the registry's read protocol:
//! - `GET /api/v1/releases.json?module=<author>/<name>[&version=<v>]` for
//!   release lists with their transitive dependencies
//! - `GET /<author>/<name>.json` for module metadata
//! - `GET /modules.json?q=<query>` for search
//! - `GET <file>` for artifact bytes, `file` being the path a release lists

use crate::error::{ProxyError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use forge_core::types::normalize_full_name;
use forge_core::{
    Backend, Dependency, DependencyGraph, DependencyVersion, ModuleIdentity, ModuleMetadata,
    ReleaseMetadata, SearchResult,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const USER_AGENT: &str = concat!("forge-mux/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for an upstream registry.
///
/// Upstream 404s on listings become empty results. Lookups of one specific
/// release ([`release_file`](Self::release_file), [`download`](Self::download))
/// fail with `ProxyError::NotFound` instead.
#[derive(Debug, Clone)]
pub struct RemoteRegistryBackend {
    base: String,
    client: Client,
}

impl RemoteRegistryBackend {
    /// Creates a client for the registry at `url` (`http://` or `https://`).
    pub fn new(url: &str) -> Result<Self> {
        let base = url.trim().trim_end_matches('/');
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ProxyError::InvalidUrl {
                url: url.to_string(),
                reason: "expected an http:// or https:// URL".into(),
            });
        }
        if base.contains('?') || base.contains('#') {
            return Err(ProxyError::InvalidUrl {
                url: url.to_string(),
                reason: "query strings and fragments are not allowed".into(),
            });
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ProxyError::Client)?;

        Ok(Self {
            base: base.to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// GETs `path` (which starts with `/`); `None` on 404.
    async fn fetch(&self, path: &str) -> Result<Option<Bytes>> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!(url = %url, "upstream request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ProxyError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProxyError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ProxyError::Request {
                url: url.clone(),
                source,
            })?;
        Ok(Some(body))
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(body) = self.fetch(path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|source| ProxyError::InvalidResponse {
                url: format!("{}{}", self.base, path),
                source,
            })
    }

    /// Release graph for a module, keyed by normalized `author/name`.
    ///
    /// `file` fields are left as upstream reported them. Unknown modules
    /// yield an empty graph.
    pub async fn releases(
        &self,
        author: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<DependencyGraph> {
        let module = ModuleIdentity::new(author, name).full_name();
        let mut path = format!(
            "/api/v1/releases.json?module={}",
            urlencoding::encode(&module)
        );
        if let Some(version) = version {
            path.push_str("&version=");
            path.push_str(&urlencoding::encode(version));
        }

        let graph: DependencyGraph = self.fetch_json(&path).await?.unwrap_or_default();
        Ok(graph
            .into_iter()
            .map(|(full_name, versions)| {
                let versions = versions
                    .into_iter()
                    .map(|mut v| {
                        for (dep, _) in &mut v.dependencies {
                            *dep = normalize_full_name(dep);
                        }
                        v
                    })
                    .collect();
                (normalize_full_name(&full_name), versions)
            })
            .collect())
    }

    /// Module metadata, `None` if upstream does not know the module.
    pub async fn module(&self, author: &str, name: &str) -> Result<Option<ModuleMetadata>> {
        let path = format!(
            "/{}/{}.json",
            urlencoding::encode(author),
            urlencoding::encode(name)
        );
        let metadata: Option<ModuleMetadata> = self.fetch_json(&path).await?;
        Ok(metadata.map(|mut m| {
            m.full_name = normalize_full_name(&m.full_name);
            m
        }))
    }

    /// Upstream search results.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let path = format!("/modules.json?q={}", urlencoding::encode(query));
        let results: Vec<SearchResult> = self.fetch_json(&path).await?.unwrap_or_default();
        Ok(results
            .into_iter()
            .map(|mut r| {
                r.full_name = normalize_full_name(&r.full_name);
                r
            })
            .collect())
    }

    /// Downloads an artifact by the `file` path a release lists.
    pub async fn download(&self, file: &str) -> Result<Bytes> {
        validate_file_path(file)?;
        self.fetch(file).await?.ok_or_else(|| ProxyError::NotFound {
            resource: file.to_string(),
        })
    }

    /// The upstream `file` of one release.
    pub async fn release_file(&self, author: &str, name: &str, version: &str) -> Result<String> {
        let module = ModuleIdentity::new(author, name).full_name();
        let graph = self.releases(author, name, Some(version)).await?;
        graph
            .get(&module)
            .and_then(|versions| versions.iter().find(|v| v.version == version))
            .map(|v| v.file.clone())
            .ok_or_else(|| ProxyError::NotFound {
                resource: format!("{module}@{version}"),
            })
    }
}

/// Rejects artifact paths that are not absolute paths on the upstream host.
fn validate_file_path(file: &str) -> Result<()> {
    if !file.starts_with('/')
        || file.starts_with("//")
        || file.contains("..")
        || file.contains('\\')
    {
        return Err(ProxyError::InvalidUrl {
            url: file.to_string(),
            reason: "artifact path must be absolute on the upstream host".into(),
        });
    }
    Ok(())
}

pub(crate) fn to_release(identity: &ModuleIdentity, version: DependencyVersion) -> ReleaseMetadata {
    ReleaseMetadata {
        author: identity.author().to_string(),
        name: identity.name().to_string(),
        version: version.version,
        dependencies: version
            .dependencies
            .into_iter()
            .map(|(name, requirement)| {
                Dependency::new(name, Some(requirement).filter(|r| !r.is_empty()))
            })
            .collect(),
        ..Default::default()
    }
}

#[async_trait]
impl Backend for RemoteRegistryBackend {
    fn describe(&self) -> String {
        format!("proxy:{}", self.base)
    }

    /// Upstream cannot enumerate its modules.
    async fn get_all_metadata(&self) -> forge_core::Result<Vec<ReleaseMetadata>> {
        Ok(Vec::new())
    }

    async fn get_metadata(
        &self,
        author: &str,
        name: &str,
    ) -> forge_core::Result<Vec<ReleaseMetadata>> {
        let identity = ModuleIdentity::new(author, name);
        let mut graph = self.releases(author, name, None).await?;
        Ok(graph
            .remove(&identity.full_name())
            .unwrap_or_default()
            .into_iter()
            .map(|v| to_release(&identity, v))
            .collect())
    }

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> forge_core::Result<Option<Bytes>> {
        let file = match self.release_file(author, name, version).await {
            Ok(file) => file,
            Err(ProxyError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match self.download(&file).await {
            Ok(data) => Ok(Some(data)),
            Err(ProxyError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
