use forge_core::{ForgeError, Result};
use forge_git::GitCacheSettings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration of the forge server.
///
/// Read from a JSON file at startup. Every section is optional and falls
/// back to its defaults; `forges` entries are handed to the forge factory
/// as-is and validated there.
///
/// # Examples
///
/// ```
/// use forge_server::config::ServerConfig;
///
/// let json = r#"{
///     "forges": [{ "type": "directory", "path": "/srv/modules" }],
///     "cache": { "query_ttl_secs": 30 }
/// }"#;
///
/// let config = ServerConfig::from_json(json).unwrap();
/// assert_eq!(config.forges.len(), 1);
/// assert_eq!(config.cache.query_ttl_secs, 30);
/// assert_eq!(config.cache.source_ttl_ms, 500);
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    /// Forge entries in federation order, each tagged with `type`.
    #[serde(default)]
    pub forges: Vec<serde_json::Value>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

impl ServerConfig {
    /// Parses a configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ForgeError::Configuration(format!("invalid configuration: {e}")))
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.display(),
            forges = config.forges.len(),
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Cache lifetimes.
///
/// # Defaults
///
/// - `query_ttl_secs`: `10` (remote search, metadata and release queries)
/// - `source_ttl_ms`: `500` (source tree manifest)
/// - `tags_ttl_secs`: `5` (git tag list)
/// - `manifest_ttl_secs`: `10` (git per-tag manifest)
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_query_ttl_secs")]
    pub query_ttl_secs: u64,
    #[serde(default = "default_source_ttl_ms")]
    pub source_ttl_ms: u64,
    #[serde(default = "default_tags_ttl_secs")]
    pub tags_ttl_secs: u64,
    #[serde(default = "default_manifest_ttl_secs")]
    pub manifest_ttl_secs: u64,
}

impl CacheConfig {
    pub const fn query_ttl(&self) -> Duration {
        Duration::from_secs(self.query_ttl_secs)
    }

    pub const fn source_ttl(&self) -> Duration {
        Duration::from_millis(self.source_ttl_ms)
    }

    pub const fn git_settings(&self) -> GitCacheSettings {
        GitCacheSettings {
            tags_ttl: Duration::from_secs(self.tags_ttl_secs),
            manifest_ttl: Duration::from_secs(self.manifest_ttl_secs),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_ttl_secs: default_query_ttl_secs(),
            source_ttl_ms: default_source_ttl_ms(),
            tags_ttl_secs: default_tags_ttl_secs(),
            manifest_ttl_secs: default_manifest_ttl_secs(),
        }
    }
}

/// Concurrency limits.
///
/// `dependency_workers` bounds how many modules of one dependency-graph
/// frontier are resolved at once (default `8`, minimum `1`).
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_dependency_workers")]
    pub dependency_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            dependency_workers: default_dependency_workers(),
        }
    }
}

// Default value functions
const fn default_query_ttl_secs() -> u64 {
    10
}

const fn default_source_ttl_ms() -> u64 {
    500
}

const fn default_tags_ttl_secs() -> u64 {
    5
}

const fn default_manifest_ttl_secs() -> u64 {
    10
}

const fn default_dependency_workers() -> usize {
    forge_core::DEFAULT_DEPENDENCY_WORKERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.forges.is_empty());
        assert_eq!(config.cache.query_ttl(), Duration::from_secs(10));
        assert_eq!(config.cache.source_ttl(), Duration::from_millis(500));
        assert_eq!(config.concurrency.dependency_workers, 8);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ServerConfig::from_json("{}").unwrap();
        assert_eq!(config.cache.tags_ttl_secs, 5);
        assert_eq!(config.cache.manifest_ttl_secs, 10);
        assert_eq!(config.concurrency.dependency_workers, 8);
    }

    #[test]
    fn test_full_document() {
        let json = r#"{
            "forges": [
                { "type": "directory", "path": "/srv/modules" },
                {
                    "type": "proxy",
                    "url": "https://forge.example.com",
                    "cache_dir": "/var/cache/forge"
                }
            ],
            "cache": {
                "query_ttl_secs": 1,
                "source_ttl_ms": 50,
                "tags_ttl_secs": 2,
                "manifest_ttl_secs": 3
            },
            "concurrency": { "dependency_workers": 2 }
        }"#;

        let config = ServerConfig::from_json(json).unwrap();
        assert_eq!(config.forges.len(), 2);
        assert_eq!(config.forges[1]["type"], "proxy");

        let git = config.cache.git_settings();
        assert_eq!(git.tags_ttl, Duration::from_secs(2));
        assert_eq!(git.manifest_ttl, Duration::from_secs(3));
        assert_eq!(config.cache.source_ttl(), Duration::from_millis(50));
        assert_eq!(config.concurrency.dependency_workers, 2);
    }

    #[test]
    fn test_invalid_document() {
        let err = ServerConfig::from_json(r#"{"cache": {"query_ttl_secs": "ten"}}"#).unwrap_err();
        assert!(matches!(err, ForgeError::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ForgeError::Configuration(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.json");
        std::fs::write(&path, r#"{"concurrency": {"dependency_workers": 3}}"#).unwrap();
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.concurrency.dependency_workers, 3);
    }
}
