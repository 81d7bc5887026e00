//! Turns configured forge entries into a federation.

use crate::config::ServerConfig;
use forge_core::{Federation, Forge, ForgeError, ForgeFactory, Result};
use serde_json::Value;

/// Builds a factory with every built-in forge type registered.
pub fn default_factory(config: &ServerConfig) -> ForgeFactory {
    let workers = config.concurrency.dependency_workers;
    let factory = ForgeFactory::new();
    forge_directory::register(&factory, workers);
    forge_source::register(&factory, config.cache.source_ttl(), workers);
    forge_git::register(&factory, config.cache.git_settings(), workers);
    forge_proxy::register(&factory, config.cache.query_ttl());
    factory
}

/// Builds the federation described by `config.forges`, in order.
pub fn build_federation(config: &ServerConfig) -> Result<Federation> {
    build_with(&default_factory(config), &config.forges)
}

/// Builds a federation from `entries` using `factory`.
///
/// Each entry must be an object with a string `type`; the remaining keys are
/// the constructor's parameters. At least one entry is required.
pub fn build_with(factory: &ForgeFactory, entries: &[Value]) -> Result<Federation> {
    if entries.is_empty() {
        return Err(ForgeError::Configuration("no forges configured".into()));
    }

    let mut federation = Federation::default();
    for (index, entry) in entries.iter().enumerate() {
        let Value::Object(fields) = entry else {
            return Err(ForgeError::Configuration(format!(
                "forges[{index}] must be an object"
            )));
        };
        let mut params = fields.clone();
        let tag = match params.remove("type") {
            Some(Value::String(tag)) => tag,
            _ => {
                return Err(ForgeError::Configuration(format!(
                    "forges[{index}] needs a string \"type\""
                )));
            }
        };
        federation.push(factory.build(&tag, &Value::Object(params))?);
    }

    tracing::info!(
        forges = federation.len(),
        federation = %federation.describe(),
        "federation ready"
    );
    Ok(federation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_factory_tags() {
        let factory = default_factory(&ServerConfig::default());
        assert_eq!(factory.tags(), vec!["directory", "git", "proxy", "source"]);
    }

    #[test]
    fn test_build_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("Modulefile"), "name 'acme-widget'\nversion '1.0.0'\n")
            .unwrap();

        let config = ServerConfig {
            forges: vec![
                json!({ "type": "directory", "path": first.path() }),
                json!({ "type": "source", "path": second.path() }),
            ],
            ..ServerConfig::default()
        };

        let federation = build_federation(&config).unwrap();
        assert_eq!(federation.len(), 2);
        assert!(federation.forges()[0].describe().starts_with("directory:"));
        assert!(federation.forges()[1].describe().starts_with("source:"));
    }

    #[test]
    fn test_single_forge_still_federated() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            forges: vec![json!({ "type": "directory", "path": dir.path() })],
            ..ServerConfig::default()
        };
        let federation = build_federation(&config).unwrap();
        assert_eq!(federation.len(), 1);
    }

    #[test]
    fn test_rejects_bad_entries() {
        let factory = default_factory(&ServerConfig::default());

        let empty = build_with(&factory, &[]).err().unwrap();
        assert!(matches!(empty, ForgeError::Configuration(_)));

        let not_object = build_with(&factory, &[json!("directory")]).err().unwrap();
        assert!(matches!(not_object, ForgeError::Configuration(_)));

        let untagged = build_with(&factory, &[json!({ "path": "/srv" })]).err().unwrap();
        assert!(matches!(untagged, ForgeError::Configuration(_)));

        let unknown = build_with(&factory, &[json!({ "type": "svn" })]).err().unwrap();
        assert!(matches!(unknown, ForgeError::Configuration(_)));

        let missing_dir =
            build_with(&factory, &[json!({ "type": "directory", "path": "/nonexistent/forge" })])
                .err().unwrap();
        assert!(matches!(missing_dir, ForgeError::Configuration(_)));
    }
}
